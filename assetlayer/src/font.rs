//! Font assets.
//!
//! Fonts are handed to the text renderer as raw font-file bytes; loading
//! only checks the container signature.

use bytes::Bytes;

use crate::error::{AssetError, AssetResult};

/// Recognised font container signatures.
const SIGNATURES: &[&[u8; 4]] = &[
    &[0x00, 0x01, 0x00, 0x00], // TrueType
    b"OTTO",                   // OpenType (CFF)
    b"true",                   // Apple TrueType
    b"ttcf",                   // TrueType collection
    b"wOFF",
    b"wOF2",
];

/// A loaded font file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    data: Bytes,
}

impl Font {
    /// Validate the signature of a font file.
    pub fn from_bytes(path: &str, data: Bytes) -> AssetResult<Self> {
        let recognised = data
            .get(..4)
            .is_some_and(|magic| SIGNATURES.iter().any(|s| s.as_slice() == magic));
        if !recognised {
            return Err(AssetError::malformed(path, "not a TrueType/OpenType font"));
        }
        Ok(Self { data })
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_signatures() {
        for magic in [&b"OTTO"[..], &[0, 1, 0, 0][..], &b"wOF2"[..]] {
            let mut data = magic.to_vec();
            data.extend_from_slice(&[0; 12]);
            let font = Font::from_bytes("/f.ttf", Bytes::from(data)).unwrap();
            assert_eq!(font.len(), 16);
        }
    }

    #[test]
    fn test_rejects_other_files() {
        assert!(Font::from_bytes("/f.ttf", Bytes::from_static(b"PK\x03\x04....")).is_err());
        assert!(Font::from_bytes("/f.ttf", Bytes::from_static(b"OT")).is_err());
    }
}
