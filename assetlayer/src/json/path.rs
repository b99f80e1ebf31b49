//! Sub-path queries into JSON documents (`movement.speed`, `list[2].name`).

use serde_json::Value;

/// One step of a sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse(sub_path: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut segments = Vec::new();

    for part in sub_path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        } else if rest.is_empty() {
            return Err("empty path component".to_string());
        }

        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| format!("unclosed '[' in '{}'", part))?;
            let index = rest[1..close]
                .parse::<usize>()
                .map_err(|_| format!("invalid index '{}'", &rest[1..close]))?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(format!("unexpected '{}' after index", rest));
            }
        }
    }
    Ok(segments)
}

/// Find the value `sub_path` addresses inside `document`.
pub fn query<'v>(document: &'v Value, sub_path: &str) -> Result<&'v Value, String> {
    let mut current = document;
    for segment in parse(sub_path)? {
        current = match segment {
            Segment::Key(key) => current
                .as_object()
                .ok_or_else(|| format!("'{}' is looked up in a non-object", key))?
                .get(key)
                .ok_or_else(|| format!("no key '{}'", key))?,
            Segment::Index(index) => {
                let items = current
                    .as_array()
                    .ok_or_else(|| format!("[{}] is looked up in a non-array", index))?;
                items
                    .get(index)
                    .ok_or_else(|| format!("index {} out of range ({} items)", index, items.len()))?
            }
        };
    }
    Ok(current)
}
