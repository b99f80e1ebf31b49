//! Frames specifications: named sub-rectangles of an image.
//!
//! A `.frames` file sits next to an image (or higher up the directory tree
//! as `default.frames`) and cuts the image into named frames:
//!
//! ```json
//! {
//!   "frameGrid": {
//!     "size": [16, 16],
//!     "dimensions": [4, 2],
//!     "names": [["idle", "walk.1", "walk.2", null], ["jump"]],
//!     "begin": [0, 0]
//!   },
//!   "frameList": { "icon": [64, 0, 80, 16] },
//!   "aliases": { "walk": "walk.1", "default": "walk" }
//! }
//! ```
//!
//! Grid cells without a name are named by their index in row-major order
//! (`"3"`, `"5"`, ...). Rectangles use a top-left origin and exclusive
//! maximum edges. Every alias must resolve, possibly through other aliases,
//! to a frame; this is checked once when the file is parsed.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::error::{AssetError, AssetResult};

/// Most cells a `frameGrid` may define.
pub const MAX_GRID_FRAMES: u32 = 65536;

/// An axis-aligned pixel rectangle, `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Whether this rect lies within a `width × height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x1 <= width && self.y1 <= height
    }
}

/// Named frames and aliases of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct FramesSpecification {
    /// The `.frames` file this was parsed from.
    pub frames_file: String,

    /// Frame name → rectangle.
    pub frames: BTreeMap<String, Rect>,

    /// Alias → frame or alias name.
    pub aliases: BTreeMap<String, String>,
}

impl FramesSpecification {
    /// Parse a frames document and check its aliases.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::InvalidFrames`] on malformed structure, a
    /// dangling alias, or an alias cycle.
    pub fn parse(frames_file: &str, document: &Value) -> AssetResult<Self> {
        let invalid = |reason: String| AssetError::InvalidFrames {
            path: frames_file.to_string(),
            reason,
        };

        let root = document
            .as_object()
            .ok_or_else(|| invalid("document must be an object".to_string()))?;

        let mut frames = BTreeMap::new();

        if let Some(grid) = root.get("frameGrid") {
            parse_grid(grid, &mut frames).map_err(invalid)?;
        }

        if let Some(list) = root.get("frameList") {
            let list = list
                .as_object()
                .ok_or_else(|| invalid("frameList must be an object".to_string()))?;
            for (name, rect) in list {
                let rect = parse_rect(rect)
                    .ok_or_else(|| invalid(format!("frame '{}' is not [x0, y0, x1, y1]", name)))?;
                frames.insert(name.clone(), rect);
            }
        }

        let mut aliases = BTreeMap::new();
        if let Some(map) = root.get("aliases") {
            let map = map
                .as_object()
                .ok_or_else(|| invalid("aliases must be an object".to_string()))?;
            for (alias, target) in map {
                let target = target
                    .as_str()
                    .ok_or_else(|| invalid(format!("alias '{}' must name a frame", alias)))?;
                aliases.insert(alias.clone(), target.to_string());
            }
        }

        let specification = Self {
            frames_file: frames_file.to_string(),
            frames,
            aliases,
        };
        specification.check_aliases().map_err(invalid)?;
        Ok(specification)
    }

    /// Rectangle of a frame or alias.
    pub fn get_rect(&self, name: &str) -> Option<Rect> {
        self.resolve_name(name)
            .and_then(|frame| self.frames.get(frame).copied())
    }

    /// Follow aliases until a frame name is reached.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        let mut current = name;
        // Aliases were checked for cycles at parse time; the bound keeps
        // hand-built specifications from looping.
        for _ in 0..=self.aliases.len() {
            if self.frames.contains_key(current) {
                return Some(current);
            }
            current = self.aliases.get(current)?.as_str();
        }
        None
    }

    /// Every frame name (aliases excluded), sorted.
    pub fn frame_names(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(String::as_str)
    }

    fn check_aliases(&self) -> Result<(), String> {
        for alias in self.aliases.keys() {
            let mut seen = HashSet::new();
            let mut current = alias.as_str();
            while !self.frames.contains_key(current) {
                if !seen.insert(current) {
                    return Err(format!("alias '{}' is circular", alias));
                }
                current = match self.aliases.get(current) {
                    Some(next) => next.as_str(),
                    None => {
                        return Err(format!(
                            "alias '{}' does not resolve to a frame ('{}' is undefined)",
                            alias, current
                        ))
                    }
                };
            }
        }
        Ok(())
    }
}

fn parse_grid(grid: &Value, frames: &mut BTreeMap<String, Rect>) -> Result<(), String> {
    let size = grid
        .get("size")
        .and_then(parse_pair)
        .ok_or("frameGrid.size must be [width, height]")?;
    let dimensions = grid
        .get("dimensions")
        .and_then(parse_pair)
        .ok_or("frameGrid.dimensions must be [columns, rows]")?;
    let begin = match grid.get("begin") {
        None | Some(Value::Null) => (0, 0),
        Some(value) => parse_pair(value).ok_or("frameGrid.begin must be [x, y]")?,
    };
    let names = match grid.get("names") {
        None | Some(Value::Null) => None,
        Some(Value::Array(rows)) => Some(rows),
        Some(_) => return Err("frameGrid.names must be an array of rows".to_string()),
    };

    let (width, height) = size;
    let (columns, rows) = dimensions;
    if width == 0 || height == 0 {
        return Err("frameGrid.size must be positive".to_string());
    }
    if columns.checked_mul(rows).map_or(true, |cells| cells > MAX_GRID_FRAMES) {
        return Err(format!(
            "frameGrid.dimensions {}x{} exceeds {} frames",
            columns, rows, MAX_GRID_FRAMES
        ));
    }

    for row in 0..rows {
        for column in 0..columns {
            let index = row * columns + column;
            let name = names
                .and_then(|name_rows| name_rows.get(row as usize))
                .and_then(|cells| cells.get(column as usize))
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| index.to_string());

            let x0 = begin.0.saturating_add(column.saturating_mul(width));
            let y0 = begin.1.saturating_add(row.saturating_mul(height));
            frames.insert(
                name,
                Rect::new(x0, y0, x0.saturating_add(width), y0.saturating_add(height)),
            );
        }
    }
    Ok(())
}

fn parse_pair(value: &Value) -> Option<(u32, u32)> {
    match value.as_array()?.as_slice() {
        [a, b] => Some((to_u32(a)?, to_u32(b)?)),
        _ => None,
    }
}

fn parse_rect(value: &Value) -> Option<Rect> {
    match value.as_array()?.as_slice() {
        [x0, y0, x1, y1] => {
            let rect = Rect::new(to_u32(x0)?, to_u32(y0)?, to_u32(x1)?, to_u32(y1)?);
            (rect.x0 <= rect.x1 && rect.y0 <= rect.y1).then_some(rect)
        }
        _ => None,
    }
}

fn to_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}
