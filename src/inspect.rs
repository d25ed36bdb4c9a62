//! Human-readable dumps of replies for debugging.
//!
//! Two views are provided:
//! - [`render_frames`] walks every raw frame as schemaless MsgPack and prints
//!   its structure. It never fails; unparseable frames print a notice.
//! - [`ReplySummary`] lists, per source, every field of a decoded
//!   [`Reply`] with its type and shape.
//!
//! # Example
//!
//! ```
//! use karabo_bridge_client::codec::MsgPackCodec;
//! use karabo_bridge_client::inspect::render_frame;
//! use std::collections::BTreeMap;
//!
//! let mut map = BTreeMap::new();
//! map.insert("trainId", 10u64);
//! let text = render_frame(&MsgPackCodec::encode(&map).unwrap());
//! assert_eq!(text, "\n\"trainId\": 10\n");
//! ```

use std::fmt;

use crate::codec::MsgPackCodec;
use crate::data::{Reply, Value};

/// Separator printed before each frame of a message.
pub const MESSAGE_SEPARATOR: &str = "\n----------new message----------\n";

/// Notice printed for a frame that is not valid MsgPack.
pub const PARSE_ERROR: &str = "parse error";

const INDENT: &str = "    ";

/// Indented rendering of a value tree.
pub struct ValueTree<'a>(pub &'a Value);

impl fmt::Display for ValueTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.0, 0, false)
    }
}

/// `depth` counts enclosing maps; arrays do not indent.
fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize, as_key: bool) -> fmt::Result {
    match value {
        Value::Nil => f.write_str("null"),
        Value::Boolean(b) => write!(f, "{}", b),
        Value::UInt(v) => write!(f, "{}", v),
        Value::Int(v) => write!(f, "{}", v),
        Value::F32(v) => write!(f, "{}", v),
        Value::F64(v) => write!(f, "{}", v),
        Value::Str(s) => write!(f, "\"{}\"", s),
        Value::Bin(b) if as_key => f.write_str(&String::from_utf8_lossy(b)),
        Value::Bin(_) => f.write_str("(bin)"),
        Value::Ext(..) => Ok(()),
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write_value(f, item, depth, false)?;
            }
            f.write_str("]")
        }
        Value::Map(entries) if entries.is_empty() => f.write_str("{}"),
        Value::Map(entries) => {
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str("\n")?;
                for _ in 0..depth {
                    f.write_str(INDENT)?;
                }
                write_value(f, key, depth + 1, true)?;
                f.write_str(": ")?;
                write_value(f, item, depth + 1, false)?;
            }
            Ok(())
        }
    }
}

/// Render one frame. Frames that fail to parse render as [`PARSE_ERROR`].
pub fn render_frame(bytes: &[u8]) -> String {
    match MsgPackCodec::decode_value(bytes) {
        Ok(value) => format!("{}\n", ValueTree(&value)),
        Err(e) => {
            tracing::warn!("Cannot render {}-byte frame: {}", bytes.len(), e);
            format!("{}\n", PARSE_ERROR)
        }
    }
}

/// Render every frame of a message, each preceded by [`MESSAGE_SEPARATOR`].
pub fn render_frames<B: AsRef<[u8]>>(frames: &[B]) -> String {
    let mut output = String::new();
    for frame in frames {
        output.push_str(MESSAGE_SEPARATOR);
        output.push_str(&render_frame(frame.as_ref()));
    }
    output
}

/// Per-source table of fields, types and shapes.
///
/// ```text
/// source: SA1_XTD2_XGM/DOOCS/MAIN
/// Total bytes received: 1234
///
/// path, type, container data type, container shape
/// data.intensityTD, array, float32, [1000]
/// trainId, uint
/// image.data: Array, u16, [16, 512, 128]
/// ```
pub struct ReplySummary<'a>(pub &'a Reply);

impl fmt::Display for ReplySummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (source, package) in self.0.iter() {
            writeln!(f, "source: {}", source)?;
            writeln!(f, "Total bytes received: {}\n", package.size())?;
            writeln!(f, "path, type, container data type, container shape")?;

            for (path, value) in package.values() {
                write!(f, "{}, ", path)?;
                match value {
                    Value::Array(items) => match items.first() {
                        None => writeln!(f, "array, , [0]")?,
                        Some(first) => {
                            writeln!(f, "array, {}, [{}]", first.wire_type(), items.len())?
                        }
                    },
                    Value::Bin(bytes) => writeln!(f, "bin, byte, [{}]", bytes.len())?,
                    Value::Map(_) | Value::Ext(..) => {
                        writeln!(f, "{} (Check...unexpected data type!)", value.wire_type())?
                    }
                    other => writeln!(f, "{}", other.wire_type())?,
                }
            }

            for (path, view) in package.arrays() {
                writeln!(
                    f,
                    "{}: Array, {}, {}",
                    path,
                    view.dtype(),
                    ShapeList(view.shape())
                )?;
            }

            writeln!(f)?;
        }
        Ok(())
    }
}

/// `[d0, d1, ...]`
struct ShapeList<'a>(&'a [usize]);

impl fmt::Display for ShapeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", dim)?;
        }
        f.write_str("]")
    }
}
