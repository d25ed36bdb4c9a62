//! Data model of a decoded reply.
//!
//! - [`Value`] - a generic MsgPack value with checked casts
//! - [`ArrayView`] - a zero-copy typed view over an array payload
//! - [`DataPackage`] - everything one source sent in one reply
//! - [`Reply`] - all packages of one reply, keyed by source

mod array;
mod package;
mod value;

pub use array::{checked_size, ArrayView, DType, Element};
pub use package::{DataPackage, Reply};
pub use value::{FromValue, Value, WireType};
