//! Binary-facing class file structures
//!
//! Everything in here is already resolved down to constant pool indices and byte offsets, ready
//! to be written out with [`Serialize`].

mod attribute;
mod constants;
mod serialize;

pub use attribute::*;
pub use constants::*;
pub use serialize::*;
