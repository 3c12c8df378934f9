//! Low-level binary access shared by every decoder in the crate.
//!
//! - [`io`] - big-endian primitive conversions with bounds checking
//! - [`parser`] - the [`parser::Parser`] cursor built on top of them

pub mod io;
pub mod parser;

pub use parser::Parser;
