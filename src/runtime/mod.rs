//! Host-side runtime of rewritten call sites.
//!
//! - [`key`]: the signature key shared by rewriting, registration and dispatch
//! - [`value`]: host values and objects with owner-lifecycle hooks
//! - [`registry`]: the process-wide redirection table and return adaptation

pub mod key;
pub mod registry;
pub mod value;

pub use key::SignatureKey;
pub use registry::{adapt_return, constant, Redirection, RedirectionRegistry};
pub use value::{HostObject, IntBuffer, ObjectId, ObjectRef, Value};
