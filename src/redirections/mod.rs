//! Host redirections for running without native libraries.
//!
//! Each submodule registers handlers for one family of native calls and exports the keys it
//! registers, so the same list can configure the call-site rewriting:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use classweave::{
//!     nametable::FontNameCache,
//!     redirections::{self, structbuffer},
//!     runtime::RedirectionRegistry,
//!     typeres::StaticBindings,
//! };
//!
//! let registry = RedirectionRegistry::new();
//! let resolver = structbuffer::resolver(Arc::new(StaticBindings::new()));
//! redirections::register_all(
//!     &registry,
//!     &FontNameCache::new(),
//!     Arc::new(resolver),
//!     Arc::new(structbuffer::HostObjectFactory),
//! );
//! assert_eq!(registry.len(), redirections::keys().len());
//! ```

use std::sync::Arc;

use crate::{
    nametable::FontNameCache,
    runtime::{RedirectionRegistry, SignatureKey},
    typeres::TypeResolutionCache,
};

pub mod image;
pub mod structbuffer;
pub mod truetype;

/// Register every redirection of this module.
pub fn register_all(
    registry: &RedirectionRegistry,
    fonts: &FontNameCache,
    resolver: Arc<TypeResolutionCache>,
    factory: Arc<dyn structbuffer::ObjectFactory>,
) {
    truetype::register(registry, fonts);
    image::register(registry);
    structbuffer::register(registry, resolver, factory);
}

/// The keys [`register_all`] registers.
#[must_use]
pub fn keys() -> Vec<SignatureKey> {
    truetype::KEYS
        .iter()
        .chain(image::KEYS.iter())
        .chain(structbuffer::KEYS.iter())
        .map(|key| SignatureKey::from(*key))
        .collect()
}
