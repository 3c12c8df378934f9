//! Recovery of erased generic type parameters.
//!
//! A container such as `StructBuffer<T, SELF>` declares methods returning `T`, which erasure
//! turns into the bound `Struct`. The concrete element type survives only in the generic
//! superclass of some subtype, e.g. `STBTTPackRange$Buffer extends
//! StructBuffer<STBTTPackRange, Buffer>`. [`TypeResolutionCache`] walks a subtype's ancestry
//! to the first instantiation of the base and memoizes the first type argument.
//!
//! # Concurrency
//!
//! Results are published into a [`SkipMap`] with `get_or_insert`: two threads resolving the
//! same subtype may both walk the hierarchy, but only the first published result is ever
//! observed, so repeated calls always yield the identical answer.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use log::debug;

pub mod hierarchy;

pub use hierarchy::{ClassHierarchy, StaticBindings, TypeHierarchy};

/// Default bound on the number of ancestors visited for one subtype.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Outcome of resolving one subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The internal name bound to the base's first type parameter
    Resolved(Arc<str>),
    /// No ancestor binds the parameter to a concrete class
    Unresolved,
}

impl Resolution {
    /// The resolved internal name.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(name) => Some(name),
            Resolution::Unresolved => None,
        }
    }
}

/// Memoized resolver for one generic base type.
pub struct TypeResolutionCache {
    base: String,
    hierarchy: Arc<dyn TypeHierarchy>,
    resolved: SkipMap<String, Resolution>,
    max_depth: usize,
}

impl TypeResolutionCache {
    /// A resolver for the first type parameter of `base` (internal name).
    pub fn new(base: impl Into<String>, hierarchy: Arc<dyn TypeHierarchy>) -> Self {
        TypeResolutionCache {
            base: base.into(),
            hierarchy,
            resolved: SkipMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit the ancestry walk to `max_depth` superclasses.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The generic base this cache resolves against.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Resolve the element type for `subtype`, computing it at most once per published entry.
    pub fn resolve(&self, subtype: &str) -> Resolution {
        if let Some(entry) = self.resolved.get(subtype) {
            return entry.value().clone();
        }

        let computed = self.walk(subtype);
        let entry = self.resolved.get_or_insert(subtype.to_string(), computed);
        debug!("Resolved {} for {}: {:?}", self.base, subtype, entry.value());
        entry.value().clone()
    }

    /// Number of memoized subtypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    fn walk(&self, subtype: &str) -> Resolution {
        let mut current = subtype.to_string();
        for _ in 0..self.max_depth {
            let Some(superclass) = self.hierarchy.generic_superclass(&current) else {
                return Resolution::Unresolved;
            };
            if superclass.name == self.base {
                if let Some(class) = superclass
                    .arguments
                    .first()
                    .and_then(|argument| argument.concrete_class())
                {
                    return Resolution::Resolved(class.into());
                }
            }
            if superclass.name == "java/lang/Object" {
                return Resolution::Unresolved;
            }
            current = superclass.name;
        }

        debug!(
            "Gave up resolving {} for {} after {} ancestors",
            self.base, subtype, self.max_depth
        );
        Resolution::Unresolved
    }
}
