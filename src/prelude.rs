//! # classweave Prelude
//!
//! The types needed to configure a pipeline, register redirections and inspect results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classweave operations
pub use crate::Error;

/// The result type used throughout classweave
pub use crate::Result;

/// Low-level parsing utilities
pub use crate::Parser;

// ================================================================================================
// Class Files
// ================================================================================================

/// Class file model
pub use crate::classfile::{
    descriptor::{FieldType, MethodDescriptor, ReturnType},
    AccessFlags, ClassFile,
};

// ================================================================================================
// Rewriting
// ================================================================================================

/// Rewriting primitives and their outcome
pub use crate::rewriter::{
    inject_redirects, replace_body, replace_methods, ConstantValue, DispatchTarget,
    ModuleRewriter, RewriteOutcome,
};

// ================================================================================================
// Runtime
// ================================================================================================

/// Redirection registry and host values
pub use crate::runtime::{
    HostObject, IntBuffer, Redirection, RedirectionRegistry, SignatureKey, Value,
};

/// Erased generic recovery
pub use crate::typeres::{Resolution, TypeResolutionCache};

/// Font name tables
pub use crate::nametable::{FontNameCache, NameQuery, NameTable};

// ================================================================================================
// Orchestration
// ================================================================================================

/// Target selection
pub use crate::matcher::{ArtifactPredicate, EntryPredicate, TargetMatcher};

/// Transformers
pub use crate::transform::{Transform, TransformOutcome, Transformer};

/// Pipelines and artifacts
pub use crate::pipeline::{
    Artifact, Entry, Features, PipelineBuilder, PipelineReport, TransformerPipeline,
};

/// Ready-made configurations
pub use crate::presets;
