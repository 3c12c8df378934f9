//! Transformers.
//!
//! A transformer pairs a [`TargetMatcher`] with an action on matching entries. The set of
//! actions is closed: every transformer is one of the [`Transformer`] variants, and each
//! variant implements the shared [`Transform`] capability.
//!
//! | Variant                           | Action                                               |
//! |-----------------------------------|------------------------------------------------------|
//! | [`Transformer::ConstantReturn`]   | replaces whole method bodies by constant returns     |
//! | [`Transformer::ExtractResource`]  | copies a named resource out to a [`ResourceSink`]    |
//! | [`Transformer::Redirect`]         | routes target call sites through the dispatcher      |

use strum::{EnumCount, EnumIter};

use crate::{matcher::TargetMatcher, pipeline::Entry, rewriter::RewriteOutcome, Error};

pub mod constant;
pub mod extract;
pub mod redirect;

pub use constant::{ConstantReturnPatch, MethodPatch};
pub use extract::{DirectorySink, ResourceExtraction, ResourceSink};
pub use redirect::{CallRedirectionInjector, RedirectConfig};

/// What a transformer did with one entry.
#[derive(Debug)]
pub enum TransformOutcome {
    /// The entry's bytes are to be replaced
    Rewritten(Vec<u8>),
    /// Nothing to do for this entry
    Unchanged,
    /// The entry was handed to a side channel and stays as it is
    Extracted,
    /// The transformer failed; the entry stays as it is
    Failed(Error),
}

/// The kinds of transformer, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum TransformKind {
    /// Constant-return body replacement
    ConstantReturn,
    /// Resource extraction
    ExtractResource,
    /// Call-site redirection
    Redirect,
}

/// Capability shared by all transformers.
pub trait Transform {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Which artifacts and entries the transformer applies to.
    fn matcher(&self) -> &TargetMatcher;

    /// Process one matching entry.
    ///
    /// Implementations never panic on bad input; failures are reported as
    /// [`TransformOutcome::Failed`].
    fn transform(&self, entry: &Entry) -> TransformOutcome;
}

/// One configured transformer.
pub enum Transformer {
    /// See [`ConstantReturnPatch`]
    ConstantReturn(ConstantReturnPatch),
    /// See [`ResourceExtraction`]
    ExtractResource(ResourceExtraction),
    /// See [`CallRedirectionInjector`]
    Redirect(CallRedirectionInjector),
}

impl Transformer {
    /// The variant's kind.
    #[must_use]
    pub fn kind(&self) -> TransformKind {
        match self {
            Transformer::ConstantReturn(_) => TransformKind::ConstantReturn,
            Transformer::ExtractResource(_) => TransformKind::ExtractResource,
            Transformer::Redirect(_) => TransformKind::Redirect,
        }
    }

    fn inner(&self) -> &dyn Transform {
        match self {
            Transformer::ConstantReturn(patch) => patch,
            Transformer::ExtractResource(extraction) => extraction,
            Transformer::Redirect(injector) => injector,
        }
    }
}

impl Transform for Transformer {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn matcher(&self) -> &TargetMatcher {
        self.inner().matcher()
    }

    fn transform(&self, entry: &Entry) -> TransformOutcome {
        self.inner().transform(entry)
    }
}

impl From<ConstantReturnPatch> for Transformer {
    fn from(patch: ConstantReturnPatch) -> Self {
        Transformer::ConstantReturn(patch)
    }
}

impl From<ResourceExtraction> for Transformer {
    fn from(extraction: ResourceExtraction) -> Self {
        Transformer::ExtractResource(extraction)
    }
}

impl From<CallRedirectionInjector> for Transformer {
    fn from(injector: CallRedirectionInjector) -> Self {
        Transformer::Redirect(injector)
    }
}

impl From<RewriteOutcome> for TransformOutcome {
    fn from(outcome: RewriteOutcome) -> Self {
        match outcome {
            RewriteOutcome::Rewritten(bytes) => TransformOutcome::Rewritten(bytes),
            RewriteOutcome::Unchanged => TransformOutcome::Unchanged,
            RewriteOutcome::Failed(error) => TransformOutcome::Failed(error),
        }
    }
}
