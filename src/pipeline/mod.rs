//! The transformer pipeline.
//!
//! A [`TransformerPipeline`] is an ordered list of transformers assembled from feature toggles
//! by a [`PipelineBuilder`]. Running it over an [`Artifact`] hands each transformer whose
//! artifact predicate matches every matching entry once, in entry order, and replaces the
//! bytes of rewritten entries in place. Entries no transformer rewrites keep their exact bytes.
//!
//! Transformers are expected to target disjoint entries. An entry already rewritten by one
//! transformer is not handed to a later one; the overlap is logged as a warning.
//!
//! # Example
//!
//! ```rust
//! use classweave::pipeline::{Artifact, Entry, Features, PipelineBuilder};
//! use classweave::presets;
//!
//! let pipeline = PipelineBuilder::new(Features::NO_AUTH)
//!     .with(Features::NO_AUTH, presets::offline_session())
//!     .build();
//!
//! let mut artifact = Artifact::new(
//!     "libraries/authlib-4.0.43.jar",
//!     vec![Entry::new("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec())],
//! );
//! let report = pipeline.run(&mut artifact);
//! assert!(report.is_untouched());
//! ```

use std::{collections::HashSet, path::Path};

use bitflags::bitflags;
use log::{debug, warn};
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    transform::{Transform, TransformKind, TransformOutcome, Transformer},
    Result,
};

pub mod artifact;

pub use artifact::{Artifact, Entry};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Feature toggles selecting which transformers a pipeline carries
    pub struct Features: u32 {
        /// Headless replacements for the native windowing and font stack
        const LWJGL = 0x0001;
        /// Extraction of the runtime support library
        const RUNTIME = 0x0002;
        /// Offline authentication patches
        const NO_AUTH = 0x0004;
    }
}

impl Features {
    /// The toggles needed to run the host without a display.
    #[must_use]
    pub fn headless() -> Self {
        Features::LWJGL | Features::RUNTIME
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::headless()
    }
}

/// Assembles a pipeline from feature-gated transformers.
pub struct PipelineBuilder {
    features: Features,
    transformers: Vec<Transformer>,
}

impl PipelineBuilder {
    /// A builder for the enabled `features`.
    #[must_use]
    pub fn new(features: Features) -> Self {
        PipelineBuilder {
            features,
            transformers: Vec::new(),
        }
    }

    /// Append `transformer` if every toggle in `feature` is enabled.
    #[must_use]
    pub fn with(mut self, feature: Features, transformer: impl Into<Transformer>) -> Self {
        if self.features.contains(feature) {
            self.transformers.push(transformer.into());
        }
        self
    }

    /// Append `transformer` unconditionally.
    #[must_use]
    pub fn always(mut self, transformer: impl Into<Transformer>) -> Self {
        self.transformers.push(transformer.into());
        self
    }

    /// Finish the pipeline.
    #[must_use]
    pub fn build(self) -> TransformerPipeline {
        TransformerPipeline {
            transformers: self.transformers,
        }
    }
}

/// Summary of one or more pipeline runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Names of rewritten entries
    pub rewritten: Vec<String>,
    /// Names of extracted entries
    pub extracted: Vec<String>,
    /// Entries a transformer failed on, with the reason
    pub failed: Vec<(String, String)>,
    /// Matched entries that needed no change
    pub unchanged: usize,
    applied: [usize; TransformKind::COUNT],
}

impl PipelineReport {
    /// Whether no entry was rewritten, extracted or failed.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.rewritten.is_empty() && self.extracted.is_empty() && self.failed.is_empty()
    }

    /// How many entries transformers of `kind` rewrote or extracted.
    #[must_use]
    pub fn applied(&self, kind: TransformKind) -> usize {
        self.applied[kind as usize]
    }

    /// Applied counts for every transformer kind.
    #[must_use]
    pub fn summary(&self) -> Vec<(TransformKind, usize)> {
        TransformKind::iter()
            .map(|kind| (kind, self.applied(kind)))
            .collect()
    }

    /// Add the counts of `other` to this report.
    pub fn merge(&mut self, other: PipelineReport) {
        self.rewritten.extend(other.rewritten);
        self.extracted.extend(other.extracted);
        self.failed.extend(other.failed);
        self.unchanged += other.unchanged;
        for (total, count) in self.applied.iter_mut().zip(other.applied) {
            *total += count;
        }
    }
}

/// An ordered list of transformers.
pub struct TransformerPipeline {
    transformers: Vec<Transformer>,
}

impl TransformerPipeline {
    /// The transformers, in application order.
    #[must_use]
    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    /// Run every transformer over `artifact`, rewriting matching entries in place.
    pub fn run(&self, artifact: &mut Artifact) -> PipelineReport {
        let mut report = PipelineReport::default();
        let mut rewritten = HashSet::new();

        for transformer in &self.transformers {
            if !transformer.matcher().matches_artifact(&artifact.path) {
                continue;
            }
            debug!(
                "Running {} over {}",
                transformer.name(),
                artifact.path.display()
            );

            for (index, entry) in artifact.entries.iter_mut().enumerate() {
                if !transformer.matcher().matches_entry(&entry.name) {
                    continue;
                }
                if rewritten.contains(&index) {
                    warn!(
                        "{} already rewritten, skipping {}",
                        entry.name,
                        transformer.name()
                    );
                    continue;
                }

                match transformer.transform(entry) {
                    TransformOutcome::Rewritten(bytes) => {
                        entry.data = bytes;
                        rewritten.insert(index);
                        report.rewritten.push(entry.name.clone());
                        report.applied[transformer.kind() as usize] += 1;
                    }
                    TransformOutcome::Extracted => {
                        report.extracted.push(entry.name.clone());
                        report.applied[transformer.kind() as usize] += 1;
                    }
                    TransformOutcome::Unchanged => report.unchanged += 1,
                    TransformOutcome::Failed(error) => {
                        warn!("{} failed on {}: {}", transformer.name(), entry.name, error);
                        report.failed.push((entry.name.clone(), error.to_string()));
                    }
                }
            }
        }

        report
    }

    /// Load the exploded artifact at `source`, run the pipeline and store it at `target`.
    ///
    /// # Errors
    /// Returns an error if the artifact cannot be read or written. Transformer failures are
    /// reported, not returned.
    pub fn run_dir(
        &self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
    ) -> Result<PipelineReport> {
        let mut artifact = Artifact::read_dir(source)?;
        let report = self.run(&mut artifact);
        artifact.write_dir(target)?;
        Ok(report)
    }
}
