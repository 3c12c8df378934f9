//! Two-stage target selection.
//!
//! A [`TargetMatcher`] decides first whether an artifact can contain targets at all, from its
//! path alone, and only then which of its entries to hand to a transformer. The artifact check
//! is cheap and runs first, so no entry of a non-matching artifact is ever parsed.

use std::{collections::BTreeSet, path::Path};

/// Artifact-level predicate, evaluated on the artifact's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPredicate {
    /// Every artifact
    Any,
    /// The path contains the text, ignoring ASCII case
    PathContains(String),
    /// The final path component equals the name
    FileName(String),
}

impl ArtifactPredicate {
    /// Evaluate the predicate.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            ArtifactPredicate::Any => true,
            ArtifactPredicate::PathContains(needle) => path
                .to_string_lossy()
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            ArtifactPredicate::FileName(name) => path
                .file_name()
                .is_some_and(|file_name| file_name.to_string_lossy() == name.as_str()),
        }
    }
}

/// Entry-level predicate, evaluated on an entry's name inside the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPredicate {
    /// Every entry
    Any,
    /// The entry name equals the text
    Exact(String),
    /// A `.class` entry whose internal class name is in the set
    ClassNames(BTreeSet<String>),
    /// The entry name ends with the text
    Suffix(String),
}

impl EntryPredicate {
    /// A class-name predicate from internal names such as `com/example/Service`.
    pub fn classes<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EntryPredicate::ClassNames(names.into_iter().map(Into::into).collect())
    }

    /// Evaluate the predicate.
    #[must_use]
    pub fn matches(&self, entry: &str) -> bool {
        match self {
            EntryPredicate::Any => true,
            EntryPredicate::Exact(name) => entry == name,
            EntryPredicate::ClassNames(names) => entry
                .strip_suffix(".class")
                .is_some_and(|class| names.contains(class)),
            EntryPredicate::Suffix(suffix) => entry.ends_with(suffix.as_str()),
        }
    }
}

/// Artifact and entry predicates that must both pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatcher {
    /// Checked once per artifact
    pub artifact: ArtifactPredicate,
    /// Checked per entry of a matching artifact
    pub entry: EntryPredicate,
}

impl TargetMatcher {
    /// Combine two predicates.
    #[must_use]
    pub fn new(artifact: ArtifactPredicate, entry: EntryPredicate) -> Self {
        TargetMatcher { artifact, entry }
    }

    /// Match every entry of every artifact.
    #[must_use]
    pub fn any() -> Self {
        TargetMatcher::new(ArtifactPredicate::Any, EntryPredicate::Any)
    }

    /// Whether entries of the artifact at `path` are worth inspecting.
    #[must_use]
    pub fn matches_artifact(&self, path: &Path) -> bool {
        self.artifact.matches(path)
    }

    /// Whether the entry called `entry` is a target.
    #[must_use]
    pub fn matches_entry(&self, entry: &str) -> bool {
        self.entry.matches(entry)
    }

    /// Both checks.
    #[must_use]
    pub fn matches(&self, path: &Path, entry: &str) -> bool {
        self.matches_artifact(path) && self.matches_entry(entry)
    }
}
