//! Resource extraction.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;

use crate::{
    matcher::{ArtifactPredicate, EntryPredicate, TargetMatcher},
    pipeline::Entry,
    transform::{Transform, TransformOutcome},
    Result,
};

/// Receiver of extracted resources.
pub trait ResourceSink: Send + Sync {
    /// Store the payload of the entry called `name`.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be stored.
    fn accept(&self, name: &str, data: &[u8]) -> Result<()>;
}

/// Writes extracted resources into a directory, under their file name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    /// A sink writing into `directory`, which is created on first use.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        DirectorySink {
            directory: directory.into(),
        }
    }

    /// The target directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ResourceSink for DirectorySink {
    fn accept(&self, name: &str, data: &[u8]) -> Result<()> {
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| malformed_error!("Resource name {} has no file name", name))?;
        fs::create_dir_all(&self.directory)?;
        fs::write(self.directory.join(file_name), data)?;
        Ok(())
    }
}

/// Copies one named resource out of matching artifacts and leaves the entry unchanged.
pub struct ResourceExtraction {
    name: String,
    matcher: TargetMatcher,
    sink: Arc<dyn ResourceSink>,
}

impl ResourceExtraction {
    /// Extract the entry called `resource` from any artifact into `sink`.
    pub fn new(resource: impl Into<String>, sink: Arc<dyn ResourceSink>) -> Self {
        let resource = resource.into();
        ResourceExtraction {
            name: format!("extract {resource}"),
            matcher: TargetMatcher::new(ArtifactPredicate::Any, EntryPredicate::Exact(resource)),
            sink,
        }
    }

    /// Restrict extraction to artifacts matching `artifact`.
    #[must_use]
    pub fn in_artifacts(mut self, artifact: ArtifactPredicate) -> Self {
        self.matcher.artifact = artifact;
        self
    }
}

impl Transform for ResourceExtraction {
    fn name(&self) -> &str {
        &self.name
    }

    fn matcher(&self) -> &TargetMatcher {
        &self.matcher
    }

    fn transform(&self, entry: &Entry) -> TransformOutcome {
        match self.sink.accept(&entry.name, &entry.data) {
            Ok(()) => {
                info!("Extracted {} ({} bytes)", entry.name, entry.data.len());
                TransformOutcome::Extracted
            }
            Err(error) => TransformOutcome::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_payload_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(DirectorySink::new(dir.path().join("out")));
        let extraction = ResourceExtraction::new("lib/runtime.jar", sink);

        let entry = Entry::new("lib/runtime.jar", b"payload".to_vec());
        assert!(extraction.matcher().matches_entry(&entry.name));
        assert!(matches!(extraction.transform(&entry), TransformOutcome::Extracted));
        assert_eq!(
            fs::read(dir.path().join("out").join("runtime.jar")).unwrap(),
            b"payload"
        );
    }

    #[test]
    fn artifact_scope_can_be_narrowed() {
        let sink = Arc::new(DirectorySink::new("unused"));
        let extraction = ResourceExtraction::new("runtime.jar", sink)
            .in_artifacts(ArtifactPredicate::FileName("client.jar".to_string()));

        assert!(extraction.matcher().matches_artifact(Path::new("versions/client.jar")));
        assert!(!extraction.matcher().matches_artifact(Path::new("versions/server.jar")));
    }

    #[test]
    fn sink_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let extraction =
            ResourceExtraction::new("runtime.jar", Arc::new(DirectorySink::new(&blocker)));
        let entry = Entry::new("runtime.jar", b"payload".to_vec());
        assert!(matches!(extraction.transform(&entry), TransformOutcome::Failed(_)));
    }
}
