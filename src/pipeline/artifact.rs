//! Artifacts and their entries.
//!
//! An artifact is an ordered list of named binary entries, the in-memory form of an archive.
//! Archive formats are handled by the caller; this module can load and store artifacts laid
//! out as directory trees, with entry names using `/` separators relative to the root.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::Result;

/// One named entry of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Name inside the artifact, `/`-separated
    pub name: String,
    /// Entry payload
    pub data: Vec<u8>,
}

impl Entry {
    /// Create an entry.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Entry {
            name: name.into(),
            data,
        }
    }

    /// Whether the entry holds a compiled class.
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.name.ends_with(".class")
    }
}

/// A container of entries identified by its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Where the artifact came from; used by artifact-level matching
    pub path: PathBuf,
    /// Entries in container order
    pub entries: Vec<Entry>,
}

impl Artifact {
    /// Create an artifact from entries.
    pub fn new(path: impl Into<PathBuf>, entries: Vec<Entry>) -> Self {
        Artifact {
            path: path.into(),
            entries,
        }
    }

    /// The entry called `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Load every file below `root` as an entry, sorted by name.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the tree cannot be read, and
    /// [`crate::Error::Malformed`] for a file name that is not valid UTF-8.
    pub fn read_dir(root: impl AsRef<Path>) -> Result<Artifact> {
        let root = root.as_ref();
        let mut entries = Vec::new();
        collect(root, root, &mut entries)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Artifact::new(root, entries))
    }

    /// Store every entry as a file below `root`, creating directories as needed.
    ///
    /// Every name is checked before anything is written, so a rejected artifact leaves `root`
    /// untouched.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if a file cannot be written, and
    /// [`crate::Error::Malformed`] for an entry name that would escape `root`.
    pub fn write_dir(&self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        let paths = self
            .entries
            .iter()
            .map(|entry| entry_path(root, &entry.name))
            .collect::<Result<Vec<_>>>()?;

        for (path, entry) in paths.iter().zip(&self.entries) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &entry.data)?;
        }
        Ok(())
    }
}

fn entry_path(root: &Path, name: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for component in name.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(malformed_error!("Invalid entry name {}", name));
        }
        path.push(component);
    }
    Ok(path)
}

fn collect(root: &Path, dir: &Path, entries: &mut Vec<Entry>) -> Result<()> {
    for item in fs::read_dir(dir)? {
        let path = item?.path();
        if path.is_dir() {
            collect(root, &path, entries)?;
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .map_err(|_| malformed_error!("{} is outside {}", path.display(), root.display()))?;
        let name = relative
            .iter()
            .map(|part| {
                part.to_str()
                    .ok_or_else(|| malformed_error!("Non UTF-8 file name {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?
            .join("/");
        entries.push(Entry::new(name, fs::read(&path)?));
    }
    Ok(())
}
