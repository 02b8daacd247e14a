//! Content fingerprints used as cache keys.
//!
//! A fingerprint is derived from the file's stat fields instead of its bytes,
//! so computing one costs a single `stat` call. Any real edit to a photo changes
//! its size or mtime and therefore its key.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Stable identity for a file's content: blake3 of (absolute path, size, mtime)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Stat `path` and derive its fingerprint
    ///
    /// Fails when the file cannot be resolved or stat'ed; callers treat that as
    /// "no cache entry possible" rather than a hard error.
    pub fn compute(path: &Path) -> std::io::Result<Self> {
        let absolute = fs::canonicalize(path)?;
        let meta = fs::metadata(&absolute)?;

        // Pre-epoch mtimes are rare (bad camera clocks); fold them to 0
        let mtime_nanos = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let key = format!("{}_{}_{}", absolute.display(), meta.len(), mtime_nanos);
        Ok(Self(blake3::hash(key.as_bytes()).to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_stable_for_unmodified_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"pixels").unwrap();

        let first = Fingerprint::compute(&path).unwrap();
        let second = Fingerprint::compute(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_changes_when_size_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"pixels").unwrap();
        let before = Fingerprint::compute(&path).unwrap();

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b" more").unwrap();
        drop(file);

        assert_ne!(before, Fingerprint::compute(&path).unwrap());
    }

    #[test]
    fn test_changes_when_mtime_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"pixels").unwrap();
        let before = Fingerprint::compute(&path).unwrap();

        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600)).unwrap();
        drop(file);

        assert_ne!(before, Fingerprint::compute(&path).unwrap());
    }

    #[test]
    fn test_same_content_different_path_differs() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"pixels").unwrap();
        fs::write(&b, b"pixels").unwrap();

        assert_ne!(Fingerprint::compute(&a).unwrap(), Fingerprint::compute(&b).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(Fingerprint::compute(&dir.path().join("gone.jpg")).is_err());
    }
}
