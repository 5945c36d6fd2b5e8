use crate::error::{Cause, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::write_failed(dir, e))
}

/// Runs `write` against a hidden sibling of `target` and moves the result
/// into place once it is complete.
///
/// `target` is either the complete output or untouched; the temporary file
/// never survives a failure.
pub fn write_atomically<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> std::result::Result<(), Cause>,
{
    let temporary = temporary_path(target);

    if let Err(e) = write(&temporary) {
        let _ = fs::remove_file(&temporary);
        return Err(Error::write_failed(target, e));
    }

    fs::rename(&temporary, target).map_err(|e| {
        let _ = fs::remove_file(&temporary);
        Error::write_failed(target, e)
    })
}

fn temporary_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, crate::random_id()))
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn test_write_moves_file_into_place() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.pdf");

        write_atomically(&target, |path| {
            assert_ne!(target, path);
            fs::write(path, b"complete")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(b"complete".to_vec(), fs::read(&target).unwrap());
        assert_eq!(vec!["out.pdf"], entries(dir.path()));
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.pdf");

        let result = write_atomically(&target, |path| {
            fs::write(path, b"half")?;
            Err("disk full".into())
        });

        assert!(matches!(result, Err(Error::WriteFailed { .. })));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_write_keeps_previous_output() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        fs::write(&target, b"previous").unwrap();

        let _ = write_atomically(&target, |_| Err("disk full".into()));

        assert_eq!(b"previous".to_vec(), fs::read(&target).unwrap());
    }

    #[test]
    fn test_ensure_dir_creates_missing_parents() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/output");

        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();

        assert!(nested.is_dir());
    }
}
