// Destination path handling

use std::path::{Path, PathBuf};

use crate::error::{PlayfitError, Result};

pub fn ensure_source_exists(source: &Path) -> Result<()> {
    if source.is_file() {
        Ok(())
    } else {
        Err(PlayfitError::SourceNotFound {
            path: source.to_path_buf(),
        })
    }
}

/// Resolve the destination argument. A directory means
/// `<dir>/<source stem>.<ext>`, where `ext` is the decided output
/// container; anything else is taken as the literal output file.
pub fn derive_destination(source: &Path, dest: &Path, container_ext: &str) -> PathBuf {
    if dest.is_dir() {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        dest.join(format!("{}.{}", stem, container_ext))
    } else {
        dest.to_path_buf()
    }
}

/// Existing files are never overwritten.
pub fn ensure_destination_free(dest: &Path) -> Result<()> {
    if dest.exists() {
        Err(PlayfitError::DestinationExists {
            path: dest.to_path_buf(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_is_an_error() {
        let err = ensure_source_exists(Path::new("/no/such/file.mkv")).unwrap_err();
        assert!(matches!(err, PlayfitError::SourceNotFound { .. }));
    }

    #[test]
    fn test_existing_source_passes() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("movie.mkv");
        std::fs::write(&source, b"x").unwrap();
        assert!(ensure_source_exists(&source).is_ok());
    }

    #[test]
    fn test_directory_destination_gets_stem_and_container() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = derive_destination(Path::new("/media/Some Movie.mp4"), dir.path(), "mkv");
        assert_eq!(dest, dir.path().join("Some Movie.mkv"));
    }

    #[test]
    fn test_file_destination_is_used_verbatim() {
        let dest = derive_destination(
            Path::new("/media/in.mp4"),
            Path::new("/media/custom-name.mkv"),
            "mkv",
        );
        assert_eq!(dest, PathBuf::from("/media/custom-name.mkv"));
    }

    #[test]
    fn test_existing_destination_is_refused() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("out.mkv");
        std::fs::write(&dest, b"x").unwrap();

        let err = ensure_destination_free(&dest).unwrap_err();
        assert!(matches!(err, PlayfitError::DestinationExists { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_fresh_destination_is_accepted() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ensure_destination_free(&dir.path().join("out.mkv")).is_ok());
    }
}
