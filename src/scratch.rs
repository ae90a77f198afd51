// Scratch directory handling: filename sanitizing and self-deleting upload files.

use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Characters that are invalid in file names on at least one supported platform.
const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// NFKC-normalize `name` and replace every character in `<>:"/\|?*` with `_`.
///
/// NFKC folds compatibility forms first, so e.g. the fullwidth vertical line
/// `｜` becomes `|` and is then replaced.
pub fn sanitize_filename(name: &str) -> String {
    name.nfkc()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// True for names that cannot be used as a single path component.
pub fn is_unusable_filename(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed == "." || trimmed == ".."
}

/// Create the scratch directory if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// A file in the scratch directory that is deleted when dropped.
///
/// Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `bytes` to `dir/name`, replacing any existing file of that name.
    /// A failed write removes whatever part of the file was written.
    pub async fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let file = Self { path: dir.join(name) };
        tokio::fs::write(&file.path, bytes).await?;
        tracing::debug!("File saved to: {:?}", file.path);
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("File removed: {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("File not found for removal: {:?}", self.path)
            }
            Err(e) => tracing::warn!("Failed to remove {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_each_invalid_character() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j.mp3"#), "a_b_c_d_e_f_g_h_i_j.mp3");
    }

    #[test]
    fn leaves_ordinary_names_alone() {
        assert_eq!(sanitize_filename("My Song (Live) - 2024.mp3"), "My Song (Live) - 2024.mp3");
        assert_eq!(sanitize_filename("canção.wav"), "canção.wav");
    }

    #[test]
    fn folds_compatibility_forms_before_replacing() {
        assert_eq!(sanitize_filename("Artist ｜ Title.mp3"), "Artist _ Title.mp3");
        assert_eq!(sanitize_filename("ｆｕｌｌ.mp3"), "full.mp3");
    }

    #[test]
    fn unusable_names() {
        assert!(is_unusable_filename(""));
        assert!(is_unusable_filename("  "));
        assert!(is_unusable_filename(".."));
        assert!(!is_unusable_filename("a.mp3"));
    }

    #[tokio::test]
    async fn scratch_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = ScratchFile::write(dir.path(), "clip.wav", b"data").await.unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScratchFile::write(dir.path(), "missing/clip.wav", b"data").await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn write_error_drops_the_guard() {
        // Every write to /dev/full fails with ENOSPC; the guard then removes the path.
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("full.wav");
        std::os::unix::fs::symlink("/dev/full", &link).unwrap();

        let result = ScratchFile::write(dir.path(), "full.wav", b"data").await;
        assert!(result.is_err());
        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(Path::new("/dev/full").exists());
    }

    #[tokio::test]
    async fn dropping_an_already_removed_file_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let file = ScratchFile::write(dir.path(), "gone.wav", b"data").await.unwrap();
        std::fs::remove_file(file.path()).unwrap();
        drop(file);
    }
}
