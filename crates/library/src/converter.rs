use crate::Library;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tome_model::BookFile;
use tracing::instrument;

/// Calibre's command-line converter.
const EXECUTABLE: &str = "ebook-convert";

/// An `ebook-convert` executable found on the system.
pub(crate) struct Converter {
    path: PathBuf,
}
impl Converter {
    pub(crate) fn discover() -> Result<Self> {
        match which::which(EXECUTABLE) {
            Ok(path) => Ok(Self { path }),
            Err(err) => {
                tracing::info!("{EXECUTABLE} not found in PATH");
                Err(err).or_raise(|| ErrorKind::Converter)
            },
        }
    }

    /// Convert `source` into `destination`; the output format is chosen by
    /// the converter from the destination's extension.
    pub(crate) async fn run(&self, source: &Path, destination: &Path) -> Result<()> {
        tracing::debug!(source = %source.display(), destination = %destination.display(), "converting");
        let output = Command::new(&self.path)
            .arg(source)
            .arg(destination)
            .kill_on_drop(true)
            .output()
            .await
            .or_raise(|| ErrorKind::Converter)?;
        if !output.status.success() {
            tracing::warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "{EXECUTABLE} failed",
            );
            // A failed run may leave a partial file that would otherwise be served from the cache.
            _ = tokio::fs::remove_file(destination).await;
            exn::bail!(ErrorKind::Converter);
        }
        Ok(())
    }
}

impl Library {
    /// Convert a library file to another format with Calibre's
    /// `ebook-convert`, returning the path of the converted copy.
    ///
    /// Results are cached by content hash, so converting the same file to the
    /// same format again returns the cached copy without running the
    /// converter.
    ///
    /// # Errors
    /// [`Converter`](ErrorKind::Converter) if `ebook-convert` is not installed
    /// or fails.
    #[instrument(skip_all, fields(file_id = file.id, to = target_extension))]
    pub async fn convert(&self, file: &BookFile, target_extension: &str) -> Result<PathBuf> {
        if target_extension.trim().trim_matches('.').is_empty() {
            exn::bail!(ErrorKind::Validation("target extension must not be empty"));
        }
        let destination = cache_path(&self.cache_dir, &file.hash, target_extension);
        if tokio::fs::try_exists(&destination).await.or_raise(|| ErrorKind::Filesystem)? {
            tracing::debug!(path = %destination.display(), "conversion cached");
            return Ok(destination);
        }

        let source = self.root.absolute_path(&file.current_filename).or_raise(|| ErrorKind::Filesystem)?;
        let converter = Converter::discover()?;
        tokio::fs::create_dir_all(&self.cache_dir).await.or_raise(|| ErrorKind::Filesystem)?;
        converter.run(&source, &destination).await?;
        tracing::info!(path = %destination.display(), "converted");
        Ok(destination)
    }
}

/// Where the converted form of `hash` is cached.
pub(crate) fn cache_path(cache_dir: &Path, hash: &str, extension: &str) -> PathBuf {
    cache_dir.join(format!("{hash}.{}", extension.trim().trim_matches('.').to_lowercase()))
}
