//! The directory that holds every imported book file.
//!
//! Paths stored in the database are relative to this root. Anything coming
//! from outside the library (the file being imported) is an absolute path.

use crate::error::{ErrorKind, Result};
use crate::models::{Transfer, Transferred};
use crate::path::validate as validate_path;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local directory that imported files are moved or copied into.
///
/// # Examples
///
/// ```no_run
/// use tome_storage::LibraryRoot;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let root = LibraryRoot::new("/home/me/Books")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LibraryRoot {
    root: PathBuf,
}
impl LibraryRoot {
    /// Open (creating if necessary) a library root.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is relative
    /// or exists but is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once when the library is opened; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| map_io_error(e, &root))?;
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a library-relative path to an absolute one, validating it on the way.
    pub fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    pub async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| map_io_error(e, path))?)
    }

    /// Bring the file at absolute `source` into the library at `destination`.
    ///
    /// Parent directories are created first. An existing destination is never
    /// overwritten. A move that cannot be done as a rename (typically because
    /// source and root are on different filesystems) falls back to a copy
    /// followed by removal of the source; failing to remove the source is
    /// logged and otherwise ignored. Copies keep the source's modification time.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn transfer(&self, source: &Path, destination: &Path, transfer: Transfer) -> Result<Transferred> {
        let abs_destination = self.absolute_path(destination)?;
        if fs::try_exists(&abs_destination).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(destination.to_path_buf()));
        }
        if let Some(parent) = abs_destination.parent() {
            fs::create_dir_all(parent).await.map_err(|e| map_io_error(e, destination))?;
        }

        let transferred = match transfer {
            Transfer::Copy => {
                copy_preserving_mtime(source, &abs_destination).await?;
                Transferred::Copied
            },
            Transfer::Move => match fs::rename(source, &abs_destination).await {
                Ok(()) => Transferred::Renamed,
                Err(err) => {
                    tracing::debug!(error = %err, "rename failed, falling back to copy");
                    copy_preserving_mtime(source, &abs_destination).await?;
                    if let Err(err) = fs::remove_file(source).await {
                        tracing::warn!(source = %source.display(), error = %err, "could not remove source after copy");
                    }
                    Transferred::CopiedAndDeleted
                },
            },
        };
        tracing::info!(
            source = %source.display(),
            destination = %destination.display(),
            "file {transferred}",
        );
        Ok(transferred)
    }
}

/// Copy into a destination that must not exist yet, then stamp it with the
/// source's modification time. A partially written destination is removed.
async fn copy_preserving_mtime(source: &Path, destination: &Path) -> Result<()> {
    let mut reader = fs::File::open(source).await.map_err(|e| map_io_error(e, source))?;
    let modified = reader
        .metadata()
        .await
        .and_then(|m| m.modified())
        .map_err(|e| map_io_error(e, source))?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .await
        .map_err(|e| map_io_error(e, destination))?;

    let copied = async {
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await
    }
    .await;
    if let Err(err) = copied {
        drop(writer);
        _ = fs::remove_file(destination).await;
        exn::bail!(map_io_error(err, destination));
    }

    let writer = writer.into_std().await;
    writer.set_modified(modified).map_err(|e| map_io_error(e, destination))?;
    Ok(())
}

pub(crate) fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}
