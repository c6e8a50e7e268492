//! Turning a rendered template path into a filename that is free to use.
//!
//! A rendered path still has to survive two things before a file can be
//! placed there: filesystem limits on component length, and collisions with
//! files that are already in the library (or merely on disk). Collisions are
//! settled by inserting `" (n)"` in front of the extension.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use tome_storage::LibraryRoot;
use tome_store::Transaction;

/// Longest path component, in bytes, accepted by common filesystems.
pub const MAX_COMPONENT_BYTES: usize = 255;
/// Highest `n` tried for `" (n)"` before giving up.
pub const MAX_DISAMBIGUATOR: u32 = 9999;

/// Bytes needed for the widest disambiguator, `" (9999)"`.
fn disambiguator_room() -> usize {
    format!(" ({MAX_DISAMBIGUATOR})").len()
}

/// A destination path split into the parts that collision handling needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    parent: PathBuf,
    stem: String,
    extension: String,
}
impl Candidate {
    /// Split a generated path (which already ends in `.<extension>`) and
    /// shorten any component that is too long.
    ///
    /// Directory components are cut to [`MAX_COMPONENT_BYTES`]. The file stem
    /// is cut so that stem, disambiguator and extension together still fit;
    /// the extension itself is never cut. All cuts land on a character
    /// boundary.
    pub fn new(generated: &Path, extension: &str) -> Result<Self> {
        let file_name = generated
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_raise(|| ErrorKind::Path)?;
        let extension = extension.trim().trim_matches('.');
        let stem = match extension.is_empty() {
            true => file_name,
            false => file_name.strip_suffix(extension).and_then(|s| s.strip_suffix('.')).unwrap_or(file_name),
        };
        let suffix = match extension.is_empty() {
            true => 0,
            false => extension.len() + 1,
        };
        let stem = truncate(stem, MAX_COMPONENT_BYTES.saturating_sub(suffix + disambiguator_room()));
        if stem.is_empty() {
            exn::bail!(ErrorKind::Path);
        }

        let parent = generated
            .parent()
            .map(|parent| {
                parent
                    .iter()
                    .map(|c| c.to_str().map(|c| truncate(c, MAX_COMPONENT_BYTES)).ok_or_raise(|| ErrorKind::Path))
                    .collect::<Result<PathBuf>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self { parent, stem: stem.to_string(), extension: extension.to_string() })
    }

    /// The path with disambiguator `n`; `0` means none.
    pub fn path(&self, n: u32) -> PathBuf {
        let mut name = self.stem.clone();
        if n > 0 {
            name.push_str(&format!(" ({n})"));
        }
        if !self.extension.is_empty() {
            name.push('.');
            name.push_str(&self.extension);
        }
        self.parent.join(name)
    }

    /// Every path worth trying, in order: undecorated, then `(1)`, `(2)`, ….
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        (0..=MAX_DISAMBIGUATOR).map(|n| self.path(n))
    }
}

/// Cut a string to at most `max_bytes`, on a character boundary, without
/// leaving trailing whitespace behind.
fn truncate(s: &str, max_bytes: usize) -> &str {
    match s.len() > max_bytes {
        true => s[..s.floor_char_boundary(max_bytes)].trim_end(),
        false => s,
    }
}

/// Find the first path for `candidate` that no file row claims (including
/// rows written earlier in `tx`) and that does not exist on disk.
pub(crate) async fn resolve(tx: &mut Transaction, root: &LibraryRoot, candidate: &Candidate) -> Result<PathBuf> {
    for path in candidate.paths() {
        if tx.filename_exists(&path).await.map_err(ErrorKind::store)? {
            continue;
        }
        if root.exists(&path).await.or_raise(|| ErrorKind::Filesystem)? {
            continue;
        }
        return Ok(path);
    }
    tracing::warn!(path = %candidate.path(0).display(), "every disambiguated filename is taken");
    exn::bail!(ErrorKind::Path);
}
