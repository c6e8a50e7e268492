use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::root::map_io_error;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

const READ_BUFFER: usize = 64 * 1024;

/// Read the size, modification time and content hash of a file that is about
/// to be imported.
///
/// The content is streamed through BLAKE3 rather than read into memory in one
/// go; some scanned PDFs run to hundreds of megabytes.
pub async fn inspect(path: impl AsRef<Path>) -> Result<FileInfo> {
    let path = path.as_ref();
    let mut file = fs::File::open(path).await.map_err(|e| map_io_error(e, path))?;
    let metadata = file.metadata().await.map_err(|e| map_io_error(e, path))?;
    if !metadata.is_file() {
        exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
    }
    let modified = metadata.modified().map_err(ErrorKind::Io)?.into();

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; READ_BUFFER];
    loop {
        let read = file.read(&mut buffer).await.map_err(ErrorKind::Io)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        size: metadata.len(),
        modified,
        file_hash: hasher.finalize().to_string(),
    })
}
