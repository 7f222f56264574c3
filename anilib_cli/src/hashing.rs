//! ED2K file hashing for the hash-file command

use anilib_core::error::{Error, InternalError, IoError};
use anilib_core::{FileHasher, FileHashes};
use async_trait::async_trait;
use md4::{Digest, Md4};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// ED2K chunk size (9.5 MiB)
const CHUNK_SIZE: usize = 9_728_000;

const READ_BUFFER: usize = 1024 * 1024;

/// Incremental ED2K state: md4 per full chunk, md4 over the chunk digests at the end
struct Ed2kState {
    chunk: Md4,
    chunk_len: usize,
    chunk_hashes: Vec<u8>,
    total: u64,
}

impl Ed2kState {
    fn new() -> Self {
        Self {
            chunk: Md4::new(),
            chunk_len: 0,
            chunk_hashes: Vec::new(),
            total: 0,
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        while !data.is_empty() {
            let take = (CHUNK_SIZE - self.chunk_len).min(data.len());
            self.chunk.update(&data[..take]);
            self.chunk_len += take;
            data = &data[take..];

            if self.chunk_len == CHUNK_SIZE {
                let digest = std::mem::replace(&mut self.chunk, Md4::new()).finalize();
                self.chunk_hashes.extend_from_slice(&digest);
                self.chunk_len = 0;
            }
        }
    }

    fn finalize(mut self) -> String {
        let full_chunks = self.chunk_hashes.len() / 16;

        // Less than one chunk: plain md4 of the data
        if full_chunks == 0 {
            return format!("{:x}", self.chunk.finalize());
        }

        // Exactly one chunk: its own digest
        if full_chunks == 1 && self.chunk_len == 0 {
            return hex(&self.chunk_hashes);
        }

        // Trailing partial chunk, or the empty chunk after an exact multiple
        let tail = self.chunk.finalize();
        self.chunk_hashes.extend_from_slice(&tail);

        let mut outer = Md4::new();
        outer.update(&self.chunk_hashes);
        format!("{:x}", outer.finalize())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute size and ED2K digest of a file on the blocking pool
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed2kHasher;

impl Ed2kHasher {
    pub fn new() -> Self {
        Self
    }

    fn hash_blocking(path: &Path) -> Result<FileHashes, Error> {
        let mut file = File::open(path).map_err(|e| open_error(path, e))?;
        let mut state = Ed2kState::new();
        let mut buffer = vec![0u8; READ_BUFFER];

        loop {
            let read = file.read(&mut buffer).map_err(|e| IoError::from_std(e).with_path(path))?;
            if read == 0 {
                break;
            }
            state.update(&buffer[..read]);
        }

        let size = state.total;
        Ok(FileHashes {
            size,
            ed2k: state.finalize(),
        })
    }
}

fn open_error(path: &Path, error: std::io::Error) -> Error {
    match error.kind() {
        ErrorKind::NotFound => IoError::file_not_found(path).into(),
        ErrorKind::PermissionDenied => IoError::permission_denied(path, error).into(),
        _ => IoError::from_std(error).with_path(path).into(),
    }
}

#[async_trait]
impl FileHasher for Ed2kHasher {
    async fn hash(&self, path: &Path) -> anilib_core::Result<FileHashes> {
        let path: PathBuf = path.to_path_buf();
        log::debug!("Hashing {}", path.display());
        tokio::task::spawn_blocking(move || Self::hash_blocking(&path))
            .await
            .map_err(|e| Error::from(InternalError::assertion(format!("hash task failed: {e}"))))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn digest(data: &[u8]) -> String {
        let mut state = Ed2kState::new();
        state.update(data);
        state.finalize()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(digest(b""), "31d6cfe0d16ae931b73c59d7e0c089c0");
    }

    #[test]
    fn test_small_input_is_plain_md4() {
        // RFC 1320 test vector
        assert_eq!(digest(b"abc"), "a448017aaf21d8525fc10ae87aa6729d");
    }

    #[test]
    fn test_split_updates_match_single_update() {
        let data = vec![7u8; CHUNK_SIZE + 1234];
        let mut state = Ed2kState::new();
        for piece in data.chunks(333_333) {
            state.update(piece);
        }
        assert_eq!(state.finalize(), digest(&data));
    }

    #[test]
    fn test_single_chunk_returns_chunk_digest() {
        let data = vec![1u8; CHUNK_SIZE];
        let mut md4 = Md4::new();
        md4.update(&data);
        assert_eq!(digest(&data), format!("{:x}", md4.finalize()));
    }

    #[test]
    fn test_two_chunks_append_empty_digest() {
        let data = vec![2u8; CHUNK_SIZE * 2];
        let chunk = Md4::digest(&data[..CHUNK_SIZE]);
        let mut joined = Vec::new();
        joined.extend_from_slice(&chunk);
        joined.extend_from_slice(&chunk);
        joined.extend_from_slice(&Md4::digest(b""));
        assert_eq!(digest(&data), format!("{:x}", Md4::digest(&joined)));
    }

    #[tokio::test]
    async fn test_hash_file_reports_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        let hashes = Ed2kHasher::new().hash(file.path()).await.unwrap();
        assert_eq!(hashes.size, 3);
        assert_eq!(hashes.ed2k, "a448017aaf21d8525fc10ae87aa6729d");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = Ed2kHasher::new()
            .hash(Path::new("/nonexistent/anilib/file.mkv"))
            .await;
        assert!(result.is_err());
    }
}
