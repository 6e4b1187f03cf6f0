use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::hash::HashInfo;
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Called after every chunk with (bytes hashed, total bytes)
pub type ProgressObserver = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Streaming SHA-256 over files of any size.
///
/// Reads one chunk at a time on the blocking pool, so memory use is bounded by
/// the chunk size. The cancellation token is checked at every chunk boundary.
#[derive(Clone)]
pub struct ContentHasher {
    chunk_size: usize,
    observer: Option<ProgressObserver>,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ContentHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Start hashing in the background
    pub fn spawn(&self, path: PathBuf, token: CancellationToken) -> HashTask {
        let chunk_size = self.chunk_size;
        let observer = self.observer.clone();
        let worker_token = token.clone();
        let handle = tokio::task::spawn_blocking(move || {
            hash_file(&path, chunk_size, &worker_token, observer.as_deref())
        });
        HashTask { handle, token }
    }

    /// Hash and wait for the digest
    pub async fn hash(&self, path: &Path, token: &CancellationToken) -> ClipcastResult<HashInfo> {
        self.spawn(path.to_path_buf(), token.clone()).join().await
    }
}

/// An in-flight hash computation
pub struct HashTask {
    handle: JoinHandle<ClipcastResult<HashInfo>>,
    token: CancellationToken,
}

impl HashTask {
    /// Request cancellation; safe to call any number of times
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub async fn join(self) -> ClipcastResult<HashInfo> {
        self.handle
            .await
            .map_err(|e| ClipcastError::Internal(format!("hash task failed: {}", e)))?
    }
}

fn hash_file(
    path: &Path,
    chunk_size: usize,
    token: &CancellationToken,
    observer: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
) -> ClipcastResult<HashInfo> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ClipcastError::FileNotFound(path.display().to_string()),
        _ => ClipcastError::Io(e),
    })?;
    let total = file.metadata()?.len();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size];
    let mut hashed: u64 = 0;

    loop {
        if token.is_cancelled() {
            LOGGER.log(
                LogLevel::Info,
                &format!(
                    "Hash of {} cancelled after {} of {} bytes",
                    path.display(),
                    hashed,
                    total
                ),
                "content::hasher",
            );
            return Err(ClipcastError::Cancelled);
        }

        let read = read_chunk(&mut file, &mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        hashed += read as u64;

        if let Some(observer) = observer {
            observer(hashed, total);
        }
    }

    let info = HashInfo::sha256_hex(hex::encode(hasher.finalize()));
    LOGGER.log(
        LogLevel::Debug,
        &format!("Hashed {} ({} bytes): {}", path.display(), hashed, info.value),
        "content::hasher",
    );
    Ok(info)
}

/// Fill `buffer` unless EOF comes first
fn read_chunk(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::{NamedTempFile, TempDir};

    fn file_with(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_digest_independent_of_chunk_size() {
        let data = patterned(200_003);
        let file = file_with(&data);
        let expected = HashInfo::from_bytes(&data);
        let token = CancellationToken::new();

        for chunk in [1usize << 10, 4096, 65536, 1 << 20] {
            let hash = ContentHasher::new(chunk)
                .hash(file.path(), &token)
                .await
                .unwrap();
            assert_eq!(hash, expected, "chunk size {}", chunk);
        }
    }

    #[tokio::test]
    async fn test_empty_file() {
        let file = file_with(b"");
        let hash = ContentHasher::default()
            .hash(file.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            hash.value,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ContentHasher::default()
            .hash(&dir.path().join("gone.mp4"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClipcastError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let data = patterned(10_000);
        let file = file_with(&data);
        let last = Arc::new(AtomicU64::new(0));
        let seen = last.clone();
        let hasher = ContentHasher::new(1024).with_observer(Arc::new(move |done, total| {
            assert!(done <= total);
            seen.store(done, Ordering::SeqCst);
        }));

        hasher.hash(file.path(), &CancellationToken::new()).await.unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 10_000);
    }

    #[tokio::test]
    async fn test_cancel_midway_yields_no_digest() {
        let data = patterned(1 << 20);
        let file = file_with(&data);
        let token = CancellationToken::new();
        let observer_token = token.clone();
        let hasher = ContentHasher::new(64 * 1024).with_observer(Arc::new(move |done, total| {
            if done * 2 >= total {
                observer_token.cancel();
            }
        }));

        let task = hasher.spawn(file.path().to_path_buf(), token);
        let result = task.join().await;
        assert!(matches!(result, Err(ClipcastError::Cancelled)));
        // Only the input file remains
        assert!(file.path().exists());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let data = patterned(4096);
        let file = file_with(&data);
        let token = CancellationToken::new();
        token.cancel();

        let task = ContentHasher::new(512).spawn(file.path().to_path_buf(), token);
        task.cancel();
        task.cancel();
        assert!(task.token().is_cancelled());
        assert!(matches!(task.join().await, Err(ClipcastError::Cancelled)));
    }
}
