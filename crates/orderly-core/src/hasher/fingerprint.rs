use crate::reader::read_head_tail;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const FINGERPRINT_DOMAIN: &[u8] = b"orderly.fingerprint.v1";

/// Composite content identity: size, whole-second mtime, and the head/tail
/// windows of the file, digested with BLAKE3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub digest: String,
    pub size: u64,
    pub mtime: i64,
    pub bytes_read: u64,
}

/// Fingerprint a single file, reading at most `2 * window` bytes.
pub fn fingerprint(path: &Path, window: u64) -> io::Result<FileFingerprint> {
    let metadata = fs::metadata(path)?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let (sample, size) = read_head_tail(path, window, window)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(FINGERPRINT_DOMAIN);
    hasher.update(&size.to_le_bytes());
    hasher.update(&mtime.to_le_bytes());
    hasher.update(&sample);

    Ok(FileFingerprint {
        digest: hasher.finalize().to_hex().to_string(),
        size,
        mtime,
        bytes_read: sample.len() as u64,
    })
}

/// Fingerprint a batch in parallel. Results line up with `paths`.
pub fn fingerprint_all(paths: &[PathBuf], window: u64) -> Vec<io::Result<FileFingerprint>> {
    paths
        .par_iter()
        .map(|path| fingerprint(path, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("test.txt");
        fs::write(&path, "Hello World".repeat(1000)).unwrap();

        let a = fingerprint(&path, 4096).unwrap();
        let b = fingerprint(&path, 4096).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.size, 11_000);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_fingerprint_reads_bounded_window() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("large.bin");
        fs::write(&path, vec![7u8; 1_000_000]).unwrap();

        let fp = fingerprint(&path, 4096).unwrap();
        assert_eq!(fp.bytes_read, 8192);
        assert_eq!(fp.size, 1_000_000);
    }

    #[test]
    fn test_fingerprint_small_file_read_whole() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tiny.txt");
        fs::write(&path, "abc").unwrap();

        let fp = fingerprint(&path, 4096).unwrap();
        assert_eq!(fp.bytes_read, 3);
    }

    #[test]
    fn test_fingerprint_detects_tail_change() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        let mut data = vec![0u8; 100_000];
        fs::write(&a, &data).unwrap();
        data[99_999] = 1;
        fs::write(&b, &data).unwrap();

        // Same header, same size; only the tail differs.
        let fa = fingerprint(&a, 1024).unwrap();
        let fb = fingerprint(&b, 1024).unwrap();
        assert_ne!(fa.digest, fb.digest);
    }

    #[test]
    fn test_fingerprint_missing_file_is_io_error() {
        let tmp = tempdir().unwrap();
        let err = fingerprint(&tmp.path().join("nope"), 4096).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fingerprint_all_preserves_order() {
        let tmp = tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| {
                let p = tmp.path().join(format!("f{}.txt", i));
                fs::write(&p, format!("content {}", i)).unwrap();
                p
            })
            .collect();

        let batch = fingerprint_all(&paths, 4096);
        for (path, result) in paths.iter().zip(batch) {
            assert_eq!(result.unwrap(), fingerprint(path, 4096).unwrap());
        }
    }
}
