//! File version fingerprints.
//!
//! A version token summarizes a file's identity and content cheaply enough
//! to be computed on every read and every apply attempt. It is a change
//! detector, not a tamper-proof digest: small files are hashed whole, large
//! files contribute only their head and tail bytes alongside size and mtime.

use sha2::{Digest, Sha256};
use std::fs::{self, File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::models::VersionToken;
use crate::{Error, Result};

/// Files at or below this size are hashed in full.
const FULL_HASH_LIMIT: u64 = 64 * 1024;

/// Bytes sampled from each end of larger files.
const SAMPLE_BYTES: u64 = 32 * 1024;

/// Compute the version token for the file at `path`.
pub fn compute_version_token(path: &Path) -> Result<VersionToken> {
    let metadata = fs::metadata(path).map_err(|e| Error::from_io(e, path))?;
    if !metadata.is_file() {
        return Err(Error::InvalidInput(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(metadata.len().to_le_bytes());
    hash_mtime(&mut hasher, &metadata);
    hash_identity(&mut hasher, &metadata);

    let mut file = File::open(path).map_err(|e| Error::from_io(e, path))?;
    hash_content(&mut hasher, &mut file, metadata.len())?;

    let hash_hex = format!("{:x}", hasher.finalize());
    Ok(VersionToken::new(format!(
        "{}-{}",
        metadata.len(),
        &hash_hex[..16]
    )))
}

fn hash_mtime(hasher: &mut Sha256, metadata: &Metadata) {
    // Filesystems without mtime support still get a stable token.
    if let Ok(since_epoch) = metadata
        .modified()
        .and_then(|m| m.duration_since(UNIX_EPOCH).map_err(std::io::Error::other))
    {
        hasher.update(since_epoch.as_secs().to_le_bytes());
        hasher.update(since_epoch.subsec_nanos().to_le_bytes());
    }
}

/// Atomic writes rename a fresh inode over the path, so folding the inode in
/// guarantees a committed write changes the token even for identical bytes.
#[cfg(unix)]
fn hash_identity(hasher: &mut Sha256, metadata: &Metadata) {
    use std::os::unix::fs::MetadataExt;
    hasher.update(metadata.dev().to_le_bytes());
    hasher.update(metadata.ino().to_le_bytes());
}

#[cfg(not(unix))]
fn hash_identity(hasher: &mut Sha256, metadata: &Metadata) {
    if let Ok(since_epoch) = metadata
        .created()
        .and_then(|m| m.duration_since(UNIX_EPOCH).map_err(std::io::Error::other))
    {
        hasher.update(since_epoch.as_nanos().to_le_bytes());
    }
}

fn hash_content(hasher: &mut Sha256, file: &mut File, len: u64) -> Result<()> {
    if len <= FULL_HASH_LIMIT {
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf)?;
        hasher.update(&buf);
        return Ok(());
    }

    let mut buf = vec![0u8; SAMPLE_BYTES as usize];
    file.read_exact(&mut buf)?;
    hasher.update(&buf);

    file.seek(SeekFrom::Start(len - SAMPLE_BYTES))?;
    file.read_exact(&mut buf)?;
    hasher.update(&buf);
    Ok(())
}
