//! Executor checksums
//!
//! MD5 is used as a version fingerprint only. It detects drift between the
//! local and remote executor, not tampering.

use md5::{Digest, Md5};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const READ_BUF_SIZE: usize = 1024;

/// Lower-case hex MD5 of the file at `path`, read in fixed-size chunks
pub async fn file_md5(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
