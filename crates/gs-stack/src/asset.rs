use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::{DATA_DIR, StagedArchive};
use crate::{Error, Result};

/// Stage a local archive: hash it and work out where it lands on the instance.
pub fn stage_archive(path: &Path, bucket: &str) -> Result<StagedArchive> {
    let bytes = std::fs::read(path).map_err(|source| Error::Asset {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(stage_bytes(path, &bytes, bucket))
}

/// Like [`stage_archive`] for contents already in memory.
pub fn stage_bytes(path: &Path, bytes: &[u8], bucket: &str) -> StagedArchive {
    let digest = Sha256::digest(bytes);
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let object_key = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{hash}.{ext}"),
        None => hash,
    };

    tracing::debug!(path = %path.display(), key = %object_key, "staged archive");

    StagedArchive {
        source_path: path.to_path_buf(),
        bucket: bucket.to_string(),
        instance_path: format!("{DATA_DIR}/{object_key}"),
        object_key,
    }
}

impl StagedArchive {
    /// Download path used before the archive is moved under `/data`.
    pub fn download_path(&self) -> String {
        format!("/tmp/{}", self.object_key)
    }

    /// Commands that fetch the uploaded object and move it into place.
    pub fn staging_commands(&self) -> Vec<String> {
        let download = self.download_path();
        vec![
            format!("mkdir -p $(dirname '{download}')"),
            format!(
                "aws s3 cp 's3://{}/{}' '{download}'",
                self.bucket, self.object_key
            ),
            format!("mv {download} {}", self.instance_path),
        ]
    }
}
