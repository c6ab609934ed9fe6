use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl StorageError {
    pub fn is_bucket_missing(&self) -> bool {
        match self {
            StorageError::Status { message, .. } => {
                message.to_ascii_lowercase().contains("bucket not found")
            }
            StorageError::Transport(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("storage bucket \"{bucket}\" not found; create it in the storage backend first")]
    BucketMissing { bucket: &'static str },
    #[error("failed to upload config: {0}")]
    Write(String),
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_missing_matches_either_case() {
        let err = StorageError::Status {
            status: 404,
            message: "Bucket not found".to_string(),
        };
        assert!(err.is_bucket_missing());

        let err = StorageError::Status {
            status: 400,
            message: "new row violates row-level security policy".to_string(),
        };
        assert!(!err.is_bucket_missing());
    }
}
