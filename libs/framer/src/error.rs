use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("asset not found {0}")]
    AssetNotFound(String),
    #[error("property not found {property_id} on asset {asset_id}")]
    PropertyNotFound {
        asset_id: String,
        property_id: String,
    },
    #[error("resolver {0}")]
    Resolver(String),
    #[error("cancelled")]
    Cancelled,
    #[error("invalid timestamp {seconds}s + {nanos}ns")]
    InvalidTimestamp { seconds: i64, nanos: i64 },
    #[error("column {column} has {actual} rows, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("frame schema mismatch {0}")]
    SchemaMismatch(String),
    #[error("arrow {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("io {0}")]
    Io(#[from] std::io::Error),
    #[error("json {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// True for the errors a [`crate::Resolver`] reports when it cannot produce metadata.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::AssetNotFound(_) | Error::PropertyNotFound { .. } | Error::Resolver(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
