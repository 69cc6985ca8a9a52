use std::{fmt, io, path::PathBuf};

use shared::domain::EventId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Sections,
    Sessions,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Collection::Sections => "section",
            Collection::Sessions => "session",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} {event_id}/{id} not found")]
    NotFound {
        collection: Collection,
        event_id: EventId,
        id: String,
    },
    #[error("{collection} {event_id}/{id} already exists")]
    DuplicateKey {
        collection: Collection,
        event_id: EventId,
        id: String,
    },
    #[error("schedule store unavailable: {0}")]
    StorageUnavailable(String),
    #[error("failed to create parent directory '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sqlite: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("invalid session payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::StorageUnavailable(_) | StoreError::Database(sqlx::Error::PoolClosed)
        )
    }
}
