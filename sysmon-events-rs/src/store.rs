// sysmon-events-rs/src/store.rs
//
// Read-only access to the benign and malicious event collections.
//
// Every load re-reads its CSV source from disk. A missing source is reported as
// `SourceNotFound`, never as an empty collection, and any row the CSV reader cannot
// tokenize fails the whole load.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::event::{Collection, Event, RawRow};
use crate::normalizer::normalize;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} source not found at {}", path.display())]
    SourceNotFound { collection: Collection, path: PathBuf },

    #[error("Failed to read {collection} source: {source}")]
    Io {
        collection: Collection,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {collection} source: {source}")]
    ParseFailure {
        collection: Collection,
        #[source]
        source: csv::Error,
    },
}

impl StoreError {
    pub fn collection(&self) -> Collection {
        match self {
            StoreError::SourceNotFound { collection, .. }
            | StoreError::Io { collection, .. }
            | StoreError::ParseFailure { collection, .. } => *collection,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::SourceNotFound { .. })
    }
}

/// Parse a header-led CSV stream into events, preserving row order.
///
/// Extra columns are carried into the raw row and ignored by the normalizer; rows
/// with fewer fields than the header are accepted.
pub fn read_events<R: Read>(reader: R) -> Result<Vec<Event>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut events = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        events.push(normalize(&RawRow::from_record(&headers, &record), index));
    }
    Ok(events)
}

/// Event collections backed by CSV exports in a single directory
#[derive(Debug, Clone)]
pub struct EventStore {
    logs_dir: PathBuf,
}

impl EventStore {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    /// Store rooted at `LOGS_DIR` (default `logs`)
    pub fn from_env() -> Self {
        Self::new(config_rs::get_logs_dir())
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn source_path(&self, collection: Collection) -> PathBuf {
        self.logs_dir.join(collection.source_file())
    }

    /// Load every event of `collection`
    pub async fn load(&self, collection: Collection) -> Result<Vec<Event>, StoreError> {
        let path = self.source_path(collection);
        log::debug!("Loading {} events from {}", collection, path.display());

        let events = tokio::task::spawn_blocking(move || load_blocking(collection, path))
            .await
            .map_err(|err| StoreError::Io {
                collection,
                source: io::Error::other(err),
            })??;

        log::info!("Loaded {} {} events", events.len(), collection);
        Ok(events)
    }

    /// Load both collections concurrently as `(benign, malicious)`
    pub async fn load_all(&self) -> Result<(Vec<Event>, Vec<Event>), StoreError> {
        tokio::try_join!(
            self.load(Collection::Benign),
            self.load(Collection::Malicious)
        )
    }
}

fn load_blocking(collection: Collection, path: PathBuf) -> Result<Vec<Event>, StoreError> {
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::SourceNotFound { collection, path });
        }
        Err(source) => return Err(StoreError::Io { collection, source }),
    };
    if !file.metadata().map(|meta| meta.is_file()).unwrap_or(false) {
        return Err(StoreError::SourceNotFound { collection, path });
    }

    read_events(io::BufReader::new(file))
        .map_err(|source| StoreError::ParseFailure { collection, source })
}
