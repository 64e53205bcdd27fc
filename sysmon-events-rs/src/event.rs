// sysmon-events-rs/src/event.rs
//
// Raw and canonical event shapes

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Placeholder process identity; exports in scope never carry one
pub const UNKNOWN_PROCESS: &str = "Unknown";

/// Message used when an inbound event omits its message entirely
pub const MISSING_MESSAGE: &str = "No log message";

/// One of the two named event partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Benign,
    Malicious,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Benign, Collection::Malicious];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Benign => "benign",
            Collection::Malicious => "malicious",
        }
    }

    /// File name of the tabular source backing this collection
    pub fn source_file(&self) -> &'static str {
        match self {
            Collection::Benign => "benign_events.csv",
            Collection::Malicious => "malicious_events.csv",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "benign" => Ok(Collection::Benign),
            "malicious" => Ok(Collection::Malicious),
            other => Err(UnknownCollection(other.to_string())),
        }
    }
}

/// A header-keyed row as produced by the tabular source.
///
/// Column order is kept so the serialized fallback message reads like the source row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    columns: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip a header record with a data record. Short rows simply lack the trailing
    /// columns; surplus fields without a header are dropped.
    pub fn from_record(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    /// Value of the first column named exactly `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (key, value) in &self.columns {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Canonical security event.
///
/// Deserialization is lenient so that events echoed back by a client (including the
/// older `taskCategory`/`processName`/`Message` spellings) are accepted. When both
/// spellings are present the canonical one wins. Null counts as absent, and unknown
/// fields such as a duplicated `eventId` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "InboundEvent")]
pub struct Event {
    pub id: String,
    pub category: String,
    pub timestamp: String,
    pub process: String,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundEvent {
    id: Option<String>,
    category: Option<String>,
    task_category: Option<String>,
    timestamp: Option<String>,
    process: Option<String>,
    process_name: Option<String>,
    message: Option<String>,
    #[serde(rename = "Message")]
    legacy_message: Option<String>,
}

impl From<InboundEvent> for Event {
    fn from(inbound: InboundEvent) -> Self {
        Self {
            id: inbound.id.unwrap_or_default(),
            category: inbound.category.or(inbound.task_category).unwrap_or_default(),
            timestamp: inbound.timestamp.unwrap_or_default(),
            process: inbound
                .process
                .or(inbound.process_name)
                .unwrap_or_else(default_process),
            message: inbound
                .message
                .or(inbound.legacy_message)
                .unwrap_or_else(default_message),
        }
    }
}

fn default_process() -> String {
    UNKNOWN_PROCESS.to_string()
}

fn default_message() -> String {
    MISSING_MESSAGE.to_string()
}

impl Event {
    /// Event carrying only a message, as used for ad hoc explanation requests
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            category: String::new(),
            timestamp: String::new(),
            process: default_process(),
            message: message.into(),
        }
    }
}

/// Project an event back onto the primary source column names
impl From<&Event> for RawRow {
    fn from(event: &Event) -> Self {
        RawRow::from_iter([
            ("TimeCreated", event.timestamp.as_str()),
            ("Id", event.id.as_str()),
            ("LevelDisplayName", event.category.as_str()),
            ("Message", event.message.as_str()),
        ])
    }
}
