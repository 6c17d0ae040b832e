//! Upload records and the restartable sources that produce them.

use serde::{Deserialize, Serialize};

/// One record to attach a payload to.
///
/// The driver uses `id` as the destination key. A placeholder occupies its
/// index in the scan (so later records keep their seeds and routing) but gets
/// no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Destination key (e.g. `Movies/1`).
    pub id: String,
    /// Human readable name, used in logs.
    pub display_name: String,
    #[serde(default)]
    pub placeholder: bool,
}

impl UploadRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            placeholder: false,
        }
    }

    /// A record that counts toward the scan without being uploaded.
    pub fn placeholder(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            placeholder: true,
            ..Self::new(id, display_name)
        }
    }
}

/// Boxed record iterator returned by [`RecordSource::open`].
pub type RecordIter<'a> = Box<dyn Iterator<Item = anyhow::Result<UploadRecord>> + Send + 'a>;

/// A finite record source that can be scanned again from the beginning.
///
/// Every call to `open` must yield the same records in the same order. The
/// driver calls it once per scan attempt and skips checkpointed records by
/// iterating over them, so `open` should be cheap.
pub trait RecordSource: Send + Sync {
    fn open(&self) -> anyhow::Result<RecordIter<'_>>;
}

/// In-memory record source.
#[derive(Debug, Clone, Default)]
pub struct VecRecordSource {
    records: Vec<UploadRecord>,
}

impl VecRecordSource {
    pub fn new(records: Vec<UploadRecord>) -> Self {
        Self { records }
    }

    /// `count` records with ids `{prefix}/{i}` for `i` in `0..count`.
    pub fn sequential(prefix: &str, count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| UploadRecord::new(format!("{prefix}/{i}"), format!("record {i}")))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for VecRecordSource {
    fn open(&self) -> anyhow::Result<RecordIter<'_>> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let source = VecRecordSource::sequential("Movies", 3);
        let ids: Vec<String> = source
            .open()
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["Movies/0", "Movies/1", "Movies/2"]);
    }

    #[test]
    fn test_placeholder_deserializes_with_default() {
        let record: UploadRecord =
            serde_json::from_str(r#"{"id":"Movies/1","display_name":"Toy Story"}"#).unwrap();
        assert!(!record.placeholder);
        assert!(UploadRecord::placeholder("Movies/2", "Babylon 5").placeholder);
    }

    #[test]
    fn test_open_is_restartable() {
        let source = VecRecordSource::sequential("r", 5);
        let first: Vec<_> = source.open().unwrap().map(|r| r.unwrap()).collect();
        let second: Vec<_> = source.open().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(first, second);
    }
}
