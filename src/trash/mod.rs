//! Local trash bin for deleted dashboard records.
//!
//! Items are kept newest-first and the whole list is written back to durable
//! storage on every mutation. `restore` only drops the local entry; nothing is
//! recreated on the server.

use std::rc::Rc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::{load_json, save_json, KeyValueStore};

pub(crate) const TRASH_KEY: &str = "trash_bin";

const RESERVED_FIELDS: [&str; 3] = ["id", "type", "deletedAt"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "deletedAt")]
    pub deleted_at: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TrashItem {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// A record handed to the trash bin by a page-level delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrashRecord {
    pub id: Option<String>,
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl TrashRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

pub struct SoftDeleteBuffer {
    store: Rc<dyn KeyValueStore>,
    items: Vec<TrashItem>,
}

impl SoftDeleteBuffer {
    /// Reloads the persisted buffer, starting empty if it is unreadable.
    pub fn open(store: Rc<dyn KeyValueStore>) -> Self {
        let items = match load_json::<Vec<TrashItem>>(store.as_ref(), TRASH_KEY) {
            Ok(items) => items.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(?err, "discarding unreadable trash bin");
                if let Err(err) = store.remove(TRASH_KEY) {
                    tracing::warn!(?err, "failed to discard unreadable trash bin");
                }
                Vec::new()
            }
        };
        tracing::debug!(count = items.len(), "loaded trash bin");
        Self { store, items }
    }

    pub fn items(&self) -> &[TrashItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&TrashItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_by_type(&self, kind: &str) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }

    pub fn add(&mut self, record: TrashRecord) -> TrashItem {
        let TrashRecord {
            id,
            kind,
            mut fields,
        } = record;
        for reserved in RESERVED_FIELDS {
            fields.remove(reserved);
        }

        let now = Utc::now();
        let id = match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                if self.take(&id).is_some() {
                    tracing::debug!(%id, "replacing existing trash entry");
                }
                id
            }
            None => self.generate_id(now.timestamp_millis()),
        };

        let item = TrashItem {
            id,
            kind,
            deleted_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            fields,
        };
        tracing::debug!(id = %item.id, kind = %item.kind, "moved record to trash");
        self.items.insert(0, item.clone());
        self.persist();
        item
    }

    /// Removes the matching item; absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<TrashItem> {
        let removed = self.take(id);
        if removed.is_some() {
            tracing::debug!(%id, "removed trash entry");
        }
        self.persist();
        removed
    }

    /// Drops the local entry only; the server-side record is not recreated.
    pub fn restore(&mut self, id: &str) -> Option<TrashItem> {
        self.remove(id)
    }

    pub fn clear(&mut self) {
        tracing::debug!(count = self.items.len(), "clearing trash bin");
        self.items.clear();
        self.persist();
    }

    fn take(&mut self, id: &str) -> Option<TrashItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    fn generate_id(&self, millis: i64) -> String {
        let base = millis.to_string();
        if self.get(&base).is_none() {
            return base;
        }
        let mut suffix = 1_u64;
        loop {
            let candidate = format!("{base}-{suffix}");
            if self.get(&candidate).is_none() {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn persist(&self) {
        if let Err(err) = save_json(self.store.as_ref(), TRASH_KEY, &self.items) {
            tracing::warn!(?err, "failed to persist trash bin; keeping in-memory state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use chrono::DateTime;

    fn memory_buffer() -> (Rc<MemoryStore>, SoftDeleteBuffer) {
        let store = Rc::new(MemoryStore::new());
        let buffer = SoftDeleteBuffer::open(store.clone());
        (store, buffer)
    }

    fn employee(name: &str) -> TrashRecord {
        TrashRecord::new("employee")
            .with_field("name", format!("Deleted Employee: {name}"))
            .with_field("details", "Position: Teacher, Department: Science")
    }

    #[test]
    fn add_then_restore_scenario() {
        let (_, mut buffer) = memory_buffer();
        let before = Utc::now();
        let item = buffer.add(TrashRecord::new("employee").with_field("name", "Alice"));

        assert_eq!(buffer.len(), 1);
        assert_eq!(item.kind, "employee");
        assert_eq!(item.field("name"), Some("Alice"));
        let deleted_at = DateTime::parse_from_rfc3339(&item.deleted_at)
            .expect("deletedAt should be RFC 3339");
        assert!(deleted_at <= Utc::now());
        assert!(deleted_at.timestamp_millis() >= before.timestamp_millis());

        let restored = buffer.restore(&item.id);
        assert_eq!(restored.as_ref(), Some(&item));
        assert!(buffer.is_empty());
    }

    #[test]
    fn add_keeps_newest_first() {
        let (_, mut buffer) = memory_buffer();
        let a = buffer.add(employee("Alice"));
        let b = buffer.add(employee("Bob"));
        assert_eq!(buffer.items()[0], b);
        assert_eq!(buffer.items()[1], a);
    }

    #[test]
    fn add_uses_given_id_and_generates_distinct_ids_otherwise() {
        let (_, mut buffer) = memory_buffer();
        let given = buffer.add(employee("Alice").with_id(42));
        assert_eq!(given.id, "42");

        let blank = buffer.add(employee("Bob").with_id("  "));
        assert!(!blank.id.trim().is_empty());

        let ids: Vec<String> = (0..5)
            .map(|_| buffer.add(employee("Carol")).id)
            .collect();
        let mut all: Vec<&str> = buffer.items().iter().map(|item| item.id.as_str()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), buffer.len());
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn add_with_existing_id_replaces_older_entry() {
        let (_, mut buffer) = memory_buffer();
        buffer.add(employee("Alice").with_id("7"));
        buffer.add(employee("Bob"));
        let again = buffer.add(TrashRecord::new("student").with_id("7"));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.items()[0], again);
        assert_eq!(buffer.count_by_type("student"), 1);
        assert_eq!(buffer.count_by_type("employee"), 1);
    }

    #[test]
    fn reserved_fields_in_display_bag_are_ignored() {
        let (_, mut buffer) = memory_buffer();
        let item = buffer.add(
            TrashRecord::new("student")
                .with_field("type", "spoofed")
                .with_field("deletedAt", "yesterday")
                .with_field("name", "Dana"),
        );
        assert_eq!(item.kind, "student");
        assert_ne!(item.deleted_at, "yesterday");
        assert_eq!(item.fields.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let (store, mut buffer) = memory_buffer();
        let a = buffer.add(employee("Alice"));
        buffer.add(employee("Bob"));

        assert!(buffer.remove(&a.id).is_some());
        let once = buffer.items().to_vec();
        let persisted_once = store.get(TRASH_KEY).unwrap();

        assert!(buffer.remove(&a.id).is_none());
        assert_eq!(buffer.items(), once.as_slice());
        assert_eq!(store.get(TRASH_KEY).unwrap(), persisted_once);
    }

    #[test]
    fn every_mutation_is_persisted_before_returning() {
        let (store, mut buffer) = memory_buffer();
        let stored = |store: &MemoryStore| {
            load_json::<Vec<TrashItem>>(store, TRASH_KEY)
                .unwrap()
                .unwrap_or_default()
        };

        let a = buffer.add(employee("Alice"));
        assert_eq!(stored(store.as_ref()), buffer.items());
        buffer.add(employee("Bob"));
        assert_eq!(stored(store.as_ref()), buffer.items());
        buffer.remove(&a.id);
        assert_eq!(stored(store.as_ref()), buffer.items());
        buffer.clear();
        assert!(stored(store.as_ref()).is_empty());
    }

    #[test]
    fn reopened_buffer_equals_original() {
        let (store, mut buffer) = memory_buffer();
        let a = buffer.add(employee("Alice").with_field("email", "alice@school.test"));
        buffer.add(employee("Bob").with_field("phone", "+1 555 0100"));
        buffer.add(TrashRecord::new("student").with_id("s-1"));
        buffer.remove(&a.id);

        let reopened = SoftDeleteBuffer::open(store);
        assert_eq!(reopened.items(), buffer.items());
    }

    #[test]
    fn file_backed_buffer_survives_reload() {
        let mut root = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        root.push(format!("campusdesk-trash-{}-{nanos}", std::process::id()));

        let store: Rc<dyn KeyValueStore> = Rc::new(FileStore::with_root(root.clone()));
        let mut buffer = SoftDeleteBuffer::open(Rc::clone(&store));
        buffer.add(employee("Alice"));
        buffer.add(TrashRecord::new("transaction").with_id(9001));

        let reopened = SoftDeleteBuffer::open(store);
        assert_eq!(reopened.items(), buffer.items());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn malformed_persisted_buffer_starts_empty_and_is_discarded() {
        let store = Rc::new(MemoryStore::new());
        store.set(TRASH_KEY, "{ not a list").unwrap();

        let mut buffer = SoftDeleteBuffer::open(store.clone());
        assert!(buffer.is_empty());
        assert_eq!(store.get(TRASH_KEY).unwrap(), None);

        buffer.add(employee("Alice"));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn storage_failure_keeps_in_memory_state() {
        let (store, mut buffer) = memory_buffer();
        store.set_available(false);
        let item = buffer.add(employee("Alice"));
        assert_eq!(buffer.get(&item.id), Some(&item));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_empties_buffer() {
        let (_, mut buffer) = memory_buffer();
        buffer.add(employee("Alice"));
        buffer.add(employee("Bob"));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.count_by_type("employee"), 0);
    }
}
