//! Identity cache of live objects, with archival-state subscriptions.
//!
//! Materialised snapshots observe their scope parent's `archived` flag through
//! an [`ArchiveWatch`]. The watch is a `tokio::sync::watch` receiver: dropping
//! it unsubscribes, and evicting the parent closes the channel.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;

use crate::object::{LiveObject, ObjectRef};

struct Entry {
  object:   LiveObject,
  archived: watch::Sender<bool>,
}

#[derive(Default)]
pub struct ObjectCache {
  entries: Mutex<HashMap<ObjectRef, Entry>>,
}

impl ObjectCache {
  pub fn new() -> Self { Self::default() }

  fn entries(&self) -> MutexGuard<'_, HashMap<ObjectRef, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Insert or replace an object. Existing watchers are kept and notified if
  /// the archival state changed.
  pub fn insert(&self, object: LiveObject) {
    let key = ObjectRef::new(&object.type_name, object.id);
    let mut entries = self.entries();
    match entries.get_mut(&key) {
      Some(entry) => {
        let archived = object.archived;
        entry.object = object;
        entry.archived.send_if_modified(|current| {
          let changed = *current != archived;
          *current = archived;
          changed
        });
      }
      None => {
        let (archived, _) = watch::channel(object.archived);
        entries.insert(key, Entry { object, archived });
      }
    }
  }

  /// Replace an object only if it is already cached, notifying watchers.
  ///
  /// Returns `false` (and caches nothing) otherwise.
  pub fn update(&self, object: LiveObject) -> bool {
    let key = ObjectRef::new(&object.type_name, object.id);
    if !self.contains(&key) {
      return false;
    }
    self.insert(object);
    true
  }

  pub fn get(&self, key: &ObjectRef) -> Option<LiveObject> {
    self.entries().get(key).map(|e| e.object.clone())
  }

  pub fn contains(&self, key: &ObjectRef) -> bool { self.entries().contains_key(key) }

  /// Toggle a cached object's `archived` flag and notify watchers.
  ///
  /// Returns `false` if the object is not cached.
  pub fn set_archived(&self, key: &ObjectRef, archived: bool) -> bool {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      return false;
    };
    entry.object.archived = archived;
    entry.archived.send_replace(archived);
    true
  }

  /// Subscribe to the archival state of a cached object.
  pub fn watch_archived(&self, key: &ObjectRef) -> Option<ArchiveWatch> {
    self.entries().get(key).map(|entry| ArchiveWatch {
      parent: key.clone(),
      rx:     entry.archived.subscribe(),
    })
  }

  /// Number of live subscriptions on `key`'s archival state.
  pub fn watcher_count(&self, key: &ObjectRef) -> usize {
    self
      .entries()
      .get(key)
      .map_or(0, |entry| entry.archived.receiver_count())
  }

  /// Drop an entry. Watchers of an evicted object detach and keep the last
  /// state they observed.
  pub fn evict(&self, key: &ObjectRef) -> Option<LiveObject> {
    self.entries().remove(key).map(|entry| entry.object)
  }

  pub fn len(&self) -> usize { self.entries().len() }

  pub fn is_empty(&self) -> bool { self.entries().is_empty() }
}

/// A subscription to a scope parent's `archived` flag.
#[derive(Debug, Clone)]
pub struct ArchiveWatch {
  parent: ObjectRef,
  rx:     watch::Receiver<bool>,
}

impl ArchiveWatch {
  pub fn parent(&self) -> &ObjectRef { &self.parent }

  /// The parent's current archival state, or the last one observed once the
  /// parent has been evicted.
  pub fn is_archived(&self) -> bool { *self.rx.borrow() }

  /// Whether the parent has been evicted from the cache.
  pub fn is_detached(&self) -> bool { self.rx.has_changed().is_err() }

  /// Wait for the next change. Returns `false` once the parent is gone.
  pub async fn changed(&mut self) -> bool { self.rx.changed().await.is_ok() }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use serde_json::Map;

  use super::*;

  fn audit(id: i64) -> LiveObject {
    LiveObject {
      id,
      type_name: "Audit".into(),
      title: "2026 SOX audit".into(),
      description: None,
      archived: false,
      access_control_list: vec![],
      attributes: Map::new(),
      last_assessment_date: None,
      version: 1,
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn watch_follows_archival_toggles() {
    let cache = ObjectCache::new();
    let key = ObjectRef::new("Audit", 1);
    cache.insert(audit(1));

    let watch = cache.watch_archived(&key).unwrap();
    assert!(!watch.is_archived());

    assert!(cache.set_archived(&key, true));
    assert!(watch.is_archived());
    assert!(cache.get(&key).unwrap().archived);

    let mut restored = audit(1);
    restored.archived = false;
    cache.insert(restored);
    assert!(!watch.is_archived());
  }

  #[test]
  fn dropping_watch_unsubscribes() {
    let cache = ObjectCache::new();
    let key = ObjectRef::new("Audit", 1);
    cache.insert(audit(1));

    let a = cache.watch_archived(&key).unwrap();
    let b = cache.watch_archived(&key).unwrap();
    assert_eq!(cache.watcher_count(&key), 2);
    drop(a);
    assert_eq!(cache.watcher_count(&key), 1);
    drop(b);
    assert_eq!(cache.watcher_count(&key), 0);
  }

  #[test]
  fn eviction_detaches_watchers() {
    let cache = ObjectCache::new();
    let key = ObjectRef::new("Audit", 1);
    cache.insert(audit(1));
    let watch = cache.watch_archived(&key).unwrap();
    cache.set_archived(&key, true);

    assert!(cache.evict(&key).is_some());
    assert!(watch.is_detached());
    assert!(watch.is_archived());
    assert!(!cache.set_archived(&key, false));
  }

  #[test]
  fn update_only_touches_cached_objects() {
    let cache = ObjectCache::new();
    assert!(!cache.update(audit(2)));
    assert!(cache.is_empty());

    let key = ObjectRef::new("Audit", 1);
    cache.insert(audit(1));
    let watch = cache.watch_archived(&key).unwrap();
    let mut archived = audit(1);
    archived.archived = true;
    assert!(cache.update(archived));
    assert!(watch.is_archived());
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn missing_objects_cannot_be_watched() {
    let cache = ObjectCache::new();
    assert!(cache.watch_archived(&ObjectRef::new("Audit", 9)).is_none());
    assert_eq!(cache.watcher_count(&ObjectRef::new("Audit", 9)), 0);
  }

  #[tokio::test]
  async fn changed_resolves_on_toggle() {
    let cache = ObjectCache::new();
    let key = ObjectRef::new("Audit", 1);
    cache.insert(audit(1));
    let mut watch = cache.watch_archived(&key).unwrap();

    cache.set_archived(&key, true);
    assert!(watch.changed().await);
    assert!(watch.is_archived());

    cache.evict(&key);
    assert!(!watch.changed().await);
  }
}
