//! The sound store: clip name → decoded clip.
//!
//! Shared by the scanner and watcher (writers), and the playback worker and
//! trigger path (readers). All access goes through one `RwLock`; clips are
//! handed out as `Arc`s so a render never holds the lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use clip_player::decode::DecodedClip;

/// A named, decoded clip and the file it came from.
#[derive(Clone, Debug)]
pub struct Clip {
    name: String,
    path: PathBuf,
    audio: DecodedClip,
}

impl Clip {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, audio: DecodedClip) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            audio,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn audio(&self) -> &DecodedClip {
        &self.audio
    }
}

/// Thread-safe clip registry. Cloning shares the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct SoundStore {
    clips: Arc<RwLock<HashMap<String, Arc<Clip>>>>,
}

impl SoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `clip`, replacing any entry with the same name. Returns the replaced entry.
    pub fn put(&self, clip: Clip) -> Option<Arc<Clip>> {
        let name = clip.name.clone();
        self.write().insert(name, Arc::new(clip))
    }

    /// Insert `clip` only if its name is not registered yet.
    pub fn put_if_absent(&self, clip: Clip) -> bool {
        let mut clips = self.write();
        if clips.contains_key(&clip.name) {
            return false;
        }
        clips.insert(clip.name.clone(), Arc::new(clip));
        true
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Clip>> {
        self.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Clip>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Snapshot of the registered names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated, so
    // poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Clip>>> {
        self.clips.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Clip>>> {
        self.clips.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::clip;

    #[test]
    fn put_replaces_existing_entry() {
        let store = SoundStore::new();
        assert!(store.put(clip("horn", &[0.1])).is_none());
        let old = store.put(clip("horn", &[0.2, 0.3])).unwrap();
        assert_eq!(old.audio().frames(), 1);
        assert_eq!(store.get("horn").unwrap().audio().frames(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_if_absent_keeps_first_registration() {
        let store = SoundStore::new();
        assert!(store.put_if_absent(clip("horn", &[0.1])));
        assert!(!store.put_if_absent(clip("horn", &[0.2, 0.3])));
        assert_eq!(store.get("horn").unwrap().audio().frames(), 1);
    }

    #[test]
    fn remove_deletes_only_that_name() {
        let store = SoundStore::new();
        store.put(clip("a", &[0.1]));
        store.put(clip("b", &[0.1]));
        store.put(clip("c", &[0.1]));

        assert!(store.remove("b").is_some());
        assert!(store.remove("b").is_none());

        let mut names = store.names();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn names_are_case_sensitive() {
        let store = SoundStore::new();
        store.put(clip("Horn", &[0.1]));
        assert!(store.contains("Horn"));
        assert!(!store.contains("horn"));
    }

    #[test]
    fn clones_share_the_map() {
        let store = SoundStore::new();
        let other = store.clone();
        other.put(clip("a", &[0.1]));
        assert!(store.contains("a"));
        assert!(!store.is_empty());
    }
}
