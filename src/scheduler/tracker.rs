//! In-flight dedup tracking
//!
//! The tracker is the source of truth for "this file already has an
//! outstanding job": the coordinator reserves before submitting and the
//! reconciler releases on terminal events. A file id is present iff exactly
//! one non-terminal job exists for it.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::core::FileId;

/// Set of file identities with an outstanding conversion job
#[derive(Debug, Default)]
pub struct InFlightTracker {
    files: Mutex<HashSet<FileId>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve an id; false if it was already reserved
    pub fn try_reserve(&self, id: &FileId) -> bool {
        self.files.lock().unwrap().insert(id.clone())
    }

    /// Release an id, reporting whether it was present
    ///
    /// Idempotent: releasing an absent id returns false and changes nothing.
    /// The return value is how duplicate terminal events are detected.
    pub fn release(&self, id: &FileId) -> bool {
        self.files.lock().unwrap().remove(id)
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.files.lock().unwrap().contains(id)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.files.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    fn id(name: &str) -> FileId {
        FileId::from_path(Path::new(name))
    }

    #[test]
    fn test_reserve_and_release() {
        let tracker = InFlightTracker::new();
        let a = id("/music/a.flac");

        assert!(tracker.try_reserve(&a));
        assert!(tracker.contains(&a));
        assert_eq!(tracker.len(), 1);

        assert!(tracker.release(&a));
        assert!(!tracker.contains(&a));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_double_reserve_fails() {
        let tracker = InFlightTracker::new();
        let a = id("/music/a.flac");

        assert!(tracker.try_reserve(&a));
        assert!(!tracker.try_reserve(&a));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let tracker = InFlightTracker::new();
        let a = id("/music/a.flac");

        tracker.try_reserve(&a);
        assert!(tracker.release(&a));
        assert!(!tracker.release(&a));
        assert!(!tracker.release(&a));
    }

    #[test]
    fn test_clear() {
        let tracker = InFlightTracker::new();
        tracker.try_reserve(&id("/music/a.flac"));
        tracker.try_reserve(&id("/music/b.flac"));
        assert_eq!(tracker.len(), 2);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_concurrent_reserve_admits_exactly_one() {
        let tracker = Arc::new(InFlightTracker::new());
        let target = id("/music/contested.flac");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            let target = target.clone();
            handles.push(std::thread::spawn(move || tracker.try_reserve(&target)));
        }

        let winners: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
        assert_eq!(tracker.len(), 1);
    }
}
