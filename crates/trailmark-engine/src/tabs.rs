use std::collections::BTreeSet;
use trailmark_common::model::TabId;

/// Tabs in scope for the current recording.
///
/// A tab opened from a tracked tab is tracked straight away but its detectors are
/// only enabled once it finishes loading; until then it sits in the deferred set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedTabs {
    tracked: BTreeSet<TabId>,
    deferred: BTreeSet<TabId>,
}

impl TrackedTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a tab whose detectors are enabled immediately.
    pub fn track(&mut self, tab_id: TabId) -> bool {
        self.tracked.insert(tab_id)
    }

    /// Track a tab and hold back detector activation until it loads.
    pub fn track_deferred(&mut self, tab_id: TabId) -> bool {
        self.deferred.insert(tab_id);
        self.tracked.insert(tab_id)
    }

    /// Stop tracking a tab. Returns true when this emptied the set.
    pub fn untrack(&mut self, tab_id: TabId) -> bool {
        self.deferred.remove(&tab_id);
        self.tracked.remove(&tab_id) && self.tracked.is_empty()
    }

    pub fn is_tracked(&self, tab_id: TabId) -> bool {
        self.tracked.contains(&tab_id)
    }

    pub fn is_deferred(&self, tab_id: TabId) -> bool {
        self.deferred.contains(&tab_id)
    }

    /// Clear the deferred flag. Returns whether it was set.
    pub fn take_deferred(&mut self, tab_id: TabId) -> bool {
        self.deferred.remove(&tab_id)
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TabId> + '_ {
        self.tracked.iter().copied()
    }

    pub fn snapshot(&self) -> BTreeSet<TabId> {
        self.tracked.clone()
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.deferred.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrack_reports_emptied() {
        let mut tabs = TrackedTabs::new();
        tabs.track(1);
        tabs.track(2);
        assert!(!tabs.untrack(1));
        assert!(!tabs.untrack(99));
        assert!(tabs.untrack(2));
        assert!(tabs.is_empty());
        // Untracking from an already empty set did not empty it.
        assert!(!tabs.untrack(2));
    }

    #[test]
    fn test_deferred_activation() {
        let mut tabs = TrackedTabs::new();
        tabs.track(1);
        tabs.track_deferred(2);
        assert!(tabs.is_tracked(2));
        assert!(tabs.is_deferred(2));
        assert!(!tabs.is_deferred(1));

        assert!(tabs.take_deferred(2));
        assert!(!tabs.take_deferred(2));
        assert!(tabs.is_tracked(2));

        tabs.track_deferred(3);
        tabs.untrack(3);
        assert!(!tabs.is_deferred(3));
        assert_eq!(tabs.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_track_is_idempotent() {
        let mut tabs = TrackedTabs::new();
        assert!(tabs.track(5));
        assert!(!tabs.track(5));
        assert_eq!(tabs.len(), 1);
    }
}
