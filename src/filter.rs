//! Detection filtering.
//!
//! Two conditions gate a detection into the overlay and the published
//! sequence: its score must clear the fixed confidence threshold, and its
//! label must be selected (an empty selection accepts every label).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::detect::Detection;

/// Minimum confidence for a detection to survive filtering (strict).
pub const SCORE_THRESHOLD: f32 = 0.5;

/// Label shortlist offered by the dashboard controls.
pub const COMMON_CLASSES: [&str; 10] = [
    "person",
    "car",
    "chair",
    "bottle",
    "cup",
    "laptop",
    "cell phone",
    "book",
    "clock",
    "vase",
];

/// Selected label set. Empty means "accept all labels".
#[derive(Clone, Debug, Default)]
pub struct ClassFilter {
    selected: HashSet<String>,
}

impl ClassFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Symmetric membership flip: add the label if absent, remove it if
    /// present.
    pub fn toggle(&mut self, label: &str) {
        if !self.selected.remove(label) {
            self.selected.insert(label.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.selected.contains(label)
    }

    /// The filter predicate: score above threshold, label selected (or no
    /// selection).
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.score > SCORE_THRESHOLD
            && (self.selected.is_empty() || self.selected.contains(&detection.label))
    }

    /// Keep only accepted detections, preserving sequence order.
    pub fn apply(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        detections.retain(|detection| self.accepts(detection));
        detections
    }
}

/// Shared handle over a [`ClassFilter`].
///
/// The dashboard shell toggles classes through its handle; the frame loop
/// snapshots the set once per tick. Lock poisoning is treated as an empty
/// selection since a panicked writer cannot leave partial state worth
/// keeping.
#[derive(Clone, Debug, Default)]
pub struct FilterHandle {
    inner: Arc<Mutex<ClassFilter>>,
}

impl FilterHandle {
    pub fn new(filter: ClassFilter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(filter)),
        }
    }

    pub fn toggle(&self, label: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.toggle(label);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.clear();
        }
    }

    pub fn snapshot(&self) -> ClassFilter {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(label: &str, score: f32) -> Detection {
        Detection::new(label, score, BoundingBox::new(0.0, 0.0, 50.0, 50.0))
    }

    #[test]
    fn threshold_excludes_low_scores() {
        let filter = ClassFilter::new();
        let detections = vec![det("person", 0.92), det("car", 0.3)];

        let filtered = filter.apply(detections);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].label, "person");
    }

    #[test]
    fn threshold_is_strict() {
        let filter = ClassFilter::new();
        assert!(!filter.accepts(&det("person", 0.5)));
        assert!(filter.accepts(&det("person", 0.500001)));
    }

    #[test]
    fn empty_selection_accepts_every_label() {
        let filter = ClassFilter::new();
        let filtered = filter.apply(vec![det("chair", 0.8), det("vase", 0.9)]);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn selection_restricts_labels() {
        let filter = ClassFilter::from_labels(["person"]);
        assert!(filter.apply(vec![det("chair", 0.8)]).is_empty());
        assert_eq!(filter.apply(vec![det("person", 0.8)]).len(), 1);
    }

    #[test]
    fn filtered_output_is_a_subsequence() {
        let filter = ClassFilter::from_labels(["person", "cup"]);
        let input = vec![
            det("person", 0.9),
            det("car", 0.9),
            det("cup", 0.7),
            det("person", 0.4),
        ];
        let filtered = filter.apply(input.clone());
        assert_eq!(filtered, vec![input[0].clone(), input[2].clone()]);
        assert!(filtered.iter().all(|d| d.score > SCORE_THRESHOLD));
    }

    #[test]
    fn toggling_twice_restores_the_set() {
        let mut filter = ClassFilter::from_labels(["person", "car"]);
        filter.toggle("chair");
        filter.toggle("chair");

        assert_eq!(filter.len(), 2);
        assert!(filter.contains("person"));
        assert!(filter.contains("car"));
        assert!(!filter.contains("chair"));
    }

    #[test]
    fn clear_resets_to_accept_all() {
        let mut filter = ClassFilter::from_labels(["person"]);
        filter.clear();
        assert!(filter.is_empty());
        assert!(filter.accepts(&det("chair", 0.8)));
    }

    #[test]
    fn handle_changes_are_visible_in_snapshots() {
        let handle = FilterHandle::default();
        handle.toggle("person");

        let snapshot = handle.snapshot();
        assert!(snapshot.contains("person"));

        handle.toggle("person");
        assert!(handle.snapshot().is_empty());
    }
}
