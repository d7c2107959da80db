use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pipeline::domain::result_sink::ResultSink;
use crate::shared::frame_result::FrameResult;
use crate::shared::landmark::Landmark;

/// What a renderer needs to draw the current capture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureState {
    pub is_capturing: bool,
    /// Flattened landmarks of the latest result, pose then face then
    /// left hand then right hand.
    pub landmarks: Vec<Landmark>,
    pub latest: Option<FrameResult>,
    pub results_received: u64,
}

/// Shared UI state fed by the frame loop.
///
/// Cloning gives another handle to the same state. Landmarks are only ever
/// written through the sink returned by [`CaptureStore::subscriber`];
/// everything else reads.
#[derive(Clone, Debug, Default)]
pub struct CaptureStore {
    inner: Arc<RwLock<CaptureState>>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CaptureState {
        self.read().clone()
    }

    pub fn latest(&self) -> Option<FrameResult> {
        self.read().latest.clone()
    }

    pub fn landmarks(&self) -> Vec<Landmark> {
        self.read().landmarks.clone()
    }

    pub fn results_received(&self) -> u64 {
        self.read().results_received
    }

    pub fn is_capturing(&self) -> bool {
        self.read().is_capturing
    }

    /// Flips the capture flag and returns its new value.
    pub fn toggle_capturing(&self) -> bool {
        let mut state = self.write();
        state.is_capturing = !state.is_capturing;
        state.is_capturing
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.write().is_capturing = capturing;
    }

    /// The sink the frame loop delivers into.
    pub fn subscriber(&self) -> CaptureStateSink {
        CaptureStateSink {
            store: self.clone(),
        }
    }

    // A writer that panicked mid-update can only have left a fully built
    // previous value behind, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, CaptureState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CaptureState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Writes each delivered result into a [`CaptureStore`].
pub struct CaptureStateSink {
    store: CaptureStore,
}

impl ResultSink for CaptureStateSink {
    fn on_frame_result(&mut self, result: &FrameResult) {
        let landmarks = result.flatten();
        let mut state = self.store.write();
        state.landmarks = landmarks;
        state.latest = Some(result.clone());
        state.results_received += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::landmark::LandmarkSet;
    use std::time::Duration;

    fn result(ms: u64) -> FrameResult {
        FrameResult::new(
            Duration::from_millis(ms),
            LandmarkSet::new(vec![Landmark::new(0.1, 0.1, 0.0)]),
            LandmarkSet::new(vec![Landmark::new(0.2, 0.2, 0.0)]),
            LandmarkSet::empty(),
            LandmarkSet::new(vec![Landmark::new(0.4, 0.4, 0.0)]),
        )
    }

    #[test]
    fn test_new_store_is_idle_and_empty() {
        let store = CaptureStore::new();
        let state = store.snapshot();
        assert!(!state.is_capturing);
        assert!(state.landmarks.is_empty());
        assert!(state.latest.is_none());
    }

    #[test]
    fn test_subscriber_publishes_flattened_landmarks() {
        let store = CaptureStore::new();
        let mut sink = store.subscriber();

        sink.on_frame_result(&result(33));

        let xs: Vec<f32> = store.landmarks().iter().map(|l| l.x).collect();
        assert_eq!(xs, vec![0.1, 0.2, 0.4]);
        assert_eq!(store.latest().unwrap().timestamp(), Duration::from_millis(33));
        assert_eq!(store.results_received(), 1);
    }

    #[test]
    fn test_latest_result_replaces_previous() {
        let store = CaptureStore::new();
        let mut sink = store.subscriber();

        sink.on_frame_result(&result(10));
        sink.on_frame_result(&FrameResult::default());

        assert!(store.landmarks().is_empty());
        assert_eq!(store.results_received(), 2);
    }

    #[test]
    fn test_toggle_flips_and_reports() {
        let store = CaptureStore::new();
        assert!(store.toggle_capturing());
        assert!(store.is_capturing());
        assert!(!store.toggle_capturing());
        store.set_capturing(true);
        assert!(store.is_capturing());
    }

    #[test]
    fn test_toggle_leaves_landmarks_visible() {
        let store = CaptureStore::new();
        store.subscriber().on_frame_result(&result(10));

        store.toggle_capturing();
        store.toggle_capturing();

        assert_eq!(store.landmarks().len(), 3);
    }

    #[test]
    fn test_clones_share_state() {
        let store = CaptureStore::new();
        let reader = store.clone();
        store.subscriber().on_frame_result(&result(5));
        assert_eq!(reader.results_received(), 1);
    }
}
