//! Test assertions for watermarks.

use crate::core::Stage;
use crate::watermark::WatermarkStore;

/// Asserts that `stage` has a watermark.
pub fn assert_stamped(store: &WatermarkStore, stage: Stage) {
    assert!(
        store.watermark(stage).is_some(),
        "Expected {stage} to be stamped, stages: {:?}",
        store.record().stages
    );
}

/// Asserts that `stage` has no watermark.
pub fn assert_not_stamped(store: &WatermarkStore, stage: Stage) {
    assert!(
        store.watermark(stage).is_none(),
        "Expected {stage} to be unstamped, stages: {:?}",
        store.record().stages
    );
}

/// Asserts that every verification stage has a watermark.
pub fn assert_all_stamped(store: &WatermarkStore) {
    for stage in Stage::VERIFICATION {
        assert_stamped(store, stage);
    }
}

/// Asserts that the persisted record equals the in-memory one.
///
/// # Panics
///
/// Panics if the state file can't be reloaded.
pub fn assert_persisted(store: &WatermarkStore) {
    let reloaded = WatermarkStore::load_from(store.path()).expect("reload state file");
    assert_eq!(
        reloaded.record(),
        store.record(),
        "State file at {} is out of date",
        store.path().display()
    );
}
