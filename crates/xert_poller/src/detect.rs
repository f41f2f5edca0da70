//! Content-based change detection.
//!
//! Detection and commit are split on purpose: `has_changed` is a pure
//! predicate, and only `commit`, called after a confirmed webhook delivery,
//! advances the stored fingerprint. A failed dispatch therefore leaves the
//! old fingerprint in place and the next cycle re-detects the same change.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use xert_client::Domain;

/// Hex characters kept after truncating the digest.
const FINGERPRINT_LEN: usize = 16;

/// Deterministic digest of a payload's canonical JSON form.
///
/// `serde_json::Value` objects iterate in key order, so payloads with equal
/// content fingerprint identically regardless of upstream field ordering.
pub fn fingerprint(payload: &serde_json::Value) -> String {
    let digest = Sha256::digest(payload.to_string().as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Last committed fingerprint per domain, shared across the domain tasks.
pub struct ChangeDetector {
    committed: RwLock<HashMap<Domain, String>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(HashMap::new()),
        }
    }

    /// Compare `payload` against the committed fingerprint for `domain`.
    /// Absent (first ever fetch) always counts as changed.
    pub async fn has_changed(&self, domain: Domain, payload: &serde_json::Value) -> bool {
        let current = fingerprint(payload);
        let committed = self.committed.read().await;
        committed.get(&domain) != Some(&current)
    }

    /// Record `payload` as the delivered state for `domain`.
    pub async fn commit(&self, domain: Domain, payload: &serde_json::Value) {
        let current = fingerprint(payload);
        self.committed.write().await.insert(domain, current);
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_deterministic() {
        let payload = json!({"success": true, "tl": 42.5});
        assert_eq!(fingerprint(&payload), fingerprint(&payload));
        assert_eq!(fingerprint(&payload).len(), FINGERPRINT_LEN);
    }

    #[test]
    fn fingerprint_ignores_field_ordering() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"signature": {"ftp": 250, "ltp": 200}, "success": true}"#)
                .unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"success": true, "signature": {"ltp": 200, "ftp": 250}}"#)
                .unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_differs_for_different_content() {
        let a = json!({"tl": 42.5});
        let b = json!({"tl": 42.6});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[tokio::test]
    async fn first_fetch_always_counts_as_changed() {
        let detector = ChangeDetector::new();
        let payload = json!({"success": true});
        assert!(detector.has_changed(Domain::TrainingInfo, &payload).await);
    }

    #[tokio::test]
    async fn has_changed_is_pure() {
        let detector = ChangeDetector::new();
        let payload = json!({"success": true});
        for _ in 0..3 {
            assert!(detector.has_changed(Domain::TrainingInfo, &payload).await);
        }
    }

    #[tokio::test]
    async fn commit_settles_the_payload() {
        let detector = ChangeDetector::new();
        let payload = json!({"success": true, "tl": 10});
        detector.commit(Domain::TrainingInfo, &payload).await;
        assert!(!detector.has_changed(Domain::TrainingInfo, &payload).await);

        let updated = json!({"success": true, "tl": 11});
        assert!(detector.has_changed(Domain::TrainingInfo, &updated).await);
    }

    #[tokio::test]
    async fn domains_never_share_state() {
        let detector = ChangeDetector::new();
        let payload = json!({"activities": []});
        detector.commit(Domain::Activities, &payload).await;
        assert!(!detector.has_changed(Domain::Activities, &payload).await);
        assert!(detector.has_changed(Domain::TrainingInfo, &payload).await);
    }
}
