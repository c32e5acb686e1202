use std::sync::Arc;

use uuid::Uuid;

use crate::status::{JobKey, StatusStore};

/// Mint a fresh opaque callback token.
///
/// The value is a random v4 UUID — unguessable, carried only inside callback
/// envelopes, and stored as the sole active token for its job.
pub fn mint() -> String {
    Uuid::new_v4().to_string()
}

/// Validates callback tokens against the single active token per job.
///
/// Verification fails closed: an unknown job, a settled job, or any byte of
/// mismatch rejects the callback. Rotating the token (on retry) invalidates
/// every previously issued token for the key at once, with no grace window.
pub struct TokenVerifier {
    store: Arc<StatusStore>,
}

impl TokenVerifier {
    pub fn new(store: Arc<StatusStore>) -> Self {
        Self { store }
    }

    /// Whether `presented` is the currently active token for `key`.
    pub fn verify(&self, key: &JobKey, presented: &str) -> bool {
        match self.store.get(key) {
            Ok(record) => !record.status.is_terminal() && record.active_token == presented,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobStatus;

    fn key() -> JobKey {
        JobKey::new("req-7", "owner-3")
    }

    #[test]
    fn minted_tokens_are_unique() {
        let a = mint();
        let b = mint();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn verify_accepts_active_token() {
        let store = Arc::new(StatusStore::new());
        let record = store.init(&key());
        let verifier = TokenVerifier::new(store);

        assert!(verifier.verify(&key(), &record.active_token));
    }

    #[test]
    fn verify_fails_closed_on_unknown_job() {
        let verifier = TokenVerifier::new(Arc::new(StatusStore::new()));
        assert!(!verifier.verify(&key(), "anything"));
    }

    #[test]
    fn verify_rejects_wrong_token() {
        let store = Arc::new(StatusStore::new());
        store.init(&key());
        let verifier = TokenVerifier::new(store);

        assert!(!verifier.verify(&key(), "forged-token"));
        assert!(!verifier.verify(&key(), ""));
    }

    #[test]
    fn rotation_invalidates_previous_token_immediately() {
        let store = Arc::new(StatusStore::new());
        let before = store.init(&key());
        let verifier = TokenVerifier::new(Arc::clone(&store));
        assert!(verifier.verify(&key(), &before.active_token));

        let (_, rotated) = store.increment_retry(&key()).unwrap();

        assert!(!verifier.verify(&key(), &before.active_token));
        assert!(verifier.verify(&key(), &rotated));
    }

    #[test]
    fn verify_rejects_terminal_records() {
        let store = Arc::new(StatusStore::new());
        let record = store.init(&key());
        store
            .set_status(&key(), JobStatus::InProgress, "starting attempt 1")
            .unwrap();
        store
            .set_status(&key(), JobStatus::Completed, "diagram ready")
            .unwrap();

        let verifier = TokenVerifier::new(store);
        // Token still matches byte-for-byte, but the job is settled.
        assert!(!verifier.verify(&key(), &record.active_token));
    }
}
