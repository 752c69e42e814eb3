//! Decides what a completed PIN candidate means.

use tracing::warn;

use crate::models::CredentialKind;
use crate::storage::{CredentialSnapshot, CredentialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    DummyMatched,
    RealMatched,
    Rejected,
}

/// Pure decision over a credential snapshot.
///
/// The dummy credential is tried first whenever the candidate has the dummy
/// length, so a dummy PIN that shares the real PIN's length is never read as
/// a failed real attempt.
pub fn decide(snapshot: &CredentialSnapshot, candidate: &str) -> Outcome {
    let len = candidate.len();
    if snapshot.has_dummy()
        && len == snapshot.dummy_length()
        && snapshot.verify(CredentialKind::Dummy, candidate)
    {
        return Outcome::DummyMatched;
    }
    if snapshot.has_real()
        && len == snapshot.real_length()
        && snapshot.verify(CredentialKind::Real, candidate)
    {
        return Outcome::RealMatched;
    }
    Outcome::Rejected
}

/// Checks the dummy credential only. Used while a shorter dummy PIN is
/// reachable before the real PIN is complete.
pub fn probe_dummy(snapshot: &CredentialSnapshot, candidate: &str) -> Outcome {
    if snapshot.has_dummy()
        && candidate.len() == snapshot.dummy_length()
        && snapshot.verify(CredentialKind::Dummy, candidate)
    {
        Outcome::DummyMatched
    } else {
        Outcome::Rejected
    }
}

/// Reads the store and decides. A store that cannot be read rejects: an
/// unreadable store must never look like "no PIN configured".
pub fn arbitrate(store: &CredentialStore, candidate: &str, probe: bool) -> Outcome {
    match store.snapshot() {
        Ok(snapshot) if probe => probe_dummy(&snapshot, candidate),
        Ok(snapshot) => decide(&snapshot, candidate),
        Err(e) => {
            warn!(error = %e, "credential read failed during verification");
            Outcome::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(real: &str, dummy: Option<&str>) -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("credentials.json"));
        store.set_credentials(real, dummy).unwrap();
        (dir, store)
    }

    #[test]
    fn real_pin_matches() {
        let (_dir, store) = store_with("1234", None);
        assert_eq!(arbitrate(&store, "1234", false), Outcome::RealMatched);
        assert_eq!(arbitrate(&store, "4321", false), Outcome::Rejected);
    }

    #[test]
    fn same_length_dummy_wins_tie_break() {
        let (_dir, store) = store_with("1234", Some("5678"));
        assert_eq!(arbitrate(&store, "5678", false), Outcome::DummyMatched);
        // dummy mismatch at the shared length still falls through to the real check
        assert_eq!(arbitrate(&store, "1234", false), Outcome::RealMatched);
        assert_eq!(arbitrate(&store, "0000", false), Outcome::Rejected);
    }

    #[test]
    fn longer_dummy_matches_only_at_full_length() {
        let (_dir, store) = store_with("1234", Some("87654321"));
        assert_eq!(arbitrate(&store, "8765", false), Outcome::Rejected);
        assert_eq!(arbitrate(&store, "87654321", false), Outcome::DummyMatched);
    }

    #[test]
    fn length_matching_neither_is_rejected() {
        let (_dir, store) = store_with("1234", Some("87654321"));
        assert_eq!(arbitrate(&store, "123456", false), Outcome::Rejected);
        // real PIN followed by extra digits is not the real PIN
        assert_eq!(arbitrate(&store, "12345", false), Outcome::Rejected);
    }

    #[test]
    fn probe_never_reports_real_match() {
        let (_dir, store) = store_with("12345678", Some("9999"));
        assert_eq!(arbitrate(&store, "9999", true), Outcome::DummyMatched);
        assert_eq!(arbitrate(&store, "1234", true), Outcome::Rejected);
        assert_eq!(arbitrate(&store, "12345678", true), Outcome::Rejected);
    }

    #[test]
    fn unreadable_store_fails_closed() {
        let (_dir, store) = store_with("1234", None);
        std::fs::write(store.path(), "garbage").unwrap();
        assert_eq!(arbitrate(&store, "1234", false), Outcome::Rejected);
    }

    #[test]
    fn empty_snapshot_rejects_everything() {
        let snapshot = CredentialSnapshot::default();
        assert_eq!(decide(&snapshot, "1234"), Outcome::Rejected);
    }
}
