//! Property-based tests for the credential store and the unlock decision.

use proptest::prelude::*;
use pinveil::arbiter::{decide, Outcome};
use pinveil::error::LockError;
use pinveil::input::InputCapture;
use pinveil::storage::CredentialStore;

fn arb_pin() -> impl Strategy<Value = String> {
    "[0-9]{4,8}"
}

fn arb_other() -> impl Strategy<Value = String> {
    "[0-9]{0,12}"
}

fn fresh_store() -> (tempfile::TempDir, CredentialStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("credentials.json"));
    (dir, store)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn real_pin_roundtrips(p in arb_pin(), q in arb_other()) {
        prop_assume!(q != p);
        let (_dir, store) = fresh_store();
        store.set_real(&p).unwrap();
        prop_assert!(store.verify_real(&p).unwrap());
        prop_assert!(!store.verify_real(&q).unwrap());
        prop_assert_eq!(store.real_length().unwrap(), p.len());
    }

    #[test]
    fn duplicate_dummy_never_changes_store(p in arb_pin(), old in proptest::option::of(arb_pin())) {
        let (dir, store) = fresh_store();
        let old = old.filter(|d| d != &p);
        store.set_credentials(&p, old.as_deref()).unwrap();
        let before = std::fs::read(dir.path().join("credentials.json")).unwrap();

        let err = store.set_dummy(&p).unwrap_err();
        prop_assert!(matches!(err, LockError::DuplicateCredential));

        let after = std::fs::read(dir.path().join("credentials.json")).unwrap();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn dummy_wins_over_real_at_equal_length(real in "[0-9]{4}", dummy in "[0-9]{4}") {
        prop_assume!(real != dummy);
        let (_dir, store) = fresh_store();
        store.set_credentials(&real, Some(&dummy)).unwrap();
        let snapshot = store.snapshot().unwrap();
        prop_assert_eq!(decide(&snapshot, &dummy), Outcome::DummyMatched);
        prop_assert_eq!(decide(&snapshot, &real), Outcome::RealMatched);
    }

    #[test]
    fn capture_never_holds_more_than_capacity(real in 4usize..=8, dummy in 0usize..=8, typed in "[0-9a-z ]{0,40}") {
        let dummy = if dummy < 4 { 0 } else { dummy };
        let mut capture = InputCapture::new(real, dummy);
        for c in typed.chars() {
            if capture.push_char(c).is_some() {
                prop_assert!(capture.len() <= capture.capacity());
            }
            prop_assert!(capture.len() <= capture.capacity());
            prop_assert!(capture.display().chars().all(|c| c.is_ascii_digit()));
        }
    }
}
