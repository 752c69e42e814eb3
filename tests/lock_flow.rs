//! End-to-end lock flows through the gate, the store and the decoy handoff.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use pinveil::error::LockError;
use pinveil::gate::{LockGate, Notice, ProtectedActivity};
use pinveil::lock::LockPhase;
use pinveil::storage::CredentialStore;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Workspace {
    running: bool,
    resumes: u32,
}

impl ProtectedActivity for Workspace {
    fn pause_activity(&mut self) {
        self.running = false;
    }

    fn resume_activity(&mut self) {
        self.running = true;
        self.resumes += 1;
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    gate: LockGate<Workspace>,
    decoy_entries: Rc<Cell<u32>>,
    t0: Instant,
}

impl Harness {
    fn new(real: Option<&str>, dummy: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("credentials.json"));
        if let Some(real) = real {
            store.set_credentials(real, dummy).unwrap();
        }
        let t0 = Instant::now();
        let mut gate = LockGate::open(store, Workspace::default(), WINDOW, t0);
        let decoy_entries = Rc::new(Cell::new(0));
        let counter = Rc::clone(&decoy_entries);
        gate.register_decoy(move || counter.set(counter.get() + 1));
        Self {
            _dir: dir,
            gate,
            decoy_entries,
            t0,
        }
    }

    fn at(&self, secs: u64) -> Instant {
        self.t0 + Duration::from_secs(secs)
    }

    fn unlock(&mut self, pin: &str, secs: u64) {
        let now = self.at(secs);
        self.gate.type_digits(pin, now);
        if !self.gate.is_unlocked() {
            self.gate.submit(now);
        }
        assert!(self.gate.is_unlocked(), "PIN {pin} should unlock");
    }
}

#[test]
fn fresh_install_runs_unlocked() {
    let h = Harness::new(None, None);
    assert_eq!(h.gate.phase(), LockPhase::Unlocked);
    assert!(!h.gate.overlay_visible());
    assert!(h.gate.protected().running);
    assert_eq!(h.gate.next_deadline(), None);
}

#[test]
fn clearing_real_pin_also_clears_dummy() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("credentials.json"));
    store.set_credentials("1234", Some("5678")).unwrap();
    store.clear_all().unwrap();
    assert!(!store.has_real().unwrap());
    assert!(!store.has_dummy().unwrap());
}

#[test]
fn short_dummy_is_refused_at_setup() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("credentials.json"));
    let err = store.set_credentials("1234", Some("99")).unwrap_err();
    assert!(matches!(err, LockError::InvalidFormat));
    assert!(!store.has_real().unwrap());
}

#[test]
fn equal_length_dummy_opens_decoy() {
    let mut h = Harness::new(Some("1234"), Some("5678"));
    assert!(h.gate.overlay_visible());
    h.gate.type_digits("5678", h.at(1));
    assert_eq!(h.gate.phase(), LockPhase::Disguised);
    assert!(h.gate.decoy_active());
    assert!(!h.gate.overlay_visible());
    assert!(!h.gate.protected().running);
    assert_eq!(h.decoy_entries.get(), 1);
    assert_eq!(h.gate.take_notice(), None);
}

#[test]
fn longer_dummy_waits_for_all_digits() {
    let mut h = Harness::new(Some("1234"), Some("87654321"));
    assert_eq!(h.gate.box_count(), 4);
    h.gate.type_digits("8765", h.at(1));
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    assert_eq!(h.gate.take_notice(), None);

    h.gate.type_digits("4321", h.at(2));
    assert_eq!(h.gate.phase(), LockPhase::Disguised);
    assert_eq!(h.decoy_entries.get(), 1);
}

#[test]
fn longer_dummy_still_lets_real_pin_in_on_enter() {
    let mut h = Harness::new(Some("1234"), Some("87654321"));
    h.gate.type_digits("1234", h.at(1));
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    h.gate.submit(h.at(1));
    assert!(h.gate.is_unlocked());
    assert_eq!(h.decoy_entries.get(), 0);
}

#[test]
fn shorter_dummy_is_probed_before_real_completes() {
    let mut h = Harness::new(Some("123456"), Some("9999"));
    h.gate.type_digits("1234", h.at(1));
    // a failed probe is silent and keeps the typed digits
    assert_eq!(h.gate.take_notice(), None);
    assert_eq!(h.gate.display(), "1234");
    h.gate.type_digits("56", h.at(2));
    assert!(h.gate.is_unlocked());

    let mut h = Harness::new(Some("123456"), Some("9999"));
    h.gate.type_digits("9999", h.at(1));
    assert_eq!(h.gate.phase(), LockPhase::Disguised);
}

#[test]
fn rejection_clears_input_and_allows_retry() {
    let mut h = Harness::new(Some("1234"), None);
    for attempt in 0..5 {
        h.gate.type_digits("0000", h.at(attempt));
        assert_eq!(h.gate.take_notice(), Some(Notice::Incorrect));
        assert_eq!(h.gate.display(), "");
    }
    h.unlock("1234", 6);
    assert!(h.gate.protected().running);
}

#[test]
fn inactivity_deadline_follows_last_activity() {
    let mut h = Harness::new(Some("1234"), None);
    h.unlock("1234", 0);

    h.gate.activity(h.at(59));
    h.gate.tick(h.at(60));
    assert!(h.gate.is_unlocked());
    h.gate.tick(h.at(118));
    assert!(h.gate.is_unlocked());

    h.gate.tick(h.at(119));
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    assert!(h.gate.overlay_visible());
    assert!(!h.gate.protected().running);
}

#[test]
fn idle_session_locks_after_window() {
    let mut h = Harness::new(Some("1234"), None);
    h.unlock("1234", 10);
    h.gate.tick(h.at(69));
    assert!(h.gate.is_unlocked());
    h.gate.tick(h.at(70));
    assert!(!h.gate.is_unlocked());
}

#[test]
fn hide_locks_even_if_shown_again_at_once() {
    let mut h = Harness::new(Some("1234"), None);
    h.unlock("1234", 0);
    h.gate.hidden(h.at(1));
    h.gate.visible(h.at(1));
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    assert!(h.gate.overlay_visible());
    assert!(!h.gate.protected().running);
    h.unlock("1234", 2);
}

#[test]
fn decoy_exit_reprompts_instead_of_resuming() {
    let mut h = Harness::new(Some("1234"), Some("5678"));
    h.gate.type_digits("5678", h.at(1));
    let resumes = h.gate.protected().resumes;

    h.gate.exit_decoy(h.at(2));
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    assert!(h.gate.overlay_visible());

    h.gate.visible(h.at(3));
    h.gate.activity(h.at(3));
    assert!(!h.gate.is_unlocked());
    assert_eq!(h.gate.protected().resumes, resumes);
    assert_eq!(h.gate.next_deadline(), None);
}

#[test]
fn hiding_the_decoy_relocks() {
    let mut h = Harness::new(Some("1234"), Some("5678"));
    h.gate.type_digits("5678", h.at(1));
    h.gate.hidden(h.at(2));
    assert!(!h.gate.decoy_active());
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    h.gate.type_digits("5678", h.at(3));
    assert_eq!(h.decoy_entries.get(), 2);
}

#[test]
fn unreadable_store_during_verification_rejects() {
    let mut h = Harness::new(Some("1234"), None);
    std::fs::write(h.gate.store().path(), "{ not json").unwrap();
    h.gate.type_digits("1234", h.at(1));
    assert!(!h.gate.is_unlocked());
    assert_eq!(h.gate.take_notice(), Some(Notice::Incorrect));
}

#[test]
fn restart_requires_pin_again() {
    let mut h = Harness::new(Some("1234"), None);
    h.unlock("1234", 0);
    let path = h.gate.store().path().to_path_buf();
    let gate = LockGate::open(
        CredentialStore::open(path),
        Workspace::default(),
        WINDOW,
        h.at(1),
    );
    assert_eq!(gate.phase(), LockPhase::Locked);
    assert!(gate.overlay_visible());
}

#[test]
fn lock_now_without_pin_asks_for_setup() {
    let mut h = Harness::new(None, None);
    h.gate.lock_now(h.at(1));
    assert_eq!(h.gate.take_notice(), Some(Notice::SetupRequired));
    assert!(h.gate.is_unlocked());

    h.gate.save_credentials("2468", None, h.at(2)).unwrap();
    assert!(h.gate.has_pin());
    assert!(h.gate.is_unlocked());
    assert_eq!(h.gate.next_deadline(), Some(h.at(2) + WINDOW));

    h.gate.lock_now(h.at(3));
    assert_eq!(h.gate.phase(), LockPhase::Locked);
    h.unlock("2468", 4);
}

#[test]
fn removing_pin_disables_lock() {
    let mut h = Harness::new(Some("1234"), Some("5678"));
    h.unlock("1234", 0);
    h.gate.remove_credentials(h.at(1)).unwrap();
    assert!(!h.gate.has_pin());
    h.gate.hidden(h.at(2));
    h.gate.visible(h.at(2));
    assert!(h.gate.is_unlocked());
    assert!(!h.gate.overlay_visible());
}

#[test]
fn duplicate_dummy_at_setup_leaves_session_untouched() {
    let mut h = Harness::new(Some("1234"), None);
    h.unlock("1234", 0);
    let err = h
        .gate
        .save_credentials("4321", Some("4321"), h.at(1))
        .unwrap_err();
    assert!(matches!(err, LockError::DuplicateCredential));
    assert!(h.gate.store().verify_real("1234").unwrap());
}

#[test]
fn pasted_pin_unlocks() {
    let mut h = Harness::new(Some("1234"), None);
    h.gate.type_digits("9", h.at(0));
    h.gate.paste(" 12-34 ", h.at(1));
    assert!(h.gate.is_unlocked());
}

#[test]
fn store_behind_a_file_starts_locked() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("data");
    std::fs::write(&blocker, "not a directory").unwrap();
    let store = CredentialStore::open(blocker.join("credentials.json"));
    assert!(matches!(
        store.has_real(),
        Err(LockError::StorageUnavailable(_))
    ));

    let now = Instant::now();
    let mut gate = LockGate::open(store, Workspace::default(), WINDOW, now);
    assert!(!gate.is_unlocked());
    assert!(gate.overlay_visible());
    assert!(!gate.protected().running);
    gate.type_digits("1234", now);
    assert!(!gate.is_unlocked());
    assert_eq!(gate.take_notice(), Some(Notice::Incorrect));
}
