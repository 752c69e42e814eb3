//! Host-side wiring: applies lock effects to the credential store, the PIN
//! input, the decoy handoff and the protected app.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::arbiter::arbitrate;
use crate::disguise::DisguiseHandoff;
use crate::error::Result;
use crate::input::{InputCapture, Submission};
use crate::lock::{Effect, LockEvent, LockMachine, LockPhase, Verdict};
use crate::storage::{CredentialSnapshot, CredentialStore};

/// Pause/resume hooks of the protected app (e.g. its polling loop).
pub trait ProtectedActivity {
    fn pause_activity(&mut self);
    fn resume_activity(&mut self);
}

/// User-facing messages from the lock screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Incorrect,
    EnterFullPin,
    SetupRequired,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::Incorrect => "Incorrect PIN",
            Notice::EnterFullPin => "Enter full PIN",
            Notice::SetupRequired => "No PIN set. Set one now.",
        }
    }
}

pub struct LockGate<P: ProtectedActivity> {
    store: CredentialStore,
    capture: InputCapture,
    machine: LockMachine,
    handoff: DisguiseHandoff,
    protected: P,
    overlay_visible: bool,
    notice: Option<Notice>,
}

impl<P: ProtectedActivity> LockGate<P> {
    /// Starts a fresh session. An unreadable store counts as "PIN configured"
    /// so startup fails closed.
    pub fn open(store: CredentialStore, protected: P, inactivity: Duration, now: Instant) -> Self {
        let snapshot = read_snapshot(&store);
        let has_real = match store.has_real() {
            Ok(has_real) => has_real,
            Err(e) => {
                warn!(error = %e, "credential store unreadable at startup, staying locked");
                true
            }
        };
        let (machine, effects) = LockMachine::start(has_real, false, inactivity, now);
        let mut gate = Self {
            capture: InputCapture::from_snapshot(&snapshot),
            store,
            machine,
            handoff: DisguiseHandoff::new(),
            protected,
            overlay_visible: false,
            notice: None,
        };
        gate.apply(effects, now);
        gate
    }

    pub fn register_decoy(&mut self, entry: impl FnMut() + 'static) {
        self.handoff.register(entry);
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn protected(&self) -> &P {
        &self.protected
    }

    pub fn protected_mut(&mut self) -> &mut P {
        &mut self.protected
    }

    pub fn phase(&self) -> LockPhase {
        self.machine.phase()
    }

    pub fn is_unlocked(&self) -> bool {
        self.machine.is_unlocked()
    }

    pub fn has_pin(&self) -> bool {
        self.machine.has_real()
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn decoy_active(&self) -> bool {
        self.handoff.is_active()
    }

    pub fn display(&self) -> &str {
        self.capture.display()
    }

    pub fn box_count(&self) -> usize {
        self.capture.box_count()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.next_deadline()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn type_digits(&mut self, raw: &str, now: Instant) {
        if !self.overlay_visible {
            return;
        }
        if let Some(submission) = self.capture.push_str(raw) {
            self.submit_candidate(submission, now);
        }
    }

    pub fn paste(&mut self, raw: &str, now: Instant) {
        if !self.overlay_visible {
            return;
        }
        if let Some(submission) = self.capture.paste(raw) {
            self.submit_candidate(submission, now);
        }
    }

    pub fn backspace(&mut self) {
        self.capture.backspace();
    }

    pub fn cancel(&mut self) {
        self.capture.clear();
        self.notice = None;
    }

    /// Explicit submit (Enter / unlock button).
    pub fn submit(&mut self, now: Instant) {
        if !self.overlay_visible {
            return;
        }
        match self.capture.submit() {
            Some(submission) => self.submit_candidate(submission, now),
            None => self.notice = Some(Notice::EnterFullPin),
        }
    }

    pub fn activity(&mut self, now: Instant) {
        self.dispatch(LockEvent::Activity, now);
    }

    pub fn hidden(&mut self, now: Instant) {
        self.dispatch(LockEvent::Hidden, now);
    }

    pub fn visible(&mut self, now: Instant) {
        self.dispatch(LockEvent::Visible, now);
    }

    /// Fires the inactivity timeout once its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if matches!(self.machine.next_deadline(), Some(deadline) if now >= deadline) {
            self.dispatch(LockEvent::TimeoutFired, now);
        }
    }

    pub fn lock_now(&mut self, now: Instant) {
        let effects = self.machine.lock_now(now);
        self.apply(effects, now);
    }

    pub fn show_lock_if_locked(&mut self, now: Instant) {
        let effects = self.machine.show_lock_if_locked();
        self.apply(effects, now);
    }

    /// Closes the decoy; always lands on the lock screen.
    pub fn exit_decoy(&mut self, now: Instant) {
        if let Some(event) = self.handoff.exit() {
            self.dispatch(event, now);
        }
    }

    pub fn save_credentials(&mut self, real: &str, dummy: Option<&str>, now: Instant) -> Result<()> {
        self.store.set_credentials(real, dummy)?;
        self.dispatch(LockEvent::CredentialsSaved, now);
        Ok(())
    }

    pub fn remove_credentials(&mut self, now: Instant) -> Result<()> {
        self.store.clear_all()?;
        self.dispatch(LockEvent::CredentialsRemoved, now);
        Ok(())
    }

    fn submit_candidate(&mut self, submission: Submission, now: Instant) {
        self.notice = None;
        self.dispatch(LockEvent::Submit(submission), now);
    }

    fn dispatch(&mut self, event: LockEvent, now: Instant) {
        let effects = self.machine.handle(event, now);
        self.apply(effects, now);
    }

    fn apply(&mut self, effects: Vec<Effect>, now: Instant) {
        let mut pending: VecDeque<Effect> = effects.into();
        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::ShowOverlay => {
                    if !self.overlay_visible {
                        self.capture.reconfigure(&read_snapshot(&self.store));
                    }
                    self.overlay_visible = true;
                }
                Effect::HideOverlay => {
                    self.overlay_visible = false;
                    self.capture.clear();
                }
                Effect::PauseActivity => self.protected.pause_activity(),
                Effect::ResumeActivity => self.protected.resume_activity(),
                Effect::Verify(ticket, submission) => {
                    let outcome =
                        arbitrate(&self.store, submission.candidate.as_str(), submission.probe);
                    pending.extend(
                        self.machine
                            .handle(LockEvent::Verified(Verdict { ticket, outcome }), now),
                    );
                }
                Effect::SignalIncorrect => self.notice = Some(Notice::Incorrect),
                Effect::ClearInput => self.capture.clear(),
                Effect::EnterDecoy => {
                    self.handoff.enter();
                }
                Effect::ExitDecoy => {
                    self.handoff.exit();
                }
                Effect::PromptSetup => self.notice = Some(Notice::SetupRequired),
            }
        }
    }
}

fn read_snapshot(store: &CredentialStore) -> CredentialSnapshot {
    store.snapshot().unwrap_or_default()
}
