//! Lock session state machine.
//!
//! All lock state lives in one owned [`LockMachine`]. Inputs arrive as
//! [`LockEvent`]s and every transition returns the [`Effect`]s the host must
//! apply (show the overlay, pause the protected app, verify a candidate, ...).
//! Nothing here touches the terminal or the disk, so every transition can be
//! driven from tests with synthetic instants.
//!
//! Verification is two-phase: a [`LockEvent::Submit`] yields
//! [`Effect::Verify`] carrying a [`Ticket`], and the host answers with
//! [`LockEvent::Verified`]. Only one ticket is in flight; later submissions
//! queue behind it. Any forced lock (hidden surface, inactivity, manual lock)
//! moves to a new epoch, so a verdict issued before it is discarded and can
//! never reopen the session.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::arbiter::Outcome;
use crate::input::Submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    Unlocked,
    Locked,
    /// The dummy PIN handed control to the decoy app.
    Disguised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    Activity,
    Hidden,
    Visible,
    Submit(Submission),
    Verified(Verdict),
    TimeoutFired,
    LockNow,
    DecoyExited,
    CredentialsSaved,
    CredentialsRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowOverlay,
    HideOverlay,
    PauseActivity,
    ResumeActivity,
    Verify(Ticket, Submission),
    /// Generic "Incorrect PIN"; never says which credential was tried.
    SignalIncorrect,
    ClearInput,
    EnterDecoy,
    ExitDecoy,
    PromptSetup,
}

/// Deadline measured from the last activity, never from session start.
#[derive(Debug, Clone)]
pub struct InactivityClock {
    window: Duration,
    deadline: Option<Instant>,
}

impl InactivityClock {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}

pub struct LockMachine {
    phase: LockPhase,
    has_real: bool,
    session_unlocked: bool,
    clock: InactivityClock,
    epoch: u64,
    next_id: u64,
    in_flight: Option<(Ticket, bool)>,
    queue: VecDeque<Submission>,
}

impl LockMachine {
    /// Builds the machine for a fresh runtime session.
    ///
    /// Starts `Locked` when a real PIN exists and the session has not been
    /// unlocked, otherwise `Unlocked`.
    pub fn start(
        has_real: bool,
        session_unlocked: bool,
        inactivity: Duration,
        now: Instant,
    ) -> (Self, Vec<Effect>) {
        let mut machine = Self {
            phase: LockPhase::Unlocked,
            has_real,
            session_unlocked: session_unlocked && has_real,
            clock: InactivityClock::new(inactivity),
            epoch: 0,
            next_id: 0,
            in_flight: None,
            queue: VecDeque::new(),
        };
        let mut effects = Vec::new();
        if machine.is_unlocked() {
            if has_real {
                machine.clock.reset(now);
            }
            effects.push(Effect::ResumeActivity);
        } else {
            machine.phase = LockPhase::Locked;
            effects.push(Effect::PauseActivity);
            effects.push(Effect::ShowOverlay);
        }
        (machine, effects)
    }

    pub fn phase(&self) -> LockPhase {
        self.phase
    }

    pub fn has_real(&self) -> bool {
        self.has_real
    }

    /// Vacuously true without a real PIN.
    pub fn is_unlocked(&self) -> bool {
        !self.has_real || self.session_unlocked
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.clock.deadline()
    }

    pub fn is_verifying(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn show_lock_if_locked(&self) -> Vec<Effect> {
        if self.phase == LockPhase::Locked && !self.is_unlocked() {
            vec![Effect::ShowOverlay]
        } else {
            Vec::new()
        }
    }

    pub fn lock_now(&mut self, now: Instant) -> Vec<Effect> {
        self.handle(LockEvent::LockNow, now)
    }

    pub fn handle(&mut self, event: LockEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            LockEvent::Activity => {
                if self.phase == LockPhase::Unlocked && self.has_real {
                    self.clock.reset(now);
                }
            }
            LockEvent::Hidden => {
                if self.has_real {
                    self.engage("hidden", &mut effects);
                }
            }
            LockEvent::Visible => self.on_visible(now, &mut effects),
            LockEvent::TimeoutFired => {
                let expired = self.phase == LockPhase::Unlocked && self.clock.is_expired(now);
                // a timeout landing mid-verification voids that attempt too
                let verifying = self.phase == LockPhase::Locked && self.in_flight.is_some();
                if self.has_real && (expired || verifying) {
                    self.engage("inactivity", &mut effects);
                }
            }
            LockEvent::LockNow => {
                if self.has_real {
                    self.engage("manual", &mut effects);
                } else {
                    effects.push(Effect::PromptSetup);
                }
            }
            LockEvent::Submit(submission) => {
                if self.phase != LockPhase::Locked {
                    debug!("submission outside lock screen ignored");
                } else if self.in_flight.is_some() {
                    self.queue.push_back(submission);
                } else {
                    self.dispatch(submission, &mut effects);
                }
            }
            LockEvent::Verified(verdict) => self.on_verdict(verdict, now, &mut effects),
            LockEvent::DecoyExited => {
                if self.phase == LockPhase::Disguised {
                    self.phase = LockPhase::Locked;
                    effects.push(Effect::ClearInput);
                    effects.push(Effect::ShowOverlay);
                }
            }
            LockEvent::CredentialsSaved => {
                if self.phase == LockPhase::Unlocked {
                    self.has_real = true;
                    self.session_unlocked = true;
                    self.clock.reset(now);
                }
            }
            LockEvent::CredentialsRemoved => {
                if self.phase != LockPhase::Disguised {
                    self.has_real = false;
                    self.session_unlocked = false;
                    self.clock.cancel();
                    self.invalidate_pending();
                    if self.phase == LockPhase::Locked {
                        effects.push(Effect::ClearInput);
                        effects.push(Effect::HideOverlay);
                        effects.push(Effect::ResumeActivity);
                    }
                    self.phase = LockPhase::Unlocked;
                }
            }
        }
        effects
    }

    fn on_visible(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.is_unlocked() {
            if self.phase == LockPhase::Disguised {
                return;
            }
            if self.phase == LockPhase::Locked {
                effects.push(Effect::HideOverlay);
            }
            self.phase = LockPhase::Unlocked;
            if self.has_real {
                self.clock.reset(now);
            }
            effects.push(Effect::ResumeActivity);
        } else if self.phase == LockPhase::Locked {
            effects.push(Effect::ShowOverlay);
        }
    }

    fn on_verdict(&mut self, verdict: Verdict, now: Instant, effects: &mut Vec<Effect>) {
        let probe = match self.in_flight {
            Some((ticket, probe)) if ticket == verdict.ticket && self.phase == LockPhase::Locked => {
                probe
            }
            _ => {
                debug!("stale verification result discarded");
                return;
            }
        };
        self.in_flight = None;

        match verdict.outcome {
            Outcome::RealMatched => {
                self.queue.clear();
                self.session_unlocked = true;
                self.phase = LockPhase::Unlocked;
                self.clock.reset(now);
                effects.push(Effect::ClearInput);
                effects.push(Effect::HideOverlay);
                effects.push(Effect::ResumeActivity);
                info!("lock overlay dismissed");
            }
            Outcome::DummyMatched => {
                // The session flag stays clear: the decoy is one-shot.
                self.queue.clear();
                self.phase = LockPhase::Disguised;
                effects.push(Effect::ClearInput);
                effects.push(Effect::HideOverlay);
                effects.push(Effect::EnterDecoy);
                info!("lock overlay dismissed");
            }
            Outcome::Rejected => {
                if !probe {
                    effects.push(Effect::ClearInput);
                    effects.push(Effect::SignalIncorrect);
                }
                if let Some(next) = self.queue.pop_front() {
                    self.dispatch(next, effects);
                }
            }
        }
    }

    fn dispatch(&mut self, submission: Submission, effects: &mut Vec<Effect>) {
        let ticket = Ticket {
            epoch: self.epoch,
            id: self.next_id,
        };
        self.next_id = self.next_id.wrapping_add(1);
        self.in_flight = Some((ticket, submission.probe));
        effects.push(Effect::Verify(ticket, submission));
    }

    fn invalidate_pending(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.in_flight = None;
        self.queue.clear();
    }

    fn engage(&mut self, reason: &'static str, effects: &mut Vec<Effect>) {
        self.invalidate_pending();
        self.session_unlocked = false;
        self.clock.cancel();
        match self.phase {
            LockPhase::Unlocked => effects.push(Effect::PauseActivity),
            LockPhase::Disguised => effects.push(Effect::ExitDecoy),
            LockPhase::Locked => {}
        }
        self.phase = LockPhase::Locked;
        effects.push(Effect::ClearInput);
        effects.push(Effect::ShowOverlay);
        info!(reason, "lock engaged");
    }
}
