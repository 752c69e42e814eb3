use crate::lock::LockEvent;

/// Hands control to the decoy app after a dummy PIN match.
///
/// Holds only the host's entry point; it never sees a credential and logs
/// nothing, so a decoy session leaves no trace distinguishable from normal use.
#[derive(Default)]
pub struct DisguiseHandoff {
    entry: Option<Box<dyn FnMut()>>,
    active: bool,
}

impl DisguiseHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: impl FnMut() + 'static) {
        self.entry = Some(Box::new(entry));
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Invokes the entry point once per handoff; repeated calls while the
    /// decoy is up do nothing. Returns whether the entry point ran.
    pub fn enter(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        match self.entry.as_mut() {
            Some(entry) => {
                entry();
                true
            }
            None => false,
        }
    }

    /// Leaves the decoy. The returned event puts the lock machine back to
    /// `Locked`; the protected app is never reachable from here directly.
    pub fn exit(&mut self) -> Option<LockEvent> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(LockEvent::DecoyExited)
    }
}
