//! PIN digit entry: normalization, capping, display slice and the
//! auto-submit rule.

use zeroize::{Zeroize, Zeroizing};

use crate::storage::CredentialSnapshot;

/// A PIN candidate. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Candidate(Zeroizing<String>);

impl Candidate {
    pub fn new(digits: impl Into<String>) -> Self {
        Self(Zeroizing::new(digits.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Candidate(len={})", self.len())
    }
}

/// A candidate handed to verification.
///
/// A probe only asks "is this the dummy PIN?" and is not a terminal attempt:
/// it fires when a dummy PIN shorter than the real PIN has been typed, and a
/// mismatch leaves the buffer alone so the real PIN can still be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub candidate: Candidate,
    pub probe: bool,
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub struct InputCapture {
    buffer: Zeroizing<String>,
    real_len: usize,
    dummy_len: usize,
}

impl InputCapture {
    pub fn new(real_len: usize, dummy_len: usize) -> Self {
        Self {
            buffer: Zeroizing::new(String::new()),
            real_len,
            dummy_len,
        }
    }

    pub fn from_snapshot(snapshot: &CredentialSnapshot) -> Self {
        Self::new(snapshot.real_length(), snapshot.dummy_length())
    }

    /// Re-reads credential lengths; always starts from an empty buffer.
    pub fn reconfigure(&mut self, snapshot: &CredentialSnapshot) {
        self.real_len = snapshot.real_length();
        self.dummy_len = snapshot.dummy_length();
        self.clear();
    }

    pub fn capacity(&self) -> usize {
        self.real_len.max(self.dummy_len)
    }

    /// Number of boxes drawn: always the real PIN length.
    pub fn box_count(&self) -> usize {
        self.real_len
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// First `real_len` digits, so a longer dummy PIN never overflows the boxes.
    pub fn display(&self) -> &str {
        let end = self.buffer.len().min(self.real_len);
        &self.buffer[..end]
    }

    /// Appends typed input. Non-digits are dropped and the buffer is capped.
    pub fn push_str(&mut self, raw: &str) -> Option<Submission> {
        let room = self.capacity().saturating_sub(self.buffer.len());
        let mut digits = digits_only(raw);
        let accepted = digits.len().min(room);
        if accepted == 0 {
            digits.zeroize();
            return None;
        }
        self.buffer.push_str(&digits[..accepted]);
        digits.zeroize();
        self.evaluate()
    }

    pub fn push_char(&mut self, c: char) -> Option<Submission> {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp))
    }

    /// Pasted text replaces the buffer, through the same digit filter.
    pub fn paste(&mut self, raw: &str) -> Option<Submission> {
        if digits_only(raw).is_empty() {
            return None;
        }
        self.clear();
        self.push_str(raw)
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    pub fn clear(&mut self) {
        self.buffer.zeroize();
    }

    /// Explicit submit (Enter). `None` means the real PIN length has not been
    /// reached yet and nothing is attempted.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.buffer.len() < self.real_len {
            return None;
        }
        Some(self.take(false))
    }

    fn evaluate(&mut self) -> Option<Submission> {
        let len = self.buffer.len();
        if self.dummy_len > 0 && len == self.dummy_len {
            if self.dummy_len < self.real_len {
                return Some(Submission {
                    candidate: Candidate::new(self.buffer.as_str()),
                    probe: true,
                });
            }
            return Some(self.take(false));
        }
        // A longer dummy PIN defers the real-length auto-submit; the real PIN
        // is then submitted explicitly.
        if len >= self.real_len && self.dummy_len <= self.real_len {
            return Some(self.take(false));
        }
        None
    }

    fn take(&mut self, probe: bool) -> Submission {
        let digits = std::mem::take(&mut *self.buffer);
        Submission {
            candidate: Candidate::new(digits),
            probe,
        }
    }
}
