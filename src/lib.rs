//! Pinveil: a terminal PIN lock with a duress PIN.
//!
//! The real PIN unlocks the protected workspace. A configured dummy PIN
//! dismisses the lock exactly the same way but hands control to a decoy
//! notes app instead.

pub mod app;
pub mod arbiter;
pub mod crypto;
pub mod disguise;
pub mod error;
pub mod gate;
pub mod input;
pub mod lock;
pub mod logging;
pub mod models;
pub mod storage;
pub mod ui;
