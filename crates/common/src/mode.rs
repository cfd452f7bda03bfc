//! One-way "raw decoding" switch for the native scanner.
//!
//! The scanner owns the [`RawModeSwitch`] and is the only writer. Anything else
//! that wants to report the mode gets a cloneable [`RawModeHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct RawModeSwitch {
    flag: Arc<AtomicBool>,
}

impl RawModeSwitch {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Turn raw mode on. Returns `true` only for the call that flipped it.
    pub fn engage(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_engaged(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn handle(&self) -> RawModeHandle {
        RawModeHandle {
            flag: Arc::clone(&self.flag),
        }
    }
}

impl Default for RawModeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`RawModeSwitch`].
#[derive(Debug, Clone)]
pub struct RawModeHandle {
    flag: Arc<AtomicBool>,
}

impl RawModeHandle {
    pub fn is_engaged(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
