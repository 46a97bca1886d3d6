use std::collections::VecDeque;
use wordface_core::Target;

/// A response key press, stamped when the event loop received it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub name: String,
    pub target: Target,
    pub timestamp_ns: u64,
}

/// Response keys waiting for the schedule to poll them.
#[derive(Debug, Default)]
pub struct KeyBuffer {
    pending: VecDeque<KeyPress>,
}

impl KeyBuffer {
    pub fn push(&mut self, key: KeyPress) {
        self.pending.push_back(key);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Drops presses that happened before `ts`.
    pub fn discard_before(&mut self, ts: u64) {
        self.pending.retain(|k| k.timestamp_ns >= ts);
    }

    /// Returns the earliest buffered press and empties the buffer.
    pub fn take_first(&mut self) -> Option<KeyPress> {
        let first = self.pending.pop_front();
        self.pending.clear();
        first
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
