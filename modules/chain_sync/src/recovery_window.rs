//! Rollback recovery window: the last few raw messages, kept so that a safe
//! resume point can be found when a checkpoint is due.

use std::collections::VecDeque;

use ogmios_common::{PointStruct, wire};

pub const RECOVERY_WINDOW_CAPACITY: usize = 3;

#[derive(Debug, Default)]
pub struct RecoveryWindow {
    messages: VecDeque<Vec<u8>>,
}

impl RecoveryWindow {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::with_capacity(RECOVERY_WINDOW_CAPACITY),
        }
    }

    /// Append a message, evicting the oldest once full
    pub fn push(&mut self, message: Vec<u8>) {
        if self.messages.len() == RECOVERY_WINDOW_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.messages.iter().map(Vec::as_slice)
    }

    /// Point of the most recent roll forward, looking at `current` first and
    /// then the window newest first. Messages that fail to decode are skipped.
    pub fn recover_point(&self, current: Option<&[u8]>) -> Option<PointStruct> {
        current
            .into_iter()
            .chain(self.messages.iter().rev().map(Vec::as_slice))
            .find_map(|message| wire::normalize(message).ok()?.roll_forward_point())
    }
}
