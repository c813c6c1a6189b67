//! Reassembles notification fragments into complete Modbus responses.
//!
//! BLE notifications may split or coalesce a response frame arbitrarily; a
//! 13-byte read response can arrive as one notification or thirteen. The
//! accumulator grows a buffer until the frame can be classified from its
//! function byte and judged complete.

use crate::frame::{FUNC_READ_HOLDING, FUNC_WRITE_SINGLE, MIN_RESPONSE_LEN, WRITE_ECHO_LEN};

#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    buf: Vec<u8>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport fragment, in arrival order.
    ///
    /// Returns the accumulated response once it is judged complete, leaving
    /// the accumulator empty for the next command.
    pub fn push(&mut self, fragment: &[u8]) -> Option<Vec<u8>> {
        self.buf.extend_from_slice(fragment);
        if self.is_complete() {
            Some(std::mem::take(&mut self.buf))
        } else {
            None
        }
    }

    fn is_complete(&self) -> bool {
        if self.buf.len() < MIN_RESPONSE_LEN {
            return false;
        }
        match self.buf[1] {
            FUNC_READ_HOLDING => {
                let byte_count = self.buf[2] as usize;
                self.buf.len() >= MIN_RESPONSE_LEN + byte_count
            }
            FUNC_WRITE_SINGLE => self.buf.len() >= WRITE_ECHO_LEN,
            // An unrecognized function code completes immediately so a
            // garbled response cannot park the session until its timeout.
            _ => true,
        }
    }

    /// Drop any partial data, e.g. when a command is abandoned.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
