// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outgoing message buffer.
//!
//! The engine never waits on the network. It hands messages to an
//! [`Outbox`], which numbers them and returns at once; a driver drains the
//! numbered frames and writes them to the transport in order.

use std::collections::VecDeque;

use crate::protocol::{ClientMessage, Frame};

/// Fire-and-continue message sink.
pub trait Outbox {
    /// Queues a message and returns the sequence number it will carry.
    fn send(&mut self, msg: ClientMessage) -> u64;
}

/// Numbered frames waiting to be written to the transport.
#[derive(Debug)]
pub struct FrameQueue {
    next_seq: u64,
    frames: VecDeque<Frame<ClientMessage>>,
}

impl FrameQueue {
    /// Creates a queue whose first frame is numbered 1.
    pub fn new() -> Self {
        FrameQueue {
            next_seq: 1,
            frames: VecDeque::new(),
        }
    }

    /// Removes and returns every queued frame, oldest first.
    pub fn drain(&mut self) -> Vec<Frame<ClientMessage>> {
        self.frames.drain(..).collect()
    }

    /// Sequence number of the last queued frame (0 if none yet).
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox for FrameQueue {
    fn send(&mut self, msg: ClientMessage) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frames.push_back(Frame::numbered(seq, msg));
        seq
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
