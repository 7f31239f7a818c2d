// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn sequence_numbers_start_at_one_and_increase() {
    let mut queue = FrameQueue::new();
    assert_eq!(queue.last_seq(), 0);

    assert_eq!(queue.send(ClientMessage::join_doc("a")), 1);
    assert_eq!(queue.send(ClientMessage::join_doc("b")), 2);
    assert_eq!(queue.last_seq(), 2);
    assert_eq!(queue.len(), 2);
}

#[test]
fn drain_returns_frames_in_order() {
    let mut queue = FrameQueue::new();
    queue.send(ClientMessage::join_doc("a"));
    queue.send(ClientMessage::leave_doc("a"));

    let frames = queue.drain();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].seq, Some(1));
    assert_eq!(frames[0].d, Some(ClientMessage::join_doc("a")));
    assert_eq!(frames[1].seq, Some(2));
    assert!(queue.is_empty());

    // numbering continues after a drain
    assert_eq!(queue.send(ClientMessage::join_doc("c")), 3);
}
