// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Character-indexed string helpers.
//!
//! Every offset in td-core counts Unicode scalar values, not bytes. These
//! helpers translate char offsets into byte offsets with ropey's indexing
//! routines and clamp anything past the end of the text.

use std::ops::Range;

use ropey::str_utils::{byte_to_char_idx, char_to_byte_idx};

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    byte_to_char_idx(s, s.len())
}

/// Byte offset of the character at `char_idx`, clamped to `s.len()`.
pub fn byte_offset(s: &str, char_idx: usize) -> usize {
    char_to_byte_idx(s, char_idx)
}

/// The characters of `s` in `range`, clamped to the end of `s`.
pub fn slice(s: &str, range: Range<usize>) -> &str {
    let start = byte_offset(s, range.start);
    let end = byte_offset(s, range.end.max(range.start));
    &s[start..end]
}

/// Replaces the characters of `s` in `range` with `with`.
pub fn splice(s: &mut String, range: Range<usize>, with: &str) {
    let start = byte_offset(s, range.start);
    let end = byte_offset(s, range.end.max(range.start));
    s.replace_range(start..end, with);
}

/// Splits `s` after `at` characters.
pub fn split_at(s: &str, at: usize) -> (&str, &str) {
    s.split_at(byte_offset(s, at))
}

#[cfg(test)]
#[path = "text_tests.rs"]
mod tests;
