// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Delta lists: pending local edits relative to the last flushed text.
//!
//! A [`DeltaList`] is built against a base text (the text the far end is
//! believed to have) and describes how to turn it into the current local
//! text. Every local change is folded into the list with [`DeltaList::record`]
//! so a burst of keystrokes leaves as a single compact edit.
//!
//! Positions passed to `record` are offsets into the *current local text*.
//! In those coordinates Retain and Insert runs occupy characters while
//! Delete runs are zero-width.

use std::cmp::Ordering;

use tracing::warn;

use crate::error::{Error, Result};
use crate::run::Run;
use crate::text;

/// Ordered runs describing a pending edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaList {
    runs: Vec<Run>,
}

impl DeltaList {
    /// Creates an empty delta list.
    pub fn new() -> Self {
        DeltaList::default()
    }

    /// The runs as currently merged (no implicit trailing retain).
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if the list describes no change.
    ///
    /// A list holding only Retain runs is a no-op and counts as empty.
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| matches!(run, Run::Retain(_)))
    }

    /// Drops every run.
    pub fn clear(&mut self) {
        self.runs.clear();
    }

    /// Characters of the base text consumed by the explicit runs.
    pub fn base_len(&self) -> usize {
        self.runs.iter().map(Run::base_len).sum()
    }

    /// Characters of the local text covered by the explicit runs.
    pub fn target_len(&self) -> usize {
        self.runs.iter().map(Run::target_len).sum()
    }

    /// Folds one local change into the list.
    ///
    /// `retain` is the offset of the change in the current local text,
    /// `delete` the exact text removed there and `insert` the text put in
    /// its place. Either may be empty.
    pub fn record(&mut self, retain: usize, delete: &str, insert: &str) {
        let at = self.split_at_target(retain);
        self.absorb_delete(at, delete);
        if !insert.is_empty() {
            self.runs.insert(at, Run::Insert(insert.to_string()));
        }
        self.normalize();
    }

    /// Returns the runs with a trailing retain covering the rest of the base.
    ///
    /// If the runs consume more than `base_len` characters the list is out
    /// of step with the base text; this is logged and the runs are returned
    /// unchanged so the far end can detect the divergence.
    pub fn finalize(&self, base_len: usize) -> Vec<Run> {
        let mut runs = self.runs.clone();
        let consumed = self.base_len();
        match consumed.cmp(&base_len) {
            Ordering::Less => {
                let remaining = base_len - consumed;
                match runs.last_mut() {
                    Some(Run::Retain(n)) => *n += remaining,
                    _ => runs.push(Run::Retain(remaining)),
                }
            }
            Ordering::Greater => {
                warn!(consumed, base_len, "delta list consumes more than the base text");
            }
            Ordering::Equal => {}
        }
        runs
    }

    /// Splits the run straddling local offset `pos` and returns the index
    /// where new runs for that offset go.
    ///
    /// Offsets past the covered text materialize the implicit trailing
    /// retain.
    fn split_at_target(&mut self, pos: usize) -> usize {
        let mut offset = 0;
        for idx in 0..self.runs.len() {
            let width = self.runs[idx].target_len();
            if offset + width > pos {
                let cut = pos - offset;
                if cut == 0 {
                    return idx;
                }
                let (head, tail) = self.runs[idx].clone().split(cut);
                self.runs[idx] = tail;
                self.runs.insert(idx, head);
                return idx + 1;
            }
            offset += width;
        }
        if pos > offset {
            self.runs.push(Run::Retain(pos - offset));
        }
        self.runs.len()
    }

    /// Accounts for `delete` starting at run index `at`.
    ///
    /// Retained characters become Delete runs, characters still sitting in
    /// unsent Insert runs are dropped, and pending Delete runs are stepped
    /// over since they take no room in the local text. Anything left over
    /// comes out of the implicit trailing retain.
    fn absorb_delete(&mut self, at: usize, delete: &str) {
        let total = text::char_len(delete);
        let mut consumed = 0;
        let mut idx = at;

        while consumed < total && idx < self.runs.len() {
            let remaining = total - consumed;
            let converted = match &mut self.runs[idx] {
                Run::Delete(_) => None,
                Run::Insert(t) => {
                    let take = text::char_len(t).min(remaining);
                    *t = text::split_at(t, take).1.to_string();
                    consumed += take;
                    None
                }
                Run::Retain(n) => {
                    let take = (*n).min(remaining);
                    *n -= take;
                    Some(take)
                }
            };

            match converted {
                Some(take) => {
                    let removed = text::slice(delete, consumed..consumed + take);
                    self.runs.insert(idx, Run::Delete(removed.to_string()));
                    consumed += take;
                    idx += 2;
                }
                None => idx += 1,
            }
        }

        if consumed < total {
            let removed = text::slice(delete, consumed..total);
            self.runs.push(Run::Delete(removed.to_string()));
        }
    }

    /// Restores the canonical form: no empty runs, adjacent retains merged,
    /// and every stretch between retains written as one Delete then one
    /// Insert.
    fn normalize(&mut self) {
        let mut out: Vec<Run> = Vec::with_capacity(self.runs.len());
        let mut deleted = String::new();
        let mut inserted = String::new();

        for run in self.runs.drain(..) {
            match run {
                Run::Retain(0) => {}
                Run::Retain(n) => {
                    flush_group(&mut out, &mut deleted, &mut inserted);
                    match out.last_mut() {
                        Some(Run::Retain(m)) => *m += n,
                        _ => out.push(Run::Retain(n)),
                    }
                }
                Run::Delete(t) => deleted.push_str(&t),
                Run::Insert(t) => inserted.push_str(&t),
            }
        }
        flush_group(&mut out, &mut deleted, &mut inserted);

        self.runs = out;
    }
}

fn flush_group(out: &mut Vec<Run>, deleted: &mut String, inserted: &mut String) {
    if !deleted.is_empty() {
        out.push(Run::Delete(std::mem::take(deleted)));
    }
    if !inserted.is_empty() {
        out.push(Run::Insert(std::mem::take(inserted)));
    }
}

/// Applies `runs` to `base`, checking every Delete against the base text.
///
/// The runs must consume the whole base exactly.
pub fn apply(base: &str, runs: &[Run]) -> Result<String> {
    let base_len = text::char_len(base);
    let mut out = String::with_capacity(base.len());
    let mut offset: usize = 0;

    for run in runs {
        match run {
            Run::Retain(n) => {
                let end = offset.saturating_add(*n);
                if end > base_len {
                    return Err(Error::LengthMismatch {
                        consumed: end,
                        base: base_len,
                    });
                }
                out.push_str(text::slice(base, offset..end));
                offset = end;
            }
            Run::Delete(t) => {
                let end = offset + text::char_len(t);
                let expected = text::slice(base, offset..end);
                if expected != t {
                    return Err(Error::DeleteMismatch {
                        offset,
                        expected: expected.to_string(),
                        actual: t.clone(),
                    });
                }
                offset = end;
            }
            Run::Insert(t) => out.push_str(t),
        }
    }

    if offset != base_len {
        return Err(Error::LengthMismatch {
            consumed: offset,
            base: base_len,
        });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "delta_tests.rs"]
mod tests;
