// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed runs of an edit.
//!
//! A run describes what happens to a span of the base text:
//!
//! - `Retain(n)`: keep the next `n` characters
//! - `Delete(text)`: remove `text`, which must be the next characters
//! - `Insert(text)`: add `text` at the current position
//!
//! On the wire a run is a prefixed string (`"r5"`, `"dfoo"`, `"ibar"`). The
//! string form only exists at the serialization boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::text;

/// One typed span of a delta list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Run {
    Retain(usize),
    Delete(String),
    Insert(String),
}

impl Run {
    /// Length of the run in characters.
    pub fn len(&self) -> usize {
        match self {
            Run::Retain(n) => *n,
            Run::Delete(t) | Run::Insert(t) => text::char_len(t),
        }
    }

    /// Returns true for `Retain(0)` and empty Delete/Insert runs.
    pub fn is_empty(&self) -> bool {
        match self {
            Run::Retain(n) => *n == 0,
            Run::Delete(t) | Run::Insert(t) => t.is_empty(),
        }
    }

    /// Characters consumed from the base text.
    pub fn base_len(&self) -> usize {
        match self {
            Run::Retain(_) | Run::Delete(_) => self.len(),
            Run::Insert(_) => 0,
        }
    }

    /// Characters occupied in the resulting text.
    pub fn target_len(&self) -> usize {
        match self {
            Run::Retain(_) | Run::Insert(_) => self.len(),
            Run::Delete(_) => 0,
        }
    }

    /// Splits the run after `at` characters into two runs of the same kind.
    pub fn split(self, at: usize) -> (Run, Run) {
        match self {
            Run::Retain(n) => {
                let at = at.min(n);
                (Run::Retain(at), Run::Retain(n - at))
            }
            Run::Delete(t) => {
                let (head, tail) = text::split_at(&t, at);
                (Run::Delete(head.to_string()), Run::Delete(tail.to_string()))
            }
            Run::Insert(t) => {
                let (head, tail) = text::split_at(&t, at);
                (Run::Insert(head.to_string()), Run::Insert(tail.to_string()))
            }
        }
    }

    fn prefix(&self) -> char {
        match self {
            Run::Retain(_) => 'r',
            Run::Delete(_) => 'd',
            Run::Insert(_) => 'i',
        }
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Run::Retain(n) => write!(f, "r{n}"),
            Run::Delete(t) | Run::Insert(t) => write!(f, "{}{t}", self.prefix()),
        }
    }
}

impl FromStr for Run {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let prefix = chars.next();
        let payload = chars.as_str();
        match prefix {
            Some('r') => payload
                .parse::<usize>()
                .map(Run::Retain)
                .map_err(|_| Error::InvalidRun(s.to_string())),
            Some('d') => Ok(Run::Delete(payload.to_string())),
            Some('i') => Ok(Run::Insert(payload.to_string())),
            _ => Err(Error::InvalidRun(s.to_string())),
        }
    }
}

impl TryFrom<String> for Run {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Run> for String {
    fn from(run: Run) -> Self {
        run.to_string()
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
