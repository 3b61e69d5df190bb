// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topic Routing Keys
//!
//! Client-side view of the broker's topic matching: keys and patterns are
//! `.`-separated segments, `*` matches exactly one segment and `#` matches
//! zero or more. The broker does the real routing; these helpers let
//! applications build and check keys before binding or publishing, and
//! `topology::declare_and_bind` refuses patterns [`validate_pattern`] rejects.

use crate::errors::TopologyError;

pub const SEGMENT_DELIMITER: char = '.';
pub const ONE_SEGMENT: &str = "*";
pub const ANY_SEGMENTS: &str = "#";

/// Joins segments into a routing key, e.g. `key(&["army_moves", "alice"])`.
pub fn key(segments: &[&str]) -> String {
    segments.join(".")
}

/// Pattern matching every key one level below `prefix`, e.g. `game_logs.*`.
pub fn children_of(prefix: &str) -> String {
    format!("{prefix}{SEGMENT_DELIMITER}{ONE_SEGMENT}")
}

/// Checks that `pattern` has no empty segments.
///
/// An empty pattern is valid and only matches the empty key.
pub fn validate_pattern(pattern: &str) -> Result<(), TopologyError> {
    if pattern.is_empty() {
        return Ok(());
    }

    match pattern.split(SEGMENT_DELIMITER).position(str::is_empty) {
        Some(idx) => Err(TopologyError::InvalidRoutingKey(
            pattern.to_owned(),
            format!("empty segment at position {idx}"),
        )),
        None => Ok(()),
    }
}

/// Returns whether a message published under `key` reaches a topic binding
/// declared with `pattern`.
///
/// Runs in `O(pattern segments * key segments)` whatever the number of `#`.
pub fn matches(pattern: &str, key: &str) -> bool {
    let mut pattern: Vec<&str> = pattern.split(SEGMENT_DELIMITER).collect();
    // `#.#` matches exactly what `#` matches
    pattern.dedup_by(|a, b| *a == ANY_SEGMENTS && *b == ANY_SEGMENTS);
    let key: Vec<&str> = key.split(SEGMENT_DELIMITER).collect();

    // reachable[j]: the pattern segments seen so far match the first j key segments
    let mut reachable = vec![false; key.len() + 1];
    reachable[0] = true;

    for segment in pattern {
        let mut next = vec![false; key.len() + 1];

        if segment == ANY_SEGMENTS {
            let mut seen = false;
            for (j, slot) in next.iter_mut().enumerate() {
                seen |= reachable[j];
                *slot = seen;
            }
        } else {
            for (j, word) in key.iter().enumerate() {
                if reachable[j] && (segment == ONE_SEGMENT || segment == *word) {
                    next[j + 1] = true;
                }
            }
        }

        reachable = next;
    }

    reachable[key.len()]
}
