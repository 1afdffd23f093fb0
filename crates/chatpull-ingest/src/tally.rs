//! Running tallies over categorical fields
//!
//! Counts are kept in `BTreeMap`s so the summary lists values in a stable
//! order. Invariant: for every tally, the sum of its counts equals the
//! number of records observed.

use crate::record::Conversation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Occurrence counts for the values of one categorical field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally {
    counts: BTreeMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: &str) {
        // Avoid allocating a key for values already seen.
        match self.counts.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(value.to_string(), 1);
            },
        }
    }

    pub fn get(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Distinct values, sorted
    pub fn distinct(&self) -> Vec<String> {
        self.counts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.counts
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tally {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for value in iter {
            tally.observe(value.as_ref());
        }
        tally
    }
}

/// Everything the summary derives from the records of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningTallies {
    pub records: u64,
    pub messages: u64,
    pub models: Tally,
    pub languages: Tally,
}

impl RunningTallies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one persisted record
    pub fn observe(&mut self, conversation: &Conversation) {
        self.records += 1;
        self.messages += conversation.message_count() as u64;
        self.models.observe(&conversation.model);
        self.languages.observe(&conversation.language);
    }

    pub fn avg_messages(&self) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            self.messages as f64 / self.records as f64
        }
    }
}
