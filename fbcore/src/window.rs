//! Decides when a section needs its next page.
//!
//! A probe is computed fresh from the viewport and the section; the only state kept
//! between evaluations is the [`FetchGuard`], which suppresses duplicate requests for
//! the same watermark and keeps at most one request per section in flight.

use crate::sections::RosterSection;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowProbe {
    pub section_id: String,
    /// Rows the server claims for the section.
    pub count: usize,
    /// Highest row index currently rendered, 0 when nothing is rendered yet.
    pub last_visible_index: usize,
    /// Rows loaded before the first hole.
    pub materialized_len: usize,
}

impl WindowProbe {
    pub fn new(section: &RosterSection, last_visible_index: Option<usize>) -> Self {
        Self {
            section_id: section.id().to_string(),
            count: section.count(),
            last_visible_index: last_visible_index.unwrap_or(0),
            materialized_len: section.materialized_len(),
        }
    }

    pub fn needs_more(&self) -> bool {
        self.last_visible_index + 1 >= self.materialized_len
    }

    pub fn can_fetch_more(&self) -> bool {
        self.count > self.materialized_len
    }

    pub fn fetch_key(&self) -> FetchKey {
        FetchKey(format!(
            "{}:{}:{}:{}",
            self.section_id, self.count, self.last_visible_index, self.materialized_len
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey(String);

impl FetchKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchGuard {
    last_issued: Option<FetchKey>,
    in_flight: bool,
}

impl FetchGuard {
    pub fn should_fetch(&self, probe: &WindowProbe) -> bool {
        probe.needs_more()
            && probe.can_fetch_more()
            && self.last_issued.as_ref() != Some(&probe.fetch_key())
            && !self.in_flight
    }

    /// Claims the slot for `probe` if a fetch is warranted.
    pub fn begin(&mut self, probe: &WindowProbe) -> Option<FetchKey> {
        if !self.should_fetch(probe) {
            return None;
        }
        let key = probe.fetch_key();
        self.in_flight = true;
        self.last_issued = Some(key.clone());
        Some(key)
    }

    /// Releases the slot, whatever the outcome of the fetch.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_issued(&self) -> Option<&FetchKey> {
        self.last_issued.as_ref()
    }
}
