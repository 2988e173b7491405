//! Per-scene image request bookkeeping.
//!
//! Keyed by `(session, index)` so that switching sessions never aliases the
//! flags of one session onto another. For each scene the ledger tracks:
//!
//! - every prompt already dispatched (in flight or completed)
//! - the single outstanding prompt, if any
//! - a prompt that arrived while another was outstanding
//! - whether the last request failed and may be retried

use crate::scene::SceneKey;
use std::collections::{BTreeMap, BTreeSet};

/// Result of asking the ledger whether a prompt should be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Send the request now. The prompt is now outstanding.
    Now,
    /// Another request is outstanding; this prompt goes out when it finishes.
    Deferred,
    /// Already requested (or already queued) for this prompt.
    Skip,
}

/// What to do with a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finish {
    /// Write the result into the store (still subject to the session guard).
    pub apply: bool,
    /// A deferred prompt that is now outstanding and must be dispatched.
    pub follow_up: Option<String>,
}

impl Finish {
    fn drop_result() -> Self {
        Self {
            apply: false,
            follow_up: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SceneRequests {
    dispatched: BTreeSet<String>,
    outstanding: Option<String>,
    pending: Option<String>,
    retry: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImageRequestState {
    entries: BTreeMap<SceneKey, SceneRequests>,
}

impl ImageRequestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether `prompt` needs a request for `key` and records it.
    ///
    /// `force` skips the already-dispatched check (manual regenerate) but
    /// never allows a second outstanding request for the same scene.
    pub fn begin(&mut self, key: &SceneKey, prompt: &str, force: bool) -> Dispatch {
        let entry = self.entries.entry(key.clone()).or_default();

        if !force && entry.dispatched.contains(prompt) {
            // Back on a prompt that is already handled; drop any queued one.
            entry.pending = None;
            return Dispatch::Skip;
        }

        if let Some(outstanding) = &entry.outstanding {
            if outstanding == prompt || entry.pending.as_deref() == Some(prompt) {
                return Dispatch::Skip;
            }
            entry.pending = Some(prompt.to_string());
            return Dispatch::Deferred;
        }

        entry.outstanding = Some(prompt.to_string());
        entry.dispatched.insert(prompt.to_string());
        entry.retry = false;
        Dispatch::Now
    }

    /// Records the completion of the outstanding request for `key`.
    ///
    /// A failure forgets the prompt so a later snapshot can retry it. A result
    /// for a prompt that was superseded while in flight is not applied.
    pub fn finish(&mut self, key: &SceneKey, prompt: &str, succeeded: bool) -> Finish {
        let Some(entry) = self.entries.get_mut(key) else {
            return Finish::drop_result();
        };
        if entry.outstanding.as_deref() != Some(prompt) {
            return Finish::drop_result();
        }
        entry.outstanding = None;

        if !succeeded {
            entry.dispatched.remove(prompt);
        }

        match entry.pending.take() {
            Some(next) if next != prompt => {
                entry.outstanding = Some(next.clone());
                entry.dispatched.insert(next.clone());
                Finish {
                    apply: false,
                    follow_up: Some(next),
                }
            }
            _ => {
                if !succeeded {
                    entry.retry = true;
                }
                Finish {
                    apply: succeeded,
                    follow_up: None,
                }
            }
        }
    }

    /// Marks `prompt` as satisfied for `key` without sending a request.
    pub fn record_completed(&mut self, key: &SceneKey, prompt: &str) {
        self.entries
            .entry(key.clone())
            .or_default()
            .dispatched
            .insert(prompt.to_string());
    }

    /// Indices of `session` whose last request failed; clears the flags.
    pub fn take_retries(&mut self, session: &str) -> Vec<usize> {
        self.entries
            .iter_mut()
            .filter(|(key, entry)| key.session == session && entry.retry)
            .map(|(key, entry)| {
                entry.retry = false;
                key.index
            })
            .collect()
    }

    pub fn was_dispatched(&self, key: &SceneKey, prompt: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.dispatched.contains(prompt))
    }

    pub fn is_outstanding(&self, key: &SceneKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.outstanding.is_some())
    }

    pub fn outstanding_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.outstanding.is_some())
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
