//! Progress reporting for a retrieval run

use std::time::Duration;
use tracing::info;

/// Receives progress notes from a [`crate::MessageStream`].
pub trait Progress: Send {
    /// A folder was opened and holds `message_count` messages.
    fn folder_opened(&mut self, folder: &str, message_count: u32);

    /// Iteration over `folder` reached `percent` of its messages.
    fn advanced(&mut self, folder: &str, percent: u32);

    /// The run is over: `messages` were yielded in `elapsed`.
    fn finished(&mut self, messages: u32, elapsed: Duration, rate: u64);
}

/// Writes progress notes as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn folder_opened(&mut self, folder: &str, message_count: u32) {
        info!(folder, message_count, "Now working on {} with {} messages", folder, message_count);
    }

    fn advanced(&mut self, folder: &str, percent: u32) {
        info!(folder, percent, "Downloading emails from {}, {}% done", folder, percent);
    }

    fn finished(&mut self, messages: u32, elapsed: Duration, rate: u64) {
        info!(
            messages,
            elapsed_secs = elapsed.as_secs(),
            rate,
            "Done downloading {} emails in {}s at rate of {} messages per second",
            messages,
            elapsed.as_secs(),
            rate
        );
    }
}

/// Share of `count` covered once `cursor` messages were read, in
/// whole percent.
#[must_use]
pub fn percent_done(cursor: u32, count: u32) -> u32 {
    if count == 0 {
        return 100;
    }
    u32::try_from(u64::from(cursor) * 100 / u64::from(count)).unwrap_or(u32::MAX)
}

/// Messages per second over whole elapsed seconds. Runs shorter than
/// one second count as one second.
#[must_use]
pub fn rate_per_second(messages: u32, elapsed: Duration) -> u64 {
    u64::from(messages) / elapsed.as_secs().max(1)
}
