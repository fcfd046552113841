//! Mailbox exporter

use crate::config::RetrievalConfig;
use crate::connection::{ImapConnection, MailboxConnection};
use crate::error::Result;
use crate::extract::ContentExtractor;
use crate::sink::Sink;
use crate::stream::MessageStream;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// Outcome of one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub started_at: DateTime<Utc>,
    /// Messages fetched from the server.
    pub messages: u32,
    /// Messages fetched but not written.
    pub failed_messages: u32,
    /// Body parts skipped as unsupported.
    pub unsupported_parts: usize,
    pub elapsed_secs: u64,
    /// Set when the run stopped early on a fetch or folder failure.
    pub stream_failed: bool,
    /// The failure that stopped the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportSummary {
    fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            messages: 0,
            failed_messages: 0,
            unsupported_parts: 0,
            elapsed_secs: 0,
            stream_failed: false,
            error: None,
        }
    }
}

/// Exports a mailbox into a [`Sink`], one directory per message.
#[derive(Debug)]
pub struct MailboxExporter {
    config: RetrievalConfig,
}

impl MailboxExporter {
    #[must_use]
    pub const fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Connect, log in and catalogue the configured folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, login, or folder listing
    /// fails.
    pub async fn open(&self) -> Result<MessageStream<ImapConnection>> {
        let connection = ImapConnection::connect(
            &self.config.provider,
            &self.config.login,
            &self.config.password,
        )
        .await?;
        MessageStream::start(connection, &self.config).await
    }

    /// Export every message the configuration selects into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be opened, or if it cannot
    /// be closed at the end of the run. Failures while fetching are
    /// reported in the summary.
    pub async fn export<S: Sink>(&self, sink: S) -> Result<ExportSummary> {
        let stream = self.open().await?;
        export_stream(stream, &ContentExtractor::new(sink)).await
    }
}

/// Drain `stream` into `extractor`, then close it.
///
/// A message that cannot be extracted is logged and counted; the run
/// goes on. A fetch failure ends the run.
///
/// # Errors
///
/// Returns an error only if closing the stream fails.
pub async fn export_stream<C, S>(
    mut stream: MessageStream<C>,
    extractor: &ContentExtractor<S>,
) -> Result<ExportSummary>
where
    C: MailboxConnection,
    S: Sink,
{
    let mut summary = ExportSummary::begin();

    while let Some(item) = stream.next().await {
        let message = match item {
            Ok(message) => message,
            Err(e) => {
                error!("Stopping export: {}", e);
                summary.stream_failed = true;
                summary.error = Some(e.to_string());
                break;
            }
        };

        match extractor.extract(&message) {
            Ok(report) => summary.unsupported_parts += report.unsupported(),
            Err(e) => {
                warn!("{}", e);
                summary.failed_messages += 1;
            }
        }
    }

    let stats = stream.stats();
    summary.messages = stats.yielded;
    summary.elapsed_secs = stats.elapsed.as_secs();

    stream.close().await?;

    info!(
        messages = summary.messages,
        failed = summary.failed_messages,
        unsupported = summary.unsupported_parts,
        "Export finished"
    );
    Ok(summary)
}
