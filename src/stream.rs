//! Message stream
//!
//! A single-pass, pull-based sequence over every message of the
//! catalogued folders. One folder is open at a time; the run stops at
//! the configured message budget or at the first fetch failure.

use crate::catalog::FolderCatalog;
use crate::config::RetrievalConfig;
use crate::connection::MailboxConnection;
use crate::error::{Error, Result};
use crate::folder::{FolderEntry, FolderHandle};
use crate::progress::{LogProgress, Progress, percent_done, rate_per_second};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Progress notes are emitted when the cursor hits a multiple of this.
const PROGRESS_EVERY: u32 = 10;

/// One message as fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub folder: FolderHandle,
    /// 1-based sequence number within `folder`.
    pub number: u32,
    /// Complete RFC 5322 message.
    pub raw: Vec<u8>,
}

/// Counters describing a stream so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub yielded: u32,
    pub elapsed: Duration,
    pub failed: bool,
    pub finished: bool,
}

#[derive(Debug)]
struct OpenFolder {
    folder: FolderHandle,
    message_count: u32,
    cursor: u32,
}

/// Lazily fetches messages folder by folder.
///
/// Call [`MessageStream::close`] when done, whether or not the stream
/// was consumed to the end. Dropping the stream cannot log out from an
/// async session: it only warns, and the server is left to time the
/// session out. [`MailboxExporter::export`](crate::MailboxExporter::export)
/// and [`export_stream`](crate::export_stream) always call `close()`.
pub struct MessageStream<C: MailboxConnection> {
    connection: C,
    catalog: FolderCatalog,
    current: Option<OpenFolder>,
    max_messages: Option<u32>,
    yielded: u32,
    failed: bool,
    finished: bool,
    closed: bool,
    started: Instant,
    progress: Box<dyn Progress>,
}

impl<C: MailboxConnection> MessageStream<C> {
    /// Build the folder catalog for `config` and return a stream over
    /// it. The connection is closed again if the catalog cannot be
    /// built; otherwise it belongs to the stream until
    /// [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns an error if the root folder cannot be resolved or the
    /// hierarchy cannot be listed.
    pub async fn start(mut connection: C, config: &RetrievalConfig) -> Result<Self> {
        let started = Instant::now();

        let catalog = match Self::catalog_for(&mut connection, config).await {
            Ok(catalog) => catalog,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    warn!("Closing connection after failed catalog build: {}", close_err);
                }
                return Err(e);
            }
        };
        info!(
            "Catalogued {} folders in {}s",
            catalog.len(),
            started.elapsed().as_secs()
        );

        let mut stream = Self::new(connection, catalog, config.max_messages);
        stream.started = started;
        Ok(stream)
    }

    async fn catalog_for(connection: &mut C, config: &RetrievalConfig) -> Result<FolderCatalog> {
        let root = connection.resolve(&config.root_folder).await?;
        FolderCatalog::build(connection, &root, &config.starting_point, config.traversal).await
    }

    /// Stream over an already built catalog.
    pub fn new(connection: C, catalog: FolderCatalog, max_messages: Option<u32>) -> Self {
        Self {
            connection,
            catalog,
            current: None,
            max_messages,
            yielded: 0,
            failed: false,
            finished: false,
            closed: false,
            started: Instant::now(),
            progress: Box::new(LogProgress),
        }
    }

    /// Replace the default `tracing` progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    #[must_use]
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            yielded: self.yielded,
            elapsed: self.started.elapsed(),
            failed: self.failed,
            finished: self.finished,
        }
    }

    /// Produce the next message.
    ///
    /// Returns `None` once the catalog is exhausted, the message budget
    /// is spent, or after a failure has been returned.
    pub async fn next(&mut self) -> Option<Result<FetchedMessage>> {
        loop {
            if self.finished {
                return None;
            }
            if self.failed || self.budget_spent() {
                self.finish();
                return None;
            }

            let Some(open) = self.current.as_mut() else {
                let Some(entry) = self.catalog.pop() else {
                    self.finish();
                    return None;
                };
                if let Err(e) = self.open(entry).await {
                    self.failed = true;
                    return Some(Err(e));
                }
                continue;
            };

            if open.cursor > open.message_count {
                if let Err(e) = self.close_current().await {
                    self.failed = true;
                    return Some(Err(e));
                }
                continue;
            }

            let number = open.cursor;
            if number % PROGRESS_EVERY == 0 {
                self.progress
                    .advanced(open.folder.name(), percent_done(number, open.message_count));
            }

            match self.connection.fetch(&open.folder, number).await {
                Ok(raw) => {
                    open.cursor += 1;
                    self.yielded += 1;
                    return Some(Ok(FetchedMessage {
                        folder: open.folder.clone(),
                        number,
                        raw,
                    }));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(as_fetch_error(e, &open.folder, number)));
                }
            }
        }
    }

    fn budget_spent(&self) -> bool {
        self.max_messages.is_some_and(|max| self.yielded >= max)
    }

    async fn open(&mut self, entry: FolderEntry) -> Result<()> {
        let FolderEntry { folder, start_at } = entry;
        self.connection.open_read_only(&folder).await?;
        // Registered before counting so close() still releases it.
        self.current = Some(OpenFolder {
            folder,
            message_count: 0,
            cursor: start_at,
        });

        let Some(open) = self.current.as_mut() else {
            return Ok(());
        };
        open.message_count = self.connection.message_count(&open.folder).await?;
        if open.cursor > open.message_count {
            debug!(
                "Starting point {} is past the end of {} ({} messages)",
                open.cursor, open.folder, open.message_count
            );
        }
        self.progress
            .folder_opened(open.folder.name(), open.message_count);
        Ok(())
    }

    async fn close_current(&mut self) -> Result<()> {
        let Some(open) = self.current.take() else {
            return Ok(());
        };
        self.connection.close_folder(&open.folder).await
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let elapsed = self.started.elapsed();
        self.progress
            .finished(self.yielded, elapsed, rate_per_second(self.yielded, elapsed));
    }

    /// Close the open folder, if any, then the connection.
    ///
    /// Both are attempted even when the first fails; every failure is
    /// kept in the returned [`Error::Close`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Close`] if either close fails.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;

        let folder_err = self.close_current().await.err();
        let connection_err = self.connection.close().await.err();

        match (folder_err, connection_err) {
            (None, None) => Ok(()),
            (folder, connection) => Err(Error::Close {
                folder: folder.map(Box::new),
                connection: connection.map(Box::new),
            }),
        }
    }
}

impl<C: MailboxConnection> Drop for MessageStream<C> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("MessageStream dropped without close(); the session was left open");
        }
    }
}

fn as_fetch_error(e: Error, folder: &FolderHandle, number: u32) -> Error {
    match e {
        Error::Fetch { .. } => e,
        other => Error::Fetch {
            folder: folder.to_string(),
            number,
            reason: other.to_string(),
        },
    }
}
