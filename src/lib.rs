//! Mailbox export library
//!
//! Walks the folder hierarchy of an IMAP mailbox, streams every message
//! of every selectable folder in a bounded, read-only session, and
//! writes each one to disk as a directory of headers, text bodies and
//! attachments.
//!
//! ```no_run
//! # async fn run() -> mailbox_export::Result<()> {
//! use mailbox_export::{FsSink, MailboxExporter, RetrievalConfig};
//!
//! let config = RetrievalConfig::builder()
//!     .login("me@gmail.com")
//!     .password("app-password")
//!     .max_messages(100)
//!     .build()?;
//! let summary = MailboxExporter::new(config)
//!     .export(FsSink::new("/tmp/emails"))
//!     .await?;
//! println!("{} messages", summary.messages);
//! # Ok(())
//! # }
//! ```
//!
//! The pieces are usable on their own: [`MessageStream`] yields raw
//! messages over any [`MailboxConnection`], and [`ContentExtractor`]
//! writes one message into any [`Sink`].

mod catalog;
mod client;
mod config;
mod connection;
mod error;
mod extract;
mod filename;
mod folder;
mod progress;
mod sink;
mod stream;

pub use catalog::FolderCatalog;
pub use client::{ExportSummary, MailboxExporter, export_stream};
pub use config::{
    ALL_FOLDERS, DEFAULT_ROOT_FOLDER, MailboxProvider, RetrievalConfig, RetrievalConfigBuilder,
    StartingPoint, TraversalOrder,
};
pub use connection::{ImapConnection, MailboxConnection};
pub use error::{Error, Result};
pub use extract::{ContentExtractor, ExtractionReport, PartContent};
pub use filename::{
    CALENDAR_FILE_NAME, FileName, UNNAMED_FILE_NAME, decode_encoded_word,
    file_name_from_content_type,
};
pub use folder::{FolderEntry, FolderHandle, sanitize_component};
pub use progress::{LogProgress, Progress};
pub use sink::{FsSink, Sink};
pub use stream::{FetchedMessage, MessageStream, StreamStats};
