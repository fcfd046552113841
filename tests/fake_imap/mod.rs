//! Fake IMAP server for integration testing
//!
//! An in-process server that speaks enough plain-TCP IMAP to drive
//! `ImapConnection` and `MailboxExporter` end-to-end:
//!
//! TCP -> greeting -> LOGIN -> LIST / EXAMINE / FETCH / CLOSE -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, command loop, and command journal
//! - `handlers/` -- one file per IMAP command
//! - `mailbox` -- test data model (hierarchical folders, messages)
//! - `io` -- shared write helpers

pub mod mailbox;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
