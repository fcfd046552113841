//! In-process fake IMAP server for integration testing
//!
//! ## Connection lifecycle
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   Client sends LOGIN with username and password
//!       |
//!   Client walks the hierarchy with LIST "" "<parent>/%"
//!       |
//!   For each folder: EXAMINE, FETCH n BODY.PEEK[], ..., CLOSE
//!       |
//!   Client sends LOGOUT
//! ```
//!
//! Every command is tagged; the server echoes the tag in the final
//! OK/NO/BAD so the client can pair responses with commands. Lines
//! starting with `*` are untagged data sent before it.
//!
//! The server keeps a journal of the commands it handled so tests can
//! assert on the exact conversation, e.g. that no folder was ever
//! opened with SELECT.

use super::handlers::{
    handle_capability, handle_close, handle_examine, handle_fetch, handle_list, handle_login,
    handle_logout, handle_noop, list_pattern,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;

/// A fake IMAP server on localhost with an OS-assigned port.
pub struct FakeImapServer {
    port: u16,
    journal: Arc<Mutex<Vec<String>>>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a new fake IMAP server with the given mailbox state.
    ///
    /// Binds to `127.0.0.1:0` and spawns the accept loop. Each
    /// connection gets its own task. The server runs until the
    /// `FakeImapServer` is dropped.
    pub async fn start(mailbox: Mailbox) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let mailbox = Arc::new(mailbox);
        let journal = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let journal = journal.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _addr)) = listener.accept().await else {
                        break;
                    };
                    let mailbox = mailbox.clone();
                    let journal = journal.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, &mailbox, &journal).await;
                    });
                }
            })
        };

        Self {
            port,
            journal,
            _handle: handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Commands handled so far, across all connections, as
    /// `"VERB argument"` strings (e.g. `"EXAMINE INBOX"`, `"FETCH 3"`).
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Journal entries starting with `verb`.
    pub fn commands(&self, verb: &str) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .collect()
    }
}

/// Greet the client, then run the command loop.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    mailbox: &Mailbox,
    journal: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream);

    // RFC 3501 Section 7.1.1: Server greeting
    if write_line(&mut reader, "* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    handle_imap_session(reader, mailbox, journal).await;
}

/// Extract the folder name from a parsed `imap_types::Mailbox`.
fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Run the IMAP command loop.
///
/// Each line is parsed with `imap-codec`'s `CommandCodec` into a typed
/// `Command` and dispatched on its `CommandBody`. Commands the fake
/// does not implement (SELECT, STORE, EXPUNGE, ...) get a BAD so a
/// client that sends them fails loudly.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut reader: BufReader<S>,
    mailbox: &Mailbox,
    journal: &Mutex<Vec<String>>,
) {
    let mut opened_folder: Option<String> = None;
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = trimmed.split_whitespace().next().unwrap_or("*");
            let resp = format!("{tag} BAD Parse error\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();
        let record = |entry: String| journal.lock().unwrap().push(entry);

        match command.body {
            CommandBody::Capability => {
                record("CAPABILITY".into());
                handle_capability(tag, &mut reader).await;
            }
            CommandBody::Noop => {
                record("NOOP".into());
                handle_noop(tag, &mut reader).await;
            }
            CommandBody::Login { .. } => {
                record("LOGIN".into());
                if !handle_login(tag, &mut reader).await {
                    break;
                }
            }
            CommandBody::List { .. } => {
                let pattern = list_pattern(trimmed);
                record(format!("LIST {pattern}"));
                handle_list(tag, &pattern, mailbox, &mut reader).await;
            }
            CommandBody::Examine { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                record(format!("EXAMINE {name}"));
                opened_folder = handle_examine(tag, &name, mailbox, &mut reader).await;
            }
            CommandBody::Fetch {
                ref sequence_set,
                uid: false,
                ..
            } => {
                let entry = trimmed
                    .split_whitespace()
                    .nth(2)
                    .unwrap_or_default()
                    .to_string();
                record(format!("FETCH {entry}"));
                handle_fetch(
                    tag,
                    sequence_set,
                    mailbox,
                    opened_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Close => {
                record("CLOSE".into());
                if handle_close(tag, opened_folder.as_deref(), &mut reader).await {
                    opened_folder = None;
                }
            }
            CommandBody::Logout => {
                record("LOGOUT".into());
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                let verb = trimmed.split_whitespace().nth(1).unwrap_or_default();
                record(verb.to_ascii_uppercase());
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}
