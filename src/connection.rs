//! Mailbox connection
//!
//! [`MailboxConnection`] is the seam between the retrieval engine and the
//! mail protocol. [`ImapConnection`] implements it over `async-imap`,
//! either inside implicit TLS or on a plain TCP stream.

use crate::config::MailboxProvider;
use crate::error::{Error, Result};
use crate::folder::FolderHandle;
use async_imap::Session;
use async_imap::types::{Name, NameAttribute};
use async_trait::async_trait;
use futures::TryStreamExt;
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{debug, info};

/// Capabilities the retrieval engine needs from a mailbox session.
///
/// Implementations keep at most one folder open; opening a folder
/// while another is open is a caller error.
#[allow(clippy::missing_errors_doc)]
#[async_trait]
pub trait MailboxConnection: Send {
    /// Look a folder up by its full name. [`crate::ALL_FOLDERS`]
    /// resolves to [`FolderHandle::namespace_root`].
    async fn resolve(&mut self, name: &str) -> Result<FolderHandle>;

    /// Immediate children of `folder`, in the order the server lists
    /// them.
    async fn list_children(&mut self, folder: &FolderHandle) -> Result<Vec<FolderHandle>>;

    /// Open `folder` without write access.
    async fn open_read_only(&mut self, folder: &FolderHandle) -> Result<()>;

    /// Number of messages in the currently open `folder`.
    async fn message_count(&mut self, folder: &FolderHandle) -> Result<u32>;

    /// Raw RFC 5322 bytes of message `number` (1-based) of the open
    /// `folder`.
    async fn fetch(&mut self, folder: &FolderHandle, number: u32) -> Result<Vec<u8>>;

    /// Close the open `folder` without expunging anything.
    async fn close_folder(&mut self, folder: &FolderHandle) -> Result<()>;

    /// End the session.
    async fn close(&mut self) -> Result<()>;
}

/// Byte stream an IMAP session can run over.
pub trait ImapStream:
    futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + fmt::Debug
{
}

impl<T> ImapStream for T where
    T: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + fmt::Debug
{
}

/// An IMAP session over TLS or plain TCP.
pub type ImapSession = Session<Box<dyn ImapStream>>;

/// Build a TLS connector trusting the Mozilla root set.
fn tls_connector() -> TlsConnector {
    // Both rustls backends are compiled in; pick ring once per process.
    let _ = rustls::crypto::ring::default_provider().install_default();
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// A live IMAP session used for one retrieval run.
pub struct ImapConnection {
    session: Option<ImapSession>,
    open_count: Option<u32>,
}

impl ImapConnection {
    /// Open a fresh IMAP session and log in.
    ///
    /// Connects to `provider.host:provider.port` via TCP, performs the
    /// TLS handshake when `provider.secure` is set, and logs in.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable, the TLS handshake
    /// fails, or the credentials are refused.
    pub async fn connect(provider: &MailboxProvider, login: &str, password: &str) -> Result<Self> {
        let addr = format!("{}:{}", provider.host, provider.port);
        debug!("Connecting to IMAP server at {}", addr);

        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Connection(format!("Cannot reach {addr}: {e}")))?;

        let stream: Box<dyn ImapStream> = if provider.secure {
            let server_name = ServerName::try_from(provider.host.clone())
                .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
            let tls_stream = tls_connector()
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| Error::Tls(e.to_string()))?;
            Box::new(tls_stream.compat())
        } else {
            Box::new(tcp_stream.compat())
        };

        let client = async_imap::Client::new(stream);
        let session = client
            .login(login, password)
            .await
            .map_err(|(e, _)| Error::Connection(format!("Login failed: {e}")))?;

        info!("Connected to IMAP server {}", addr);
        Ok(Self {
            session: Some(session),
            open_count: None,
        })
    }

    fn session(&mut self) -> Result<&mut ImapSession> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::Connection("Session already closed".into()))
    }

    async fn list(&mut self, pattern: &str) -> Result<Vec<FolderHandle>> {
        let quoted = quote(pattern);
        let session = self.session()?;
        let names: Vec<Name> = session
            .list(Some(""), Some(&quoted))
            .await
            .map_err(|e| Error::Catalog(format!("LIST {pattern} failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Catalog(format!("LIST {pattern} failed: {e}")))?;

        Ok(names.iter().map(handle_from_name).collect())
    }
}

/// `async-imap` sends the LIST pattern as given; quote it so names
/// with spaces survive.
fn quote(pattern: &str) -> String {
    format!("\"{}\"", pattern.replace('\\', "\\\\").replace('"', "\\\""))
}

/// INBOX is case-insensitive; every other name is compared exactly.
fn same_folder(listed: &str, wanted: &str) -> bool {
    listed == wanted || (wanted.eq_ignore_ascii_case("INBOX") && listed.eq_ignore_ascii_case("INBOX"))
}

fn handle_from_name(name: &Name) -> FolderHandle {
    let selectable = !name
        .attributes()
        .iter()
        .any(|a| matches!(a, NameAttribute::NoSelect));
    FolderHandle::new(name.name(), name.delimiter(), selectable)
}

#[async_trait]
impl MailboxConnection for ImapConnection {
    async fn resolve(&mut self, name: &str) -> Result<FolderHandle> {
        if name == crate::config::ALL_FOLDERS {
            return Ok(FolderHandle::namespace_root());
        }
        self.list(name)
            .await?
            .into_iter()
            .find(|f| same_folder(f.name(), name))
            .ok_or_else(|| Error::Catalog(format!("Folder {name} does not exist")))
    }

    async fn list_children(&mut self, folder: &FolderHandle) -> Result<Vec<FolderHandle>> {
        let children = self.list(&folder.children_pattern()).await?;
        // Some servers answer a child pattern with the parent too.
        Ok(children
            .into_iter()
            .filter(|child| child.name() != folder.name())
            .collect())
    }

    async fn open_read_only(&mut self, folder: &FolderHandle) -> Result<()> {
        let session = self.session()?;
        let mailbox = session
            .examine(folder.name())
            .await
            .map_err(|e| Error::OpenFolder {
                folder: folder.to_string(),
                reason: e.to_string(),
            })?;
        self.open_count = Some(mailbox.exists);
        Ok(())
    }

    async fn message_count(&mut self, folder: &FolderHandle) -> Result<u32> {
        self.open_count.ok_or_else(|| Error::OpenFolder {
            folder: folder.to_string(),
            reason: "folder is not open".into(),
        })
    }

    async fn fetch(&mut self, folder: &FolderHandle, number: u32) -> Result<Vec<u8>> {
        let fetch_error = |reason: String| Error::Fetch {
            folder: folder.to_string(),
            number,
            reason,
        };

        let session = self.session()?;
        let messages: Vec<_> = session
            .fetch(number.to_string(), "BODY.PEEK[]")
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        messages
            .iter()
            .find_map(|m| m.body().map(<[u8]>::to_vec))
            .ok_or_else(|| fetch_error("no body in FETCH response".into()))
    }

    async fn close_folder(&mut self, folder: &FolderHandle) -> Result<()> {
        if self.open_count.take().is_none() {
            return Ok(());
        }
        let session = self.session()?;
        // CLOSE on an EXAMINEd mailbox never expunges.
        session.close().await.map_err(|e| Error::OpenFolder {
            folder: folder.to_string(),
            reason: format!("close failed: {e}"),
        })
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session
            .logout()
            .await
            .map_err(|e| Error::Connection(format!("Logout failed: {e}")))
    }
}
