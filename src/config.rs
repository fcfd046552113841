//! Retrieval configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::sync::Arc;

/// Folder name used when no root folder is configured.
pub const DEFAULT_ROOT_FOLDER: &str = "INBOX";

/// Root folder name selecting the whole mailbox hierarchy.
pub const ALL_FOLDERS: &str = "*";

/// Which IMAP server to talk to, and whether to wrap the connection
/// in TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxProvider {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl MailboxProvider {
    /// Gmail over implicit TLS.
    #[must_use]
    pub fn gmail() -> Self {
        Self::custom("imap.gmail.com", 993, true)
    }

    /// A local Proton Bridge listening on its default plain port.
    #[must_use]
    pub fn proton_bridge() -> Self {
        Self::custom("127.0.0.1", 1143, false)
    }

    #[must_use]
    pub fn custom(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }
}

/// Strategy deciding the 1-based message number at which a folder's
/// iteration begins. It receives the folder's full hierarchical name.
#[derive(Clone)]
pub struct StartingPoint(Arc<dyn Fn(&str) -> u32 + Send + Sync>);

impl StartingPoint {
    pub fn new(f: impl Fn(&str) -> u32 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Start every folder at the same message number.
    #[must_use]
    pub fn constant(start: u32) -> Self {
        Self::new(move |_| start)
    }

    #[must_use]
    pub fn start_for(&self, folder: &str) -> u32 {
        (self.0)(folder)
    }
}

impl Default for StartingPoint {
    fn default() -> Self {
        Self::constant(1)
    }
}

impl fmt::Debug for StartingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StartingPoint(..)")
    }
}

/// Order in which the folder catalog hands out folders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraversalOrder {
    /// A folder, then each of its children in listing order.
    #[default]
    PreOrder,
    /// Entries pushed on a stack while descending and popped
    /// afterwards: the last-listed, deepest folder comes first. Kept
    /// for parity with output trees produced by older exports.
    Stack,
}

/// Everything one retrieval session needs.
#[derive(Clone)]
pub struct RetrievalConfig {
    pub login: String,
    pub password: String,
    pub provider: MailboxProvider,
    pub root_folder: String,
    pub max_messages: Option<u32>,
    pub starting_point: StartingPoint,
    pub traversal: TraversalOrder,
}

impl RetrievalConfig {
    #[must_use]
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }
}

impl fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("provider", &self.provider)
            .field("root_folder", &self.root_folder)
            .field("max_messages", &self.max_messages)
            .field("traversal", &self.traversal)
            .finish_non_exhaustive()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for [`RetrievalConfig`].
#[derive(Default)]
pub struct RetrievalConfigBuilder {
    login: Option<String>,
    password: Option<String>,
    provider: Option<MailboxProvider>,
    root_folder: Option<String>,
    max_messages: Option<u32>,
    starting_point: Option<StartingPoint>,
    traversal: TraversalOrder,
}

impl RetrievalConfigBuilder {
    /// Builder seeded from environment variables, reading a `.env` file
    /// first if present. Every variable is optional:
    /// - `IMAP_USERNAME`, `IMAP_PASSWORD`
    /// - `IMAP_HOST` (default: `imap.gmail.com`)
    /// - `IMAP_PORT` (default: `993`)
    /// - `IMAP_SECURE` (default: `true`)
    /// - `IMAP_FOLDER` (default: `INBOX`)
    /// - `IMAP_MAX_MESSAGES` (default: unbounded)
    ///
    /// Values set on the builder afterwards take precedence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gmail = MailboxProvider::gmail();
        let provider = MailboxProvider {
            host: var("IMAP_HOST").unwrap_or(gmail.host),
            port: match var("IMAP_PORT") {
                Some(port) => port
                    .parse()
                    .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
                None => gmail.port,
            },
            secure: match var("IMAP_SECURE") {
                Some(secure) => parse_flag(&secure)
                    .ok_or_else(|| Error::Config(format!("Invalid IMAP_SECURE: {secure}")))?,
                None => gmail.secure,
            },
        };

        let mut builder = Self::default().provider(provider);
        builder.login = var("IMAP_USERNAME");
        builder.password = var("IMAP_PASSWORD");
        builder.root_folder = var("IMAP_FOLDER");
        if let Some(max) = var("IMAP_MAX_MESSAGES") {
            builder = builder.max_messages(
                max.parse()
                    .map_err(|e| Error::Config(format!("Invalid IMAP_MAX_MESSAGES: {e}")))?,
            );
        }
        Ok(builder)
    }

    #[must_use]
    pub const fn has_login(&self) -> bool {
        self.login.is_some()
    }

    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// The provider [`build`](Self::build) would use.
    #[must_use]
    pub fn current_provider(&self) -> MailboxProvider {
        self.provider.clone().unwrap_or_else(MailboxProvider::gmail)
    }

    #[must_use]
    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: MailboxProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Folder the traversal starts from. Empty means `INBOX`;
    /// [`ALL_FOLDERS`] walks the whole hierarchy.
    #[must_use]
    pub fn root_folder(mut self, folder: impl Into<String>) -> Self {
        self.root_folder = Some(folder.into());
        self
    }

    #[must_use]
    pub const fn max_messages(mut self, max: u32) -> Self {
        self.max_messages = Some(max);
        self
    }

    #[must_use]
    pub fn starting_point(mut self, starting_point: StartingPoint) -> Self {
        self.starting_point = Some(starting_point);
        self
    }

    #[must_use]
    pub const fn traversal(mut self, order: TraversalOrder) -> Self {
        self.traversal = order;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the login or password is missing.
    pub fn build(self) -> Result<RetrievalConfig> {
        let login = self
            .login
            .ok_or_else(|| Error::Config("Login should not be missing".into()))?;
        let password = self
            .password
            .ok_or_else(|| Error::Config("Password should not be missing".into()))?;

        let root_folder = match self.root_folder {
            Some(folder) if !folder.is_empty() => folder,
            _ => DEFAULT_ROOT_FOLDER.to_string(),
        };

        Ok(RetrievalConfig {
            login,
            password,
            provider: self.provider.unwrap_or_else(MailboxProvider::gmail),
            root_folder,
            max_messages: self.max_messages,
            starting_point: self.starting_point.unwrap_or_default(),
            traversal: self.traversal,
        })
    }
}
