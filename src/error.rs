//! Error types for mailbox-export

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Folder listing failed: {0}")]
    Catalog(String),

    #[error("Could not open folder {folder}: {reason}")]
    OpenFolder { folder: String, reason: String },

    #[error("Could not fetch message {number} from {folder}: {reason}")]
    Fetch {
        folder: String,
        number: u32,
        reason: String,
    },

    #[error("Extraction failed for message {number} in {folder}: {reason}")]
    Extraction {
        folder: String,
        number: u32,
        reason: String,
    },

    #[error("No handler for {shape} content on content-type {content_type}")]
    UnsupportedContent { content_type: String, shape: String },

    #[error("Could not decode filename fragment '{fragment}': {reason}")]
    FilenameDecode { fragment: String, reason: String },

    #[error("{}", describe_close(.folder.as_deref(), .connection.as_deref()))]
    Close {
        folder: Option<Box<Error>>,
        connection: Option<Box<Error>>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

fn describe_close(folder: Option<&Error>, connection: Option<&Error>) -> String {
    match (folder, connection) {
        (Some(f), Some(c)) => format!("Close failed: {c} (folder close also failed: {f})"),
        (Some(f), None) => format!("Close failed: {f}"),
        (None, Some(c)) => format!("Close failed: {c}"),
        (None, None) => "Close failed".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
