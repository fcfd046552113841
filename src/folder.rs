//! IMAP folder types
//!
//! A [`FolderHandle`] names one folder of the remote hierarchy together
//! with the separator the server uses between levels. The catalog pairs
//! each handle with the message number its iteration starts at.

use std::fmt;
use std::path::PathBuf;

/// A folder as reported by the server's `LIST` response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderHandle {
    name: String,
    delimiter: Option<String>,
    selectable: bool,
}

impl FolderHandle {
    #[must_use]
    pub fn new(name: impl Into<String>, delimiter: Option<&str>, selectable: bool) -> Self {
        Self {
            name: name.into(),
            delimiter: delimiter.map(ToString::to_string),
            selectable,
        }
    }

    /// The unnamed top of the hierarchy. It holds folders but no
    /// messages.
    #[must_use]
    pub const fn namespace_root() -> Self {
        Self {
            name: String::new(),
            delimiter: None,
            selectable: false,
        }
    }

    /// Full hierarchical name, e.g. `INBOX/Archive`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// Whether the folder can be opened. `\Noselect` folders only
    /// hold other folders.
    #[must_use]
    pub const fn is_selectable(&self) -> bool {
        self.selectable
    }

    #[must_use]
    pub fn is_namespace_root(&self) -> bool {
        self.name.is_empty()
    }

    /// `LIST` pattern matching the immediate children of this folder.
    #[must_use]
    pub fn children_pattern(&self) -> String {
        if self.is_namespace_root() {
            return "%".to_string();
        }
        match self.delimiter() {
            Some(d) => format!("{}{d}%", self.name),
            None => format!("{}/%", self.name),
        }
    }

    /// Relative directory for this folder's messages: one path level
    /// per hierarchy level, each made safe for the local filesystem.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        let levels: Vec<&str> = match self.delimiter() {
            Some(d) if !d.is_empty() => self.name.split(d).collect(),
            _ => vec![self.name.as_str()],
        };
        levels
            .into_iter()
            .filter(|level| !level.is_empty())
            .map(sanitize_component)
            .collect()
    }
}

impl fmt::Display for FolderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Replace anything that would escape or split a single path level.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// One catalog work item: a folder and the message number at which
/// iteration over it begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub folder: FolderHandle,
    pub start_at: u32,
}
