//! Test data model for the fake IMAP server
//!
//! Folders are stored flat under their full hierarchical name, with
//! `/` as the hierarchy delimiter:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .message(raw_rfc5322_bytes)
//!     .container("Work")
//!     .folder("Work/Projects")
//!         .message(raw_rfc5322_bytes)
//!     .build();
//! ```
//!
//! Folders are listed in insertion order.

pub const DELIMITER: char = '/';

#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
}

impl Mailbox {
    /// Look up a folder by name. INBOX matches case-insensitively, as
    /// RFC 3501 requires.
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| same_name(&f.name, name))
    }

    /// Folders whose name matches a LIST pattern, where `*` matches
    /// anything and `%` anything but the delimiter.
    pub fn matching(&self, pattern: &str) -> Vec<&Folder> {
        self.folders
            .iter()
            .filter(|f| same_name(&f.name, pattern) || wildcard_match(pattern, &f.name))
            .collect()
    }

    /// Whether any folder sits directly or indirectly below `name`.
    pub fn has_children(&self, name: &str) -> bool {
        let prefix = format!("{name}{DELIMITER}");
        self.folders.iter().any(|f| f.name.starts_with(&prefix))
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a == b || (a.eq_ignore_ascii_case("INBOX") && b.eq_ignore_ascii_case("INBOX"))
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    match pattern.chars().next() {
        None => name.is_empty(),
        Some('*') => (0..=name.len())
            .filter(|&i| name.is_char_boundary(i))
            .any(|i| wildcard_match(&pattern[1..], &name[i..])),
        Some('%') => {
            let stop = name.find(DELIMITER).unwrap_or(name.len());
            (0..=stop)
                .filter(|&i| name.is_char_boundary(i))
                .any(|i| wildcard_match(&pattern[1..], &name[i..]))
        }
        Some(c) => name
            .strip_prefix(c)
            .is_some_and(|tail| wildcard_match(&pattern[c.len_utf8()..], tail)),
    }
}

/// A single IMAP folder.
///
/// - `selectable`: `false` for pure containers, listed with
///   `\Noselect`. EXAMINE on them fails.
/// - `messages`: raw RFC 5322 messages; message `n` has sequence
///   number `n + 1`.
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub selectable: bool,
    pub messages: Vec<Vec<u8>>,
}

/// Builder for constructing a `Mailbox` step by step.
pub struct MailboxBuilder {
    folders: Vec<Folder>,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
        }
    }

    /// Add a selectable folder. Subsequent `.message()` calls add to it.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            selectable: true,
            messages: Vec::new(),
        });
        self
    }

    /// Add a `\Noselect` folder that only holds other folders.
    pub fn container(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            selectable: false,
            messages: Vec::new(),
        });
        self
    }

    /// Add a message to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn message(mut self, raw: &[u8]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .message()")
            .messages
            .push(raw.to_vec());
        self
    }

    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(mailbox: &Mailbox, pattern: &str) -> Vec<String> {
        mailbox
            .matching(pattern)
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    fn sample() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .container("Work")
            .folder("Work/Projects")
            .folder("Work/Projects/Old")
            .folder("Sent")
            .build()
    }

    #[test]
    fn percent_stops_at_delimiter() {
        let mailbox = sample();
        assert_eq!(names(&mailbox, "%"), vec!["INBOX", "Work", "Sent"]);
        assert_eq!(names(&mailbox, "Work/%"), vec!["Work/Projects"]);
    }

    #[test]
    fn star_crosses_delimiter() {
        let mailbox = sample();
        assert_eq!(names(&mailbox, "*").len(), 5);
        assert_eq!(
            names(&mailbox, "Work/*"),
            vec!["Work/Projects", "Work/Projects/Old"]
        );
    }

    #[test]
    fn exact_name_and_inbox_case() {
        let mailbox = sample();
        assert_eq!(names(&mailbox, "Sent"), vec!["Sent"]);
        assert_eq!(names(&mailbox, "inbox"), vec!["INBOX"]);
        assert!(names(&mailbox, "Missing").is_empty());
    }

    #[test]
    fn children_are_detected() {
        let mailbox = sample();
        assert!(mailbox.has_children("Work"));
        assert!(!mailbox.has_children("Sent"));
    }
}
