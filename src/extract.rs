//! Content extraction
//!
//! Turns one fetched message into a directory of files mirroring its
//! MIME structure:
//!
//! ```text
//! message-12/
//!   headers.txt
//!   inline.txt            single-part text messages
//!   multipart/
//!     part-0.txt
//!     part-1.html
//!     part-2/             nested container
//!       part-0.txt
//!     report.pdf          attachment, named from its Content-Type
//! ```

use crate::error::{Error, Result};
use crate::filename::{FileName, file_name_from_content_type};
use crate::folder::sanitize_component;
use crate::sink::Sink;
use crate::stream::FetchedMessage;
use mailparse::ParsedMail;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const HEADERS_FILE: &str = "headers.txt";
pub const INLINE_FILE: &str = "inline.txt";
pub const MULTIPART_DIR: &str = "multipart";

/// What one body part holds, decided once from its declared type and
/// its actual shape.
#[derive(Debug)]
pub enum PartContent<'a> {
    PlainText(String),
    Html(String),
    NestedMultipart(&'a [ParsedMail<'a>]),
    OpaqueStream(Vec<u8>),
    PlainString(String),
    Unsupported { shape: String },
}

impl<'a> PartContent<'a> {
    /// Classify a part of a multipart container.
    #[must_use]
    pub fn of_part(part: &'a ParsedMail<'a>) -> Self {
        let mimetype = part.ctype.mimetype.to_ascii_lowercase();

        if mimetype.starts_with("text/plain") {
            return text_or_unsupported(part, Self::PlainText);
        }
        if mimetype.starts_with("text/html") {
            return text_or_unsupported(part, Self::Html);
        }
        if !part.subparts.is_empty() || mimetype.starts_with("multipart/") {
            return Self::NestedMultipart(&part.subparts);
        }
        if mimetype.starts_with("message/") {
            return Self::Unsupported {
                shape: "embedded message".into(),
            };
        }
        if mimetype.starts_with("text/") {
            return text_or_unsupported(part, Self::PlainString);
        }
        match part.get_body_raw() {
            Ok(bytes) => Self::OpaqueStream(bytes),
            Err(e) => Self::Unsupported {
                shape: format!("undecodable body ({e})"),
            },
        }
    }

    /// Classify a whole message: a text body or a container.
    #[must_use]
    pub fn of_message(mail: &'a ParsedMail<'a>) -> Self {
        let mimetype = mail.ctype.mimetype.to_ascii_lowercase();
        if !mail.subparts.is_empty() || mimetype.starts_with("multipart/") {
            return Self::NestedMultipart(&mail.subparts);
        }
        if mimetype.starts_with("text/") {
            return text_or_unsupported(mail, Self::PlainText);
        }
        Self::Unsupported {
            shape: "non-text single part".into(),
        }
    }
}

fn text_or_unsupported<'a>(
    part: &ParsedMail<'_>,
    wrap: impl FnOnce(String) -> PartContent<'a>,
) -> PartContent<'a> {
    match part.get_body() {
        Ok(text) => wrap(text),
        Err(e) => PartContent::Unsupported {
            shape: format!("undecodable text ({e})"),
        },
    }
}

/// Outcome of extracting one message.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Files written, relative to the sink root.
    pub files: Vec<PathBuf>,
    /// Parts that were skipped or only partly handled.
    pub problems: Vec<Error>,
}

impl ExtractionReport {
    /// Number of parts skipped as unsupported.
    #[must_use]
    pub fn unsupported(&self) -> usize {
        self.problems
            .iter()
            .filter(|p| matches!(p, Error::UnsupportedContent { .. }))
            .count()
    }
}

/// Writes messages into a [`Sink`].
#[derive(Debug, Clone)]
pub struct ContentExtractor<S> {
    sink: S,
}

impl<S: Sink> ContentExtractor<S> {
    #[must_use]
    pub const fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Directory a message is written to, relative to the sink root.
    #[must_use]
    pub fn message_dir(message: &FetchedMessage) -> PathBuf {
        message
            .folder
            .local_path()
            .join(format!("message-{}", message.number))
    }

    /// Write the headers and content of `message`.
    ///
    /// Unsupported parts are recorded in the report and skipped. An
    /// `Err` means the message could not be parsed or a file could not
    /// be written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extraction`] for unparseable messages and write
    /// failures.
    pub fn extract(&self, message: &FetchedMessage) -> Result<ExtractionReport> {
        let extraction_error = |reason: String| Error::Extraction {
            folder: message.folder.to_string(),
            number: message.number,
            reason,
        };

        let mail = mailparse::parse_mail(&message.raw)
            .map_err(|e| extraction_error(format!("unparseable message: {e}")))?;

        let dir = Self::message_dir(message);
        let mut report = ExtractionReport::default();

        self.write_headers(&dir, &mail, &mut report)
            .map_err(|e| extraction_error(e.to_string()))?;

        match PartContent::of_message(&mail) {
            PartContent::NestedMultipart(parts) => {
                self.extract_parts(&dir.join(MULTIPART_DIR), parts, &mut report)
            }
            PartContent::PlainText(text) => {
                self.write_text(&dir.join(INLINE_FILE), &text, &mut report)
            }
            PartContent::Unsupported { shape } => {
                report.problems.push(Error::UnsupportedContent {
                    content_type: mail.ctype.mimetype.clone(),
                    shape,
                });
                Ok(())
            }
            // of_message only yields the three shapes above.
            _ => Ok(()),
        }
        .map_err(|e| extraction_error(e.to_string()))?;

        for problem in &report.problems {
            warn!(
                folder = %message.folder,
                number = message.number,
                "Message {} in {}: {}",
                message.number,
                message.folder,
                problem
            );
        }
        Ok(report)
    }

    fn write_headers(
        &self,
        dir: &Path,
        mail: &ParsedMail<'_>,
        report: &mut ExtractionReport,
    ) -> Result<()> {
        let headers: BTreeSet<String> = mail
            .headers
            .iter()
            .map(|h| format!("{}:{}", h.get_key(), h.get_value()))
            .collect();
        let lines: Vec<String> = headers.into_iter().collect();
        let path = dir.join(HEADERS_FILE);
        self.sink.write_lines(&path, &lines)?;
        report.files.push(path);
        Ok(())
    }

    /// Write every part of a multipart container into `dir`, recursing
    /// into nested containers.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails to write.
    pub fn extract_parts(
        &self,
        dir: &Path,
        parts: &[ParsedMail<'_>],
        report: &mut ExtractionReport,
    ) -> Result<()> {
        self.sink.make_directory(dir)?;
        let mut taken = HashSet::new();

        for (i, part) in parts.iter().enumerate() {
            match PartContent::of_part(part) {
                PartContent::PlainText(text) => {
                    self.write_text(&dir.join(format!("part-{i}.txt")), &text, report)?;
                }
                PartContent::Html(html) => {
                    self.write_text(&dir.join(format!("part-{i}.html")), &html, report)?;
                }
                PartContent::NestedMultipart(subparts) => {
                    self.extract_parts(&dir.join(format!("part-{i}")), subparts, report)?;
                }
                PartContent::OpaqueStream(bytes) => {
                    let name = attachment_name(part, report);
                    let path = dir.join(unique_name(i, name, &mut taken));
                    self.sink.copy_stream(&path, &mut bytes.as_slice())?;
                    report.files.push(path);
                }
                PartContent::PlainString(text) => {
                    let name = attachment_name(part, report);
                    let path = dir.join(unique_name(i, name, &mut taken));
                    self.write_text(&path, &text, report)?;
                }
                PartContent::Unsupported { shape } => {
                    report.problems.push(Error::UnsupportedContent {
                        content_type: content_type_header(part),
                        shape,
                    });
                }
            }
        }
        Ok(())
    }

    fn write_text(&self, path: &Path, text: &str, report: &mut ExtractionReport) -> Result<()> {
        self.sink.write_text(path, text)?;
        report.files.push(path.to_path_buf());
        Ok(())
    }
}

/// Raw `Content-Type` header of a part, encoded words and folding
/// intact. Falls back to the parsed MIME type.
fn content_type_header(part: &ParsedMail<'_>) -> String {
    part.headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case("Content-Type"))
        .map_or_else(
            || part.ctype.mimetype.clone(),
            |h| String::from_utf8_lossy(h.get_value_raw()).into_owned(),
        )
}

/// File name for an attachment part, safe to join onto its directory.
fn attachment_name(part: &ParsedMail<'_>, report: &mut ExtractionReport) -> String {
    let FileName {
        mut name,
        fallback,
        skipped,
    } = file_name_from_content_type(&content_type_header(part));
    report.problems.extend(skipped);

    if fallback {
        let disposition = part.get_content_disposition();
        if let Some(filename) = disposition.params.get("filename") {
            name.clone_from(filename);
        } else {
            warn!(
                "Could not derive a file name from '{}'",
                content_type_header(part)
            );
        }
    }
    sanitize_component(&name)
}

/// `name`, or `part-<i>-name` when an earlier sibling already took it.
fn unique_name(i: usize, name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let renamed = format!("part-{i}-{name}");
    warn!("Attachment name '{}' already used, writing '{}'", name, renamed);
    taken.insert(renamed.clone());
    renamed
}
