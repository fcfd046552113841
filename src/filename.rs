//! Attachment file names from `Content-Type` headers
//!
//! Pure string handling: no I/O, no logging. Problems met along the way
//! are returned next to the name so the caller can report them.

use crate::error::Error;
use encoding_rs::Encoding;
use regex::Regex;
use std::sync::LazyLock;

/// Name given to calendar invites that carry no `name=` parameter.
pub const CALENDAR_FILE_NAME: &str = "invite.ics";

/// Name used when nothing in the header yields a file name.
pub const UNNAMED_FILE_NAME: &str = "invalidFileName";

static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").expect("valid regex")
});

/// A derived file name and whatever went wrong deriving it.
#[derive(Debug)]
pub struct FileName {
    pub name: String,
    /// Set when neither `name=` nor the calendar default applied.
    pub fallback: bool,
    /// Encoded fragments that could not be decoded and were skipped.
    pub skipped: Vec<Error>,
}

impl FileName {
    fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fallback: false,
            skipped: Vec::new(),
        }
    }
}

/// Derive an attachment's file name from its `Content-Type` header
/// value.
///
/// In order of preference:
/// 1. a quoted `name="…"` holding RFC 2047 Q-encoded words: each
///    whitespace-separated word is decoded and the results joined;
/// 2. any other `name=` value, up to the next `;`, minus one pair of
///    surrounding quotes;
/// 3. [`CALENDAR_FILE_NAME`] for `text/calendar`;
/// 4. [`UNNAMED_FILE_NAME`].
#[must_use]
pub fn file_name_from_content_type(content_type: &str) -> FileName {
    let lower = content_type.to_ascii_lowercase();

    if let Some(at) = lower.find("name=") {
        let value = &content_type[at + "name=".len()..];

        if value.starts_with('"') && lower.contains("?q?") {
            let quoted = value[1..].split('"').next().unwrap_or_default();
            return decode_words(quoted);
        }

        let plain = value.split(';').next().unwrap_or_default().trim();
        let plain = plain.strip_prefix('"').unwrap_or(plain);
        let plain = plain.strip_suffix('"').unwrap_or(plain);
        return FileName::plain(plain);
    }

    if lower.contains("text/calendar") {
        return FileName::plain(CALENDAR_FILE_NAME);
    }

    FileName {
        name: UNNAMED_FILE_NAME.to_string(),
        fallback: true,
        skipped: Vec::new(),
    }
}

fn decode_words(quoted: &str) -> FileName {
    let mut name = String::new();
    let mut skipped = Vec::new();
    for word in quoted.split_whitespace() {
        match decode_encoded_word(word) {
            Ok(decoded) => name.push_str(&decoded),
            Err(e) => skipped.push(e),
        }
    }
    FileName {
        name,
        fallback: false,
        skipped,
    }
}

/// Decode one RFC 2047 encoded word, `=?charset?Q?text?=`.
///
/// `B` (base64) words are refused; only the Q form is expected inside
/// `name=` parameters.
///
/// # Errors
///
/// Returns [`Error::FilenameDecode`] for malformed words, unknown
/// charsets and bytes invalid in the charset.
pub fn decode_encoded_word(word: &str) -> Result<String, Error> {
    let fail = |reason: &str| Error::FilenameDecode {
        fragment: word.to_string(),
        reason: reason.to_string(),
    };

    let captures = ENCODED_WORD
        .captures(word)
        .ok_or_else(|| fail("not an encoded word"))?;
    let charset = captures.get(1).map_or("", |m| m.as_str());
    let encoding = captures.get(2).map_or("", |m| m.as_str());
    let text = captures.get(3).map_or("", |m| m.as_str());

    if !encoding.eq_ignore_ascii_case("q") {
        return Err(fail(&format!("unsupported encoding '{encoding}'")));
    }

    let bytes = q_decode(text.as_bytes()).map_err(|reason| fail(&reason))?;

    // RFC 2231 allows a language suffix: charset*language.
    let label = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label_no_replacement(label.as_bytes())
        .ok_or_else(|| fail(&format!("unknown charset '{charset}'")))?;
    let (decoded, had_errors) = encoding.decode_without_bom_handling(&bytes);
    if had_errors {
        return Err(fail(&format!("malformed {charset} text")));
    }
    Ok(decoded.into_owned())
}

/// Undo the Q transfer encoding: `_` is a space, `=XX` a hex octet.
fn q_decode(text: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some((&b, tail)) = rest.split_first() {
        match b {
            b'_' => {
                out.push(b' ');
                rest = tail;
            }
            b'=' => {
                let hex = tail
                    .get(..2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| "truncated or invalid '=' escape".to_string())?;
                out.push(hex);
                rest = &tail[2..];
            }
            _ => {
                out.push(b);
                rest = tail;
            }
        }
    }
    Ok(out)
}
