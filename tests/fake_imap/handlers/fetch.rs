//! FETCH command handler, by sequence number.
//!
//! Message bodies travel as counted literals:
//!
//! ```text
//! * <seq> FETCH (BODY[] {<length>}
//! <exactly length bytes of raw RFC 5322 message>
//! )
//! ```
//!
//! `BODY.PEEK[]` is answered as `BODY[]` and never sets `\Seen`.

use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Sequence numbers named in a `SequenceSet`. Ranges are expanded
/// against `exists`; `*` means the last message.
fn sequence_numbers(seq_set: &SequenceSet, exists: u32) -> Vec<u32> {
    let value = |s: &SeqOrUid| match s {
        SeqOrUid::Value(v) => v.get(),
        SeqOrUid::Asterisk => exists,
    };
    seq_set
        .0
        .as_ref()
        .iter()
        .flat_map(|seq| match seq {
            Sequence::Single(s) => value(s)..=value(s),
            Sequence::Range(a, b) => value(a).min(value(b))..=value(a).max(value(b)),
        })
        .collect()
}

/// Handle a non-UID FETCH in the opened folder.
pub async fn handle_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    mailbox: &Mailbox,
    opened_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = opened_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} NO Folder vanished\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let exists = u32::try_from(folder.messages.len()).unwrap_or(u32::MAX);
    let numbers = sequence_numbers(sequence_set, exists);
    if numbers.iter().any(|&n| n == 0 || n > exists) {
        let resp = format!("{tag} BAD Invalid message sequence number\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    }

    for seq in numbers {
        let raw = &folder.messages[seq as usize - 1];
        let header = format!("* {seq} FETCH (BODY[] {{{}}}\r\n", raw.len());
        if write_line(stream, &header).await.is_err() {
            return;
        }
        if write_bytes(stream, raw).await.is_err() {
            return;
        }
        if write_line(stream, ")\r\n").await.is_err() {
            return;
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use std::num::NonZeroU32;
    use tokio::io::BufReader;

    const RAW: &[u8] = b"From: a@b.com\r\nSubject: Test\r\n\r\nBody";

    fn single(seq: u32) -> SequenceSet {
        SequenceSet(
            vec![Sequence::Single(SeqOrUid::Value(
                NonZeroU32::new(seq).unwrap(),
            ))]
            .try_into()
            .unwrap(),
        )
    }

    async fn run(
        tag: &str,
        sequence_set: &SequenceSet,
        mailbox: &Mailbox,
        opened: Option<&str>,
    ) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_fetch(tag, sequence_set, mailbox, opened, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn fetches_by_sequence_number() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .message(b"Subject: first\r\n\r\n1")
            .message(RAW)
            .build();

        let output = run("A1", &single(2), &mailbox, Some("INBOX")).await;

        assert!(output.starts_with(&format!("* 2 FETCH (BODY[] {{{}}}\r\n", RAW.len())));
        assert!(output.contains("From: a@b.com"));
        assert!(!output.contains("first"));
        assert!(output.ends_with("A1 OK FETCH completed\r\n"));
    }

    #[tokio::test]
    async fn out_of_range_is_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").message(RAW).build();

        let output = run("A1", &single(5), &mailbox, Some("INBOX")).await;

        assert!(output.contains("A1 BAD Invalid message sequence number"));
    }

    #[tokio::test]
    async fn no_folder_open_returns_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run("A1", &single(1), &mailbox, None).await;

        assert!(output.contains("A1 BAD No folder selected"));
    }
}
