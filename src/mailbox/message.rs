//! MIME decomposition of fetched messages.
//!
//! Turns raw RFC 5322 bytes into the content parts an adapter asked for,
//! plus the message timestamp from the `Date` header (never wall clock).
//! Decomposition failures are per-message: the poller logs and skips.

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use mailparse::{parse_mail, DispositionType, MailHeaderMap, ParsedMail};

use crate::adapter::{Attachment, MessageContent, SearchAdapter};

/// Which content parts the caller wants decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentWants {
    pub plain_text: bool,
    pub html: bool,
    pub attachments: bool,
}

impl ContentWants {
    /// The parts an adapter declared interest in.
    pub fn for_adapter(adapter: &dyn SearchAdapter) -> Self {
        Self {
            plain_text: adapter.wants_plain_text(),
            html: adapter.wants_html(),
            attachments: adapter.wants_attachments(),
        }
    }
}

/// A fetched message reduced to its timestamp and wanted content parts.
#[derive(Debug)]
pub struct DecomposedMessage {
    /// Local-naive timestamp from the `Date` header.
    pub timestamp: NaiveDateTime,
    pub content: MessageContent,
}

/// Decompose a raw message, decoding only the wanted parts.
pub fn decompose(raw: &[u8], wants: &ContentWants) -> Result<DecomposedMessage> {
    let mail = parse_mail(raw).context("failed to parse message")?;

    let date_raw = mail
        .headers
        .get_first_value("Date")
        .context("message has no Date header")?;
    let epoch = mailparse::dateparse(&date_raw)
        .map_err(|e| anyhow!("unparseable Date header {:?}: {}", date_raw, e))?;
    let timestamp = Local
        .timestamp_opt(epoch, 0)
        .single()
        .context("Date header out of range")?
        .naive_local();

    let mut content = MessageContent::default();
    collect_parts(&mail, wants, &mut content);

    Ok(DecomposedMessage { timestamp, content })
}

fn collect_parts(part: &ParsedMail, wants: &ContentWants, content: &mut MessageContent) {
    let mimetype = part.ctype.mimetype.as_str();

    if mimetype.starts_with("multipart/") {
        for sub in &part.subparts {
            collect_parts(sub, wants, content);
        }
        return;
    }

    let disposition = part.get_content_disposition();
    let is_attachment = disposition.disposition == DispositionType::Attachment
        || matches!(mimetype, "application/pdf" | "application/octet-stream");

    if is_attachment {
        if wants.attachments {
            match part.get_body_raw() {
                Ok(data) => {
                    let filename = disposition
                        .params
                        .get("filename")
                        .cloned()
                        .or_else(|| part.ctype.params.get("name").cloned())
                        .unwrap_or_default();
                    content.attachments.push(Attachment { filename, data });
                }
                Err(e) => {
                    tracing::warn!(error = %e, mimetype = mimetype, "attachment_decode_failed");
                }
            }
        }
        return;
    }

    match mimetype {
        "text/plain" if wants.plain_text => {
            if let Ok(body) = part.get_body() {
                content.plain_text.push(body);
            }
        }
        "text/html" if wants.html => {
            if let Ok(body) = part.get_body() {
                content.html_text.push(body);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const ALL: ContentWants = ContentWants {
        plain_text: true,
        html: true,
        attachments: true,
    };

    #[test]
    fn test_decompose_plain_text_message() {
        let raw = b"Date: Mon, 4 Mar 2024 15:42:00 +0000\r\n\
Subject: Dein Bon\r\n\
Content-Type: text/plain\r\n\
\r\n\
Gesamtbetrag 23,45 EUR\r\n";

        let msg = decompose(raw, &ALL).unwrap();
        assert_eq!(msg.content.plain_text.len(), 1);
        assert!(msg.content.plain_text[0].contains("Gesamtbetrag"));
        assert_eq!(msg.timestamp.year(), 2024);
    }

    #[test]
    fn test_decompose_multipart_selects_wanted_parts_only() {
        let raw = b"Date: Mon, 4 Mar 2024 15:42:00 +0000\r\n\
Subject: Multipart\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
plain body\r\n\
--b1\r\n\
Content-Type: text/html\r\n\
\r\n\
<html>html body</html>\r\n\
--b1--\r\n";

        let wants = ContentWants {
            plain_text: true,
            html: false,
            attachments: false,
        };
        let msg = decompose(raw, &wants).unwrap();
        assert_eq!(msg.content.plain_text.len(), 1);
        assert!(msg.content.html_text.is_empty());
    }

    #[test]
    fn test_decompose_attachment_decodes_base64() {
        let raw = b"Date: Mon, 4 Mar 2024 15:42:00 +0000\r\n\
Subject: eBon\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attachment\r\n\
--b1\r\n\
Content-Type: application/octet-stream; name=\"ebon.pdf\"\r\n\
Content-Disposition: attachment; filename=\"ebon.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
dGVzdA==\r\n\
--b1--\r\n";

        let msg = decompose(raw, &ALL).unwrap();
        assert_eq!(msg.content.attachments.len(), 1);
        assert_eq!(msg.content.attachments[0].filename, "ebon.pdf");
        assert_eq!(msg.content.attachments[0].data, b"test");
    }

    #[test]
    fn test_decompose_attachment_skipped_when_not_wanted() {
        let raw = b"Date: Mon, 4 Mar 2024 15:42:00 +0000\r\n\
Content-Type: application/pdf; name=\"ebon.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
dGVzdA==\r\n";

        let wants = ContentWants {
            plain_text: true,
            html: false,
            attachments: false,
        };
        let msg = decompose(raw, &wants).unwrap();
        assert!(msg.content.attachments.is_empty());
    }

    #[test]
    fn test_decompose_missing_date_header_is_error() {
        let raw = b"Subject: no date\r\nContent-Type: text/plain\r\n\r\nbody\r\n";
        assert!(decompose(raw, &ALL).is_err());
    }

    #[test]
    fn test_decompose_timestamp_from_header_not_wall_clock() {
        let raw = b"Date: Sat, 15 Jan 2000 12:00:00 +0000\r\n\
Content-Type: text/plain\r\n\
\r\n\
old message\r\n";
        let msg = decompose(raw, &ALL).unwrap();
        assert_eq!(msg.timestamp.year(), 2000);
    }
}
