//! Turns a raw RFC 822 message into a [`MessageRecord`].
//!
//! Header problems never fail a message: a sender, subject or date that cannot
//! be decoded is logged and left blank. Only an unparsable message or a part
//! whose body cannot be decoded is reported as an error.

use chrono::{DateTime, Utc};
use mailparse::{MailAddr, MailHeaderMap, ParsedMail};

use crate::domain::email::{
    Attachment, MessageBody, MessageId, MessageRecord, Part, PartContent,
};
use crate::error::ProcessingError;
use crate::mail::decoders::decode_mime_words;

pub fn parse_message(uid: MessageId, raw: &[u8]) -> Result<MessageRecord, ProcessingError> {
    let parsed = mailparse::parse_mail(raw).map_err(|source| ProcessingError::Parse { uid, source })?;

    let (sender_name, sender_address) = sender(&parsed);
    let subject = parsed
        .headers
        .get_first_header("Subject")
        .map(|h| decode_mime_words(h.get_value_raw(), "subject"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let sent_at = sent_date(&parsed);

    let parse_err = |source| ProcessingError::Parse { uid, source };
    let body = if is_multipart(&parsed) {
        MessageBody::Multipart(parts(&parsed).map_err(parse_err)?)
    } else if mimetype(&parsed) == "text/plain" {
        MessageBody::Text(parsed.get_body().map_err(parse_err)?)
    } else {
        MessageBody::Other(mimetype(&parsed))
    };

    Ok(MessageRecord {
        uid,
        sender_name,
        sender_address,
        subject,
        sent_at,
        body,
    })
}

pub fn is_multipart(p: &ParsedMail) -> bool {
    mimetype(p).starts_with("multipart/")
}

/// Direct children of a multipart message, classified. Nested multiparts are
/// not descended into.
pub fn parts(p: &ParsedMail) -> Result<Vec<Part>, mailparse::MailParseError> {
    p.subparts
        .iter()
        .map(|sp| -> Result<Part, mailparse::MailParseError> {
            let mt = mimetype(sp);
            let content = match mt.as_str() {
                "text/plain" => PartContent::Text(sp.get_body()?),
                "text/html" => PartContent::Html(sp.get_body()?),
                "multipart/alternative" => PartContent::Alternative,
                _ => PartContent::Attachment(Attachment {
                    filename: declared_filename(sp),
                    payload: sp.get_body_raw()?,
                }),
            };
            Ok(Part {
                content_type: content_type_header(sp),
                content,
            })
        })
        .collect()
}

fn mimetype(p: &ParsedMail) -> String {
    p.ctype.mimetype.to_ascii_lowercase()
}

/// The Content-Type header as sent, falling back to the parsed mimetype.
fn content_type_header(p: &ParsedMail) -> String {
    p.headers
        .get_first_value("Content-Type")
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| p.ctype.mimetype.clone())
}

/// Filename from Content-Disposition, else the Content-Type `name` parameter.
/// The value is returned still encoded; the attachment writer decodes it.
fn declared_filename(p: &ParsedMail) -> Option<String> {
    let disposition = p.get_content_disposition();
    disposition
        .params
        .get("filename")
        .or_else(|| p.ctype.params.get("name"))
        .cloned()
}

fn sender(p: &ParsedMail) -> (String, String) {
    let Some(header) = p.headers.get_first_header("From") else {
        return (String::new(), String::new());
    };

    let list = match mailparse::addrparse_header(header) {
        Ok(list) => list,
        Err(e) => {
            log::warn!("could not parse From header: {e}");
            return (decode_mime_words(header.get_value_raw(), "sender"), String::new());
        }
    };

    let first = list.iter().find_map(|addr| match addr {
        MailAddr::Single(info) => Some(info.clone()),
        MailAddr::Group(group) => group.addrs.first().cloned(),
    });
    match first {
        Some(info) => (info.display_name.unwrap_or_default(), info.addr),
        None => (String::new(), String::new()),
    }
}

fn sent_date(p: &ParsedMail) -> Option<DateTime<Utc>> {
    let raw = p.headers.get_first_value("Date")?;
    match mailparse::dateparse(&raw) {
        Ok(epoch) => DateTime::from_timestamp(epoch, 0),
        Err(e) => {
            log::warn!("could not parse Date header '{raw}': {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: =?UTF-8?Q?Ana_P=C3=A9rez?= <a@b.com>\r\n\
Subject: =?UTF-8?B?UXVhcnRlcmx5IHJlcG9ydA==?=\r\n\
Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
hello\r\n\
--XYZ\r\n\
Content-Type: multipart/alternative; boundary=\"ALT\"\r\n\
\r\n\
--ALT\r\n\
Content-Type: text/plain\r\n\
\r\n\
alt\r\n\
--ALT--\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--XYZ--\r\n";

    #[test]
    fn multipart_message_is_classified_part_by_part() {
        let rec = parse_message(42, MULTIPART.as_bytes()).unwrap();

        assert_eq!(rec.uid, 42);
        assert_eq!(rec.sender_name, "Ana Pérez");
        assert_eq!(rec.sender_address, "a@b.com");
        assert_eq!(rec.subject, "Quarterly report");
        assert_eq!(rec.sent_at.unwrap().timestamp(), 1_057_049_557);

        let MessageBody::Multipart(parts) = rec.body else {
            panic!("expected multipart body");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0].content, PartContent::Text(t) if t.trim() == "hello"));
        assert!(matches!(parts[1].content, PartContent::Alternative));
        match &parts[2].content {
            PartContent::Attachment(att) => {
                assert_eq!(att.filename.as_deref(), Some("report.pdf"));
                assert_eq!(att.payload, b"%PDF-1.4\n");
            }
            other => panic!("expected attachment, got {other:?}"),
        }
        assert!(parts[2].content_type.starts_with("application/pdf"));
    }

    #[test]
    fn single_part_text_message() {
        let raw = "From: a@b.com\r\nSubject: hi\r\nContent-Type: text/plain\r\n\r\nbody text\r\n";
        let rec = parse_message(1, raw.as_bytes()).unwrap();

        assert_eq!(rec.sender_address, "a@b.com");
        assert!(matches!(rec.body, MessageBody::Text(ref t) if t.trim() == "body text"));
    }

    #[test]
    fn other_top_level_types_are_not_extracted() {
        let raw = "From: a@b.com\r\nContent-Type: application/pdf\r\n\r\nxxxx\r\n";
        let rec = parse_message(1, raw.as_bytes()).unwrap();

        assert!(matches!(rec.body, MessageBody::Other(ref m) if m == "application/pdf"));
    }

    #[test]
    fn missing_headers_give_blank_values() {
        let raw = "Content-Type: text/plain\r\n\r\nno headers to speak of\r\n";
        let rec = parse_message(5, raw.as_bytes()).unwrap();

        assert_eq!(rec.sender_name, "");
        assert_eq!(rec.sender_address, "");
        assert_eq!(rec.subject, "");
        assert!(rec.sent_at.is_none());
    }

    #[test]
    fn bad_date_is_tolerated() {
        let raw = "From: a@b.com\r\nDate: sometime last week\r\nContent-Type: text/plain\r\n\r\nx\r\n";
        let rec = parse_message(5, raw.as_bytes()).unwrap();

        assert_eq!(rec.sender_address, "a@b.com");
    }

    #[test]
    fn attachment_name_falls_back_to_content_type_param() {
        let raw = "From: a@b.com\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: image/png; name=\"logo.png\"\r\n\
\r\n\
PNGDATA\r\n\
--B--\r\n";
        let rec = parse_message(9, raw.as_bytes()).unwrap();
        let MessageBody::Multipart(parts) = rec.body else {
            panic!("expected multipart body");
        };
        match &parts[0].content {
            PartContent::Attachment(att) => assert_eq!(att.filename.as_deref(), Some("logo.png")),
            other => panic!("expected attachment, got {other:?}"),
        }
    }
}
