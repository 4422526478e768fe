use mailparse::MailParseError;

/// Decode RFC 2047 encoded-words in a raw header value.
pub fn decode_header_text(raw: &[u8]) -> Result<String, MailParseError> {
    // mailparse expects a full "Key: value" header line
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    let (h, _idx) = mailparse::parse_header(&line)?;
    Ok(h.get_value())
}

/// Like [`decode_header_text`], but falls back to the raw text and logs instead
/// of failing.
pub fn decode_mime_words(raw: &[u8], what: &str) -> String {
    match decode_header_text(raw) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("could not decode {what}: {e}; keeping raw value");
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}

/// One-line preview of `s` for the log. Whitespace runs (newlines included)
/// become single spaces and the text is cut at a word boundary, the cut
/// marked with `…`.
pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut len = 0;
    for word in s.split_whitespace() {
        let needed = word.chars().count() + usize::from(len > 0);
        if len + needed > max_chars {
            if len == 0 {
                // a single word longer than the limit
                out.extend(word.chars().take(max_chars));
            }
            out.push('…');
            return out;
        }
        if len > 0 {
            out.push(' ');
        }
        out.push_str(word);
        len += needed;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_encoded_word() {
        let s = decode_header_text(b"=?UTF-8?B?SGVsbG8gV29ybGQ=?=").unwrap();
        assert_eq!(s, "Hello World");
    }

    #[test]
    fn decodes_q_encoded_filename() {
        let s = decode_mime_words(b"=?UTF-8?Q?r=C3=A9sum=C3=A9.pdf?=", "filename");
        assert_eq!(s, "résumé.pdf");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(decode_mime_words(b"report.pdf", "filename"), "report.pdf");
    }

    #[test]
    fn snippet_cuts_on_word_boundary() {
        let s = normalize_snippet("hello\n\n  world  \nagain", 12);
        assert_eq!(s, "hello world…");
    }

    #[test]
    fn short_snippet_is_only_flattened() {
        assert_eq!(normalize_snippet("  Dear team,\r\n\tsee below ", 140), "Dear team, see below");
    }

    #[test]
    fn overlong_word_is_cut_mid_word() {
        assert_eq!(normalize_snippet("abcdefghij rest", 4), "abcd…");
    }
}
