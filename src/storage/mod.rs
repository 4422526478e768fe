pub mod sniff;

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::email::{Attachment, MessageId, StoredAttachment};
use crate::error::ProcessingError;
use crate::mail::decoders::decode_mime_words;

use sniff::{MagicSniffer, TypeSniffer};

/// Directory used when a message has no usable sender address.
const UNKNOWN_SENDER: &str = "unknown-sender";

/// Writes attachment payloads under `<root>/<sender>/<filename>`.
pub struct AttachmentWriter<S = MagicSniffer> {
    root: PathBuf,
    sniffer: S,
}

impl AttachmentWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_sniffer(root, MagicSniffer)
    }
}

impl<S: TypeSniffer> AttachmentWriter<S> {
    pub fn with_sniffer(root: impl Into<PathBuf>, sniffer: S) -> Self {
        Self {
            root: root.into(),
            sniffer,
        }
    }

    pub fn write(
        &self,
        sender: &str,
        attachment: &Attachment,
        uid: MessageId,
        part_index: usize,
    ) -> Result<StoredAttachment, ProcessingError> {
        let name = base_filename(attachment.filename.as_deref(), uid, part_index);
        log::info!("fileName: {name}");

        let dir = self.root.join(path_segment(sender, UNKNOWN_SENDER));
        fs::create_dir_all(&dir).map_err(|e| ProcessingError::attachment(&dir, e))?;

        let path = resolve_non_colliding_path(&dir, &name);
        fs::write(&path, &attachment.payload)
            .map_err(|e| ProcessingError::attachment(&path, e))?;

        if split_extension(file_name_of(&path)).1.is_some() {
            return Ok(StoredAttachment { path });
        }

        let ext = self.sniffer.detect_extension(&attachment.payload);
        let mut renamed = path.clone().into_os_string();
        renamed.push(".");
        renamed.push(&ext);
        let renamed = PathBuf::from(renamed);

        // fs::rename silently replaces an existing file on unix
        if renamed.exists() {
            log::warn!(
                "not renaming {} to {}: target exists",
                path.display(),
                renamed.display()
            );
            return Ok(StoredAttachment { path });
        }
        match fs::rename(&path, &renamed) {
            Ok(()) => Ok(StoredAttachment { path: renamed }),
            Err(e) => {
                log::warn!(
                    "could not rename {} to {}: {e}",
                    path.display(),
                    renamed.display()
                );
                Ok(StoredAttachment { path })
            }
        }
    }
}

/// Declared filename when present and non-blank, otherwise `<uid><part_index>`.
pub fn base_filename(declared: Option<&str>, uid: MessageId, part_index: usize) -> String {
    match declared.filter(|f| !f.trim().is_empty()) {
        Some(raw) => path_segment(&decode_mime_words(raw.as_bytes(), "filename"), "attachment"),
        None => format!("{uid}{part_index}"),
    }
}

/// First free path in `dir` for `name`. Taken names get `_2`, `_3`, ...
/// inserted before the extension, or appended when there is none.
pub fn resolve_non_colliding_path(dir: &Path, name: &str) -> PathBuf {
    let (base, ext) = split_extension(name);
    let mut path = dir.join(name);
    let mut counter = 1u32;
    while path.exists() {
        counter += 1;
        let candidate = match ext {
            Some(ext) => format!("{base}_{counter}.{ext}"),
            None => format!("{base}_{counter}"),
        };
        path = dir.join(candidate);
    }
    path
}

/// Splits at the last dot. An extension is only reported when the text after
/// the dot is non-empty.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() => (base, Some(ext)),
        _ => (name, None),
    }
}

/// Makes `s` usable as a single path component.
fn path_segment(s: &str, fallback: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => fallback.to_string(),
        _ => cleaned,
    }
}

fn file_name_of(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}
