//! Error taxonomy for a sync run.
//!
//! `SyncError` aborts the run. `ProcessingError` is scoped to one message: the
//! engine logs it, leaves the UID unmarked and moves on.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::email::MessageId;

/// Failures reading or writing the processed-UID state file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on state file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but is not a JSON array of UIDs.
    #[error("state file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("could not serialize processed set: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Failures talking to the mail server.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not connect to {server}:{port}: {source}")]
    Connect {
        server: String,
        port: u16,
        source: imap::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("login rejected for {user}: {source}")]
    Login { user: String, source: imap::Error },

    #[error("IMAP error: {0}")]
    Imap(#[from] imap::Error),

    #[error("session is closed")]
    Closed,

    #[error("no folder selected")]
    NoFolder,

    #[error("UID {0} not found")]
    NotFound(MessageId),

    #[error("UID {0}: server returned no body")]
    MissingBody(MessageId),
}

/// Failures confined to a single message.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("message #{seq}: server did not report a UID")]
    MissingUid { seq: u32 },

    #[error("UID {uid}: fetch failed: {source}")]
    Fetch {
        uid: MessageId,
        source: SessionError,
    },

    #[error("UID {uid}: MIME parse failed: {source}")]
    Parse {
        uid: MessageId,
        source: mailparse::MailParseError,
    },

    #[error("could not write attachment '{path}': {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ProcessingError {
    pub fn attachment(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Attachment {
            path: path.into(),
            source,
        }
    }
}

/// Failures that abort the whole run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not open folder '{folder}': {source}")]
    Folder {
        folder: String,
        source: SessionError,
    },

    #[error("listing folder '{folder}' failed: {source}")]
    Listing {
        folder: String,
        source: SessionError,
    },
}
