use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// IMAP UID: unique within a folder and stable across sessions.
pub type MessageId = u32;

/// UIDs already handled by a previous (or the current) run.
pub type ProcessedSet = BTreeSet<MessageId>;

/// One entry of the folder listing, in server order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub seq: u32,
    /// `None` when the server left the UID out of its FETCH response.
    pub uid: Option<MessageId>,
}

/// Counts reported by the server when the folder is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderStatus {
    pub exists: u32,
    pub recent: u32,
}

#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub uid: MessageId,
    pub sender_name: String,
    pub sender_address: String,
    pub subject: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub body: MessageBody,
}

#[derive(Debug, Clone)]
pub enum MessageBody {
    /// Single-part `text/plain`.
    Text(String),
    Multipart(Vec<Part>),
    /// Any other top-level type; nothing is extracted.
    Other(String),
}

#[derive(Debug, Clone)]
pub struct Part {
    pub content_type: String,
    pub content: PartContent,
}

#[derive(Debug, Clone)]
pub enum PartContent {
    Text(String),
    Html(String),
    /// Nested `multipart/alternative`: neither logged nor stored.
    Alternative,
    Attachment(Attachment),
}

#[derive(Debug, Clone, Default)]
pub struct Attachment {
    /// Declared filename as found in the headers, possibly RFC 2047 encoded.
    pub filename: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub path: PathBuf,
}

/// What happened to a single message during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadyProcessed,
    Processed { attachments: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub folder: FolderStatus,
    /// Messages seen in the listing.
    pub total: usize,
    pub already_processed: usize,
    pub processed: usize,
    pub failed: usize,
    pub attachments_written: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyProcessed => self.already_processed += 1,
            Outcome::Processed { attachments } => {
                self.processed += 1;
                self.attachments_written += attachments;
            }
        }
    }
}
