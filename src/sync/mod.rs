//! One pass over a mailbox folder.
//!
//! Messages are handled strictly in listing order. A message's UID joins the
//! processed set only after everything about it succeeded, and the set is
//! flushed once at the end of the run (also when the listing itself fails or
//! the loop unwinds), so a failed message is simply retried next time.

use crate::domain::email::{
    MessageBody, MessageRecord, MessageRef, Outcome, PartContent, ProcessedSet, RunSummary,
};
use crate::error::{ProcessingError, StoreError, SyncError};
use crate::mail::decoders::normalize_snippet;
use crate::mail::mime::parse_message;
use crate::mail::session::MailboxSession;
use crate::storage::AttachmentWriter;
use crate::storage::sniff::{MagicSniffer, TypeSniffer};
use crate::store::repo::ProcessedRepository;

const SNIPPET_CHARS: usize = 140;
const HTML_LOG_WIDTH: usize = 100;

pub struct SyncEngine<'a, S = MagicSniffer> {
    repo: &'a dyn ProcessedRepository,
    writer: &'a AttachmentWriter<S>,
}

impl<'a, S: TypeSniffer> SyncEngine<'a, S> {
    pub fn new(repo: &'a dyn ProcessedRepository, writer: &'a AttachmentWriter<S>) -> Self {
        Self { repo, writer }
    }

    pub fn run(
        &self,
        session: &mut dyn MailboxSession,
        folder: &str,
    ) -> Result<RunSummary, SyncError> {
        let processed = self.repo.load()?;
        log::info!("{} message(s) already processed", processed.len());

        let status = session
            .select_folder(folder)
            .map_err(|source| SyncError::Folder {
                folder: folder.to_string(),
                source,
            })?;
        log::info!("Total messages: {}", status.exists);
        log::info!("New messages: {}", status.recent);

        let mut summary = RunSummary {
            folder: status,
            ..RunSummary::default()
        };
        let mut pending = PendingSave::new(self.repo, processed);
        let result = self.sync_folder(session, folder, &mut pending.set, &mut summary);

        // persist whatever was accumulated, even when the listing failed
        pending.persist()?;
        result?;

        log::info!(
            "done: {} seen, {} new, {} already processed, {} failed, {} attachment(s) written",
            summary.total,
            summary.processed,
            summary.already_processed,
            summary.failed,
            summary.attachments_written
        );
        Ok(summary)
    }

    fn sync_folder(
        &self,
        session: &mut dyn MailboxSession,
        folder: &str,
        processed: &mut ProcessedSet,
        summary: &mut RunSummary,
    ) -> Result<(), SyncError> {
        let messages = session
            .list_messages()
            .map_err(|source| SyncError::Listing {
                folder: folder.to_string(),
                source,
            })?;
        summary.total = messages.len();

        for msg in &messages {
            match self.process_one(session, msg, processed) {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    summary.failed += 1;
                    log::error!("message #{} skipped, will retry next run: {e}", msg.seq);
                    log::debug!("{e:?}");
                }
            }
        }
        Ok(())
    }

    /// Handle one listing entry. The UID is inserted into `processed` only
    /// on success.
    pub fn process_one(
        &self,
        session: &mut dyn MailboxSession,
        msg: &MessageRef,
        processed: &mut ProcessedSet,
    ) -> Result<Outcome, ProcessingError> {
        let uid = msg.uid.ok_or(ProcessingError::MissingUid { seq: msg.seq })?;
        log::info!("UID: {uid}");

        if processed.contains(&uid) {
            log::info!("already processed: {uid}");
            return Ok(Outcome::AlreadyProcessed);
        }

        let raw = session
            .fetch_message(uid)
            .map_err(|source| ProcessingError::Fetch { uid, source })?;
        let record = parse_message(uid, &raw)?;
        log_headers(&record);

        let attachments = self.extract(&record)?;

        processed.insert(uid);
        Ok(Outcome::Processed { attachments })
    }

    /// Log text content and store attachments; returns how many were written.
    fn extract(&self, record: &MessageRecord) -> Result<usize, ProcessingError> {
        let parts = match &record.body {
            MessageBody::Text(text) => {
                log_text("content", text);
                return Ok(0);
            }
            MessageBody::Other(mime) => {
                log::info!("content type {mime}: nothing to extract");
                return Ok(0);
            }
            MessageBody::Multipart(parts) => parts,
        };

        let mut written = 0;
        for (i, part) in parts.iter().enumerate() {
            log::info!("contentType[{i}]: {}", part.content_type);
            match &part.content {
                PartContent::Text(text) => log_text("content", text),
                PartContent::Html(html) => log_text("html", &html_to_text(html)),
                PartContent::Alternative => {}
                PartContent::Attachment(att) => {
                    let stored = self
                        .writer
                        .write(&record.sender_address, att, record.uid, i)?;
                    log::info!("saved {}", stored.path.display());
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}

/// Processed set of a run in progress. Dropping it without [`persist`]
/// (a panic somewhere in the loop) still writes it out.
///
/// [`persist`]: PendingSave::persist
struct PendingSave<'r> {
    repo: &'r dyn ProcessedRepository,
    set: ProcessedSet,
    saved: bool,
}

impl<'r> PendingSave<'r> {
    fn new(repo: &'r dyn ProcessedRepository, set: ProcessedSet) -> Self {
        Self {
            repo,
            set,
            saved: false,
        }
    }

    fn persist(mut self) -> Result<(), StoreError> {
        self.saved = true;
        self.repo.save(&self.set)
    }
}

impl Drop for PendingSave<'_> {
    fn drop(&mut self) {
        if self.saved {
            return;
        }
        log::error!(
            "run interrupted, saving {} processed UID(s)",
            self.set.len()
        );
        if let Err(e) = self.repo.save(&self.set) {
            log::error!("could not save processed set: {e}");
        }
    }
}

fn log_headers(record: &MessageRecord) {
    log::info!("xFromEmail: {}", record.sender_name);
    log::info!("fromEmail: {}", record.sender_address);
    if !record.subject.is_empty() {
        log::info!("subject: {}", record.subject);
    }
    match record.sent_at {
        Some(date) => log::info!(
            "date: {}",
            date.with_timezone(&chrono::Local).format("%Y/%m/%d %H:%M:%S")
        ),
        None => log::info!("date: (unknown)"),
    }
}

fn log_text(label: &str, text: &str) {
    log::info!("{label}: {}", normalize_snippet(text, SNIPPET_CHARS));
    log::debug!("{label} (full): {text}");
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), HTML_LOG_WIDTH).unwrap_or_else(|_| html.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::{FolderStatus, MessageId};
    use crate::error::SessionError;
    use crate::storage::sniff::TypeSniffer;
    use std::collections::HashMap;

    struct BinSniffer;

    impl TypeSniffer for BinSniffer {
        fn detect_extension(&self, _bytes: &[u8]) -> String {
            "bin".to_string()
        }
    }

    #[derive(Default)]
    struct Mailbox {
        bodies: HashMap<MessageId, Vec<u8>>,
        fetched: Vec<MessageId>,
    }

    impl MailboxSession for Mailbox {
        fn select_folder(&mut self, _folder: &str) -> Result<FolderStatus, SessionError> {
            Ok(FolderStatus::default())
        }

        fn list_messages(&mut self) -> Result<Vec<MessageRef>, SessionError> {
            Ok(Vec::new())
        }

        fn fetch_message(&mut self, uid: MessageId) -> Result<Vec<u8>, SessionError> {
            self.fetched.push(uid);
            self.bodies.get(&uid).cloned().ok_or(SessionError::NotFound(uid))
        }
    }

    struct NoStore;

    impl ProcessedRepository for NoStore {
        fn load(&self) -> Result<ProcessedSet, crate::error::StoreError> {
            Ok(ProcessedSet::new())
        }

        fn save(&self, _set: &ProcessedSet) -> Result<(), crate::error::StoreError> {
            Ok(())
        }
    }

    #[test]
    fn known_uid_is_skipped_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AttachmentWriter::with_sniffer(dir.path(), BinSniffer);
        let engine = SyncEngine::new(&NoStore, &writer);
        let mut mailbox = Mailbox::default();
        let mut processed: ProcessedSet = [7].into_iter().collect();

        let outcome = engine
            .process_one(&mut mailbox, &MessageRef { seq: 1, uid: Some(7) }, &mut processed)
            .unwrap();

        assert_eq!(outcome, Outcome::AlreadyProcessed);
        assert!(mailbox.fetched.is_empty());
    }

    #[test]
    fn missing_uid_is_a_message_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AttachmentWriter::with_sniffer(dir.path(), BinSniffer);
        let engine = SyncEngine::new(&NoStore, &writer);
        let mut processed = ProcessedSet::new();

        let err = engine
            .process_one(&mut Mailbox::default(), &MessageRef { seq: 3, uid: None }, &mut processed)
            .unwrap_err();

        assert!(matches!(err, ProcessingError::MissingUid { seq: 3 }));
        assert!(processed.is_empty());
    }

    #[test]
    fn text_message_is_marked_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AttachmentWriter::with_sniffer(dir.path(), BinSniffer);
        let engine = SyncEngine::new(&NoStore, &writer);
        let mut mailbox = Mailbox::default();
        mailbox.bodies.insert(
            11,
            b"From: a@b.com\r\nSubject: hi\r\nContent-Type: text/plain\r\n\r\nhello\r\n".to_vec(),
        );
        let mut processed = ProcessedSet::new();

        let outcome = engine
            .process_one(&mut mailbox, &MessageRef { seq: 1, uid: Some(11) }, &mut processed)
            .unwrap();

        assert_eq!(outcome, Outcome::Processed { attachments: 0 });
        assert!(processed.contains(&11));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn fetch_failure_leaves_uid_unmarked() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AttachmentWriter::with_sniffer(dir.path(), BinSniffer);
        let engine = SyncEngine::new(&NoStore, &writer);
        let mut processed = ProcessedSet::new();

        let err = engine
            .process_one(&mut Mailbox::default(), &MessageRef { seq: 1, uid: Some(5) }, &mut processed)
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Fetch { uid: 5, .. }));
        assert!(processed.is_empty());
    }

    #[test]
    fn html_is_rendered_for_the_log() {
        let text = html_to_text("<p>Hello <b>there</b></p>");
        assert!(text.contains("Hello"));
        assert!(!text.contains("<p>"));
    }
}
