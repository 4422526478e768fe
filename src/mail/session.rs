use crate::domain::email::{FolderStatus, MessageId, MessageRef};
use crate::error::SessionError;

/// An authenticated connection to a mail store, as the sync engine sees it.
pub trait MailboxSession {
    /// Open `folder` read-only.
    fn select_folder(&mut self, folder: &str) -> Result<FolderStatus, SessionError>;

    /// Every message in the selected folder, in server order.
    fn list_messages(&mut self) -> Result<Vec<MessageRef>, SessionError>;

    /// Full RFC 822 source of one message, without setting `\Seen`.
    fn fetch_message(&mut self, uid: MessageId) -> Result<Vec<u8>, SessionError>;

    /// End the session. Calling it more than once is harmless.
    fn logout(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}
