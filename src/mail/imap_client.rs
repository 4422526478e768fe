use std::io::{Read, Write};
use std::net::TcpStream;

use native_tls::TlsConnector;

use crate::config::Config;
use crate::domain::email::{FolderStatus, MessageId, MessageRef};
use crate::error::SessionError;
use crate::mail::session::MailboxSession;

/// Connection parameters for one IMAP account.
pub struct ImapClient {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub user: String,
}

impl ImapClient {
    pub fn new(server: impl Into<String>, port: u16, use_tls: bool, user: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            use_tls,
            user: user.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.server, cfg.port, cfg.use_tls, &cfg.username)
    }

    /// Connect and log in. The returned session logs out when dropped.
    pub fn connect(&self, password: &str) -> Result<Box<dyn MailboxSession>, SessionError> {
        log::info!(
            "Connecting to server {}:{} ({})",
            self.server,
            self.port,
            if self.use_tls { "TLS" } else { "plain" }
        );

        if self.use_tls {
            let tls = TlsConnector::builder().build()?;
            let client = imap::connect((self.server.as_str(), self.port), self.server.as_str(), &tls)
                .map_err(|source| self.connect_err(source))?;
            Ok(Box::new(self.login(client, password)?))
        } else {
            let stream = TcpStream::connect((self.server.as_str(), self.port))
                .map_err(|e| self.connect_err(imap::Error::Io(e)))?;
            let mut client = imap::Client::new(stream);
            client
                .read_greeting()
                .map_err(|source| self.connect_err(source))?;
            Ok(Box::new(self.login(client, password)?))
        }
    }

    fn login<T: Read + Write>(
        &self,
        client: imap::Client<T>,
        password: &str,
    ) -> Result<ImapSession<T>, SessionError> {
        let session = client
            .login(&self.user, password)
            .map_err(|(source, _client)| SessionError::Login {
                user: self.user.clone(),
                source,
            })?;
        log::info!("Logged in as {}", self.user);
        Ok(ImapSession::new(session))
    }

    fn connect_err(&self, source: imap::Error) -> SessionError {
        SessionError::Connect {
            server: self.server.clone(),
            port: self.port,
            source,
        }
    }
}

/// A logged-in IMAP session. Logging out happens on
/// [`MailboxSession::logout`] or, failing that, on drop.
pub struct ImapSession<T: Read + Write> {
    session: Option<imap::Session<T>>,
    /// Message count of the selected folder, `None` until one is selected.
    exists: Option<u32>,
}

impl<T: Read + Write> ImapSession<T> {
    fn new(session: imap::Session<T>) -> Self {
        Self {
            session: Some(session),
            exists: None,
        }
    }

    fn inner(&mut self) -> Result<&mut imap::Session<T>, SessionError> {
        match (self.session.as_mut(), self.exists) {
            (None, _) => Err(SessionError::Closed),
            (Some(_), None) => Err(SessionError::NoFolder),
            (Some(s), Some(_)) => Ok(s),
        }
    }
}

impl<T: Read + Write> MailboxSession for ImapSession<T> {
    fn select_folder(&mut self, folder: &str) -> Result<FolderStatus, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::Closed)?;
        // EXAMINE is the read-only SELECT
        let mailbox = session.examine(folder)?;
        self.exists = Some(mailbox.exists);
        Ok(FolderStatus {
            exists: mailbox.exists,
            recent: mailbox.recent,
        })
    }

    fn list_messages(&mut self) -> Result<Vec<MessageRef>, SessionError> {
        // "1:*" is a BAD sequence set on an empty folder
        if self.exists == Some(0) {
            return Ok(Vec::new());
        }
        let session = self.inner()?;
        let fetches = session.fetch("1:*", "UID")?;
        let mut out: Vec<MessageRef> = fetches
            .iter()
            .map(|f| MessageRef {
                seq: f.message,
                uid: f.uid,
            })
            .collect();
        // FETCH responses may arrive out of order; keep folder order
        out.sort_by_key(|m| m.seq);
        Ok(out)
    }

    fn fetch_message(&mut self, uid: MessageId) -> Result<Vec<u8>, SessionError> {
        let session = self.inner()?;
        let fetches = session.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")?;
        let f = fetches
            .iter()
            .find(|f| f.uid == Some(uid))
            .ok_or(SessionError::NotFound(uid))?;
        f.body()
            .map(|b| b.to_vec())
            .ok_or(SessionError::MissingBody(uid))
    }

    fn logout(&mut self) -> Result<(), SessionError> {
        self.exists = None;
        match self.session.take() {
            Some(mut s) => Ok(s.logout()?),
            None => Ok(()),
        }
    }
}

impl<T: Read + Write> Drop for ImapSession<T> {
    fn drop(&mut self) {
        if let Some(mut s) = self.session.take()
            && let Err(e) = s.logout()
        {
            log::warn!("logout failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn logged_out() -> ImapSession<Cursor<Vec<u8>>> {
        ImapSession {
            session: None,
            exists: None,
        }
    }

    #[test]
    fn closed_session_reports_closed() {
        let mut s = logged_out();
        assert!(matches!(s.select_folder("INBOX"), Err(SessionError::Closed)));
        assert!(matches!(s.fetch_message(1), Err(SessionError::Closed)));
        assert!(s.logout().is_ok());
    }

    #[test]
    fn closed_session_stays_closed_after_select() {
        let mut s: ImapSession<Cursor<Vec<u8>>> = ImapSession {
            session: None,
            exists: Some(3),
        };
        assert!(matches!(s.list_messages(), Err(SessionError::Closed)));
    }
}
