//! Downloads the attachments of every not-yet-seen message in an IMAP folder.
//!
//! [`sync::SyncEngine`] drives a run: it checks each message's UID against the
//! set kept by a [`store::repo::ProcessedRepository`], stores attachments with
//! a [`storage::AttachmentWriter`] and flushes the updated set at the end.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod storage;
pub mod store;
pub mod sync;
