//! The replication engine.
//!
//! Local changes are captured in an outgoing queue ([`outbox`]), translated
//! to the server's wire schema ([`outgoing`]) and pushed; the server's queued
//! records are pulled, translated back ([`incoming`], [`translators`]) and
//! integrated, including duplicate-merge directives ([`merge`]). The
//! [`synchroniser`] drives the whole cycle over a [`server::SyncServer`].

pub mod auth;
pub mod incoming;
pub mod merge;
pub mod outbox;
pub mod outgoing;
pub mod server;
pub mod synchroniser;
pub(crate) mod translators;

pub use incoming::IncomingRecord;
pub use outbox::{Outbox, OutboxEntry};
pub use outgoing::OutgoingRecord;
pub use server::{HttpSyncServer, SiteDetails, SyncConnection, SyncServer};
pub use synchroniser::{
    SyncState, SyncStatus, Synchroniser, MAX_SYNC_BATCH_SIZE, MIN_SYNC_BATCH_SIZE,
};
