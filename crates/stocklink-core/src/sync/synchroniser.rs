//! The sync orchestrator.
//!
//! Drives the two-phase cycle against the server: push queued local changes,
//! then pull and integrate the server's queued records. Batch sizes adapt to
//! the observed throughput so slow links still make steady progress.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{ChangeOrigin, Store, SyncSettings};
use crate::error::{Error, Result};
use crate::sync::server::{SyncConnection, SyncServer};
use crate::sync::{auth, incoming, outgoing};

pub const MIN_SYNC_BATCH_SIZE: usize = 10;
pub const MAX_SYNC_BATCH_SIZE: usize = 500;

/// Target wall-clock duration for one batch, in seconds.
const OPTIMAL_BATCH_DURATION_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialised,
    Initialising,
    Idle,
    Pushing,
    Pulling,
    Failed,
}

/// A snapshot of sync progress, safe to read from any task.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub state: SyncState,
    pub progress: u64,
    pub total: u64,
    pub last_error: Option<String>,
}

impl SyncStatus {
    const fn new(state: SyncState) -> Self {
        Self {
            state,
            progress: 0,
            total: 0,
            last_error: None,
        }
    }
}

/// Owns the sync cycle for one store.
///
/// The store is shared behind a mutex so the embedding application can keep
/// making local writes. Sync code locks it only for each local unit of work
/// (queue reads, integration transactions, settings saves) and releases it
/// before every network call, so a slow link never blocks the UI.
pub struct Synchroniser<S: SyncServer> {
    server: S,
    store: Arc<Mutex<Store>>,
    status: StdMutex<SyncStatus>,
    in_progress: AtomicBool,
    batch_size: AtomicUsize,
}

impl<S: SyncServer> Synchroniser<S> {
    /// Wrap a store, re-enabling the outgoing queue if a previous session
    /// already initialised sync.
    pub async fn new(store: Arc<Mutex<Store>>, server: S) -> Result<Self> {
        let state = {
            let store = store.lock().await;
            let settings = SyncSettings::load(&store)?;
            if settings.is_initialised {
                store.outbox().enable();
                SyncState::Idle
            } else {
                SyncState::Uninitialised
            }
        };
        Ok(Self {
            server,
            store,
            status: StdMutex::new(SyncStatus::new(state)),
            in_progress: AtomicBool::new(false),
            batch_size: AtomicUsize::new(MIN_SYNC_BATCH_SIZE),
        })
    }

    /// Lock the underlying store for local reads and writes.
    pub async fn store(&self) -> tokio::sync::MutexGuard<'_, Store> {
        self.store.lock().await
    }

    pub fn status(&self) -> SyncStatus {
        self.status_guard().clone()
    }

    /// Register this device with the server and perform the first pull.
    ///
    /// Pointing at a different server or site wipes all local data first,
    /// and a full dump of the site's records is requested so the following
    /// pull rebuilds the store from scratch. The outgoing queue only turns
    /// on once every step has succeeded.
    pub async fn initialise(
        &self,
        server_url: &str,
        site_name: &str,
        password: &str,
    ) -> Result<()> {
        let _guard = self.begin()?;
        auth::validate_credentials(server_url, site_name, password)?;
        let server_url = server_url.trim_end_matches('/');

        {
            let store = self.store.lock().await;
            store.outbox().disable();
        }
        self.update_status(|status| {
            *status = SyncStatus::new(SyncState::Initialising);
        });

        let result = self.try_initialise(server_url, site_name, password).await;
        match &result {
            Ok(()) => self.finish_ok(),
            Err(error) => self.finish_failed(error),
        }
        result
    }

    async fn try_initialise(
        &self,
        server_url: &str,
        site_name: &str,
        password: &str,
    ) -> Result<()> {
        let (fresh, site_uuid) = {
            let mut store = self.store.lock().await;
            let previous = SyncSettings::load(&store)?;
            let fresh = previous.url.as_deref() != Some(server_url)
                || previous.site_name.as_deref() != Some(site_name);
            if fresh {
                tracing::info!(%server_url, %site_name, "sync site changed, clearing local data");
                store.write(ChangeOrigin::Sync, |wtx| wtx.delete_all())?;
            }
            let site_uuid = if fresh {
                Uuid::now_v7().to_string()
            } else {
                previous
                    .site_uuid
                    .unwrap_or_else(|| Uuid::now_v7().to_string())
            };
            (fresh, site_uuid)
        };

        let mut connection = SyncConnection {
            server_url: server_url.to_string(),
            site_name: site_name.to_string(),
            password_hash: auth::hash_password(password),
            site_uuid,
            ..SyncConnection::default()
        };
        let details = self.server.authenticate(&connection).await?;
        connection.site_id.clone_from(&details.site_id);
        connection.server_id.clone_from(&details.server_id);
        tracing::info!(
            site_id = %details.site_id,
            store_id = %details.store_id,
            "authenticated with sync server"
        );

        let mut settings = SyncSettings {
            url: Some(connection.server_url.clone()),
            site_name: Some(connection.site_name.clone()),
            password_hash: Some(connection.password_hash.clone()),
            site_id: Some(details.site_id),
            server_id: Some(details.server_id),
            store_id: Some(details.store_id.clone()),
            site_uuid: Some(connection.site_uuid.clone()),
            is_initialised: false,
            prior_failed: false,
        };
        {
            let store = self.store.lock().await;
            settings.save(&store)?;
        }

        if fresh {
            self.server.request_initial_dump(&connection).await?;
        }
        self.pull(&connection, &details.store_id).await?;

        settings.is_initialised = true;
        let store = self.store.lock().await;
        settings.save(&store)?;
        store.outbox().enable();
        Ok(())
    }

    /// Run one full push-then-pull cycle.
    ///
    /// The prior-failed flag is raised for the duration of the cycle so an
    /// interrupted run is visible on the next startup.
    pub async fn synchronise(&self) -> Result<()> {
        let _guard = self.begin()?;

        let (connection, store_id, mut settings) = {
            let store = self.store.lock().await;
            let mut settings = SyncSettings::load(&store)?;
            if !settings.is_initialised {
                return Err(Error::NotInitialised);
            }
            let connection = connection_from(&settings)?;
            let store_id = settings.store_id.clone().unwrap_or_default();

            settings.prior_failed = true;
            settings.save(&store)?;
            (connection, store_id, settings)
        };

        let result = async {
            self.push(&connection, &store_id).await?;
            self.pull(&connection, &store_id).await
        }
        .await;
        match result {
            Ok(()) => {
                settings.prior_failed = false;
                let store = self.store.lock().await;
                settings.save(&store)?;
                drop(store);
                self.finish_ok();
                Ok(())
            }
            Err(error) => {
                self.finish_failed(&error);
                Err(error)
            }
        }
    }

    /// Drain the outgoing queue, oldest first.
    ///
    /// The store lock is taken once to read and translate a batch and again
    /// to consume it after transmission; it is never held while the request
    /// is in flight.
    async fn push(&self, connection: &SyncConnection, store_id: &str) -> Result<()> {
        let total = {
            let store = self.store.lock().await;
            store.outbox().len(&store)?
        };
        self.update_status(|status| {
            status.state = SyncState::Pushing;
            status.progress = 0;
            status.total = total;
        });

        let mut progress = 0;
        loop {
            let started = Instant::now();
            let (entries, records) = {
                let store = self.store.lock().await;
                let entries = store
                    .outbox()
                    .next(&store, self.batch_size.load(Ordering::Relaxed))?;
                let mut records = Vec::with_capacity(entries.len());
                for entry in &entries {
                    match outgoing::generate_outgoing_record(&store, store_id, entry) {
                        Ok(record) => records.push(record),
                        // An entry that can never be sent must not jam the queue.
                        Err(
                            error @ (Error::MissingRecord { .. }
                            | Error::UnsupportedRecordType(_)),
                        ) => {
                            tracing::warn!(
                                record_type = %entry.record_type,
                                record_id = %entry.record_id,
                                %error,
                                "dropping unsendable outgoing change"
                            );
                        }
                        Err(error) => return Err(error),
                    }
                }
                (entries, records)
            };
            if entries.is_empty() {
                break;
            }

            if !records.is_empty() {
                self.server.push_records(connection, &records).await?;
            }
            {
                let store = self.store.lock().await;
                store.outbox().remove(&store, &entries)?;
            }

            progress += entries.len() as u64;
            self.update_status(|status| status.progress = progress);
            self.retune_batch_size(entries.len(), started.elapsed());
        }
        tracing::info!(pushed = progress, "push phase complete");
        Ok(())
    }

    /// Pull queued records from the server until its queue is empty.
    ///
    /// Each batch is integrated in a single write transaction and only
    /// acknowledged once that transaction has committed, so a crash mid-pull
    /// re-delivers rather than loses records.
    async fn pull(&self, connection: &SyncConnection, store_id: &str) -> Result<()> {
        let mut total = self.server.queued_record_count(connection).await?;
        self.update_status(|status| {
            status.state = SyncState::Pulling;
            status.progress = 0;
            status.total = total;
        });

        let mut progress = 0;
        while progress < total {
            let started = Instant::now();
            let batch = self
                .server
                .queued_records(connection, self.batch_size.load(Ordering::Relaxed))
                .await?;
            if batch.is_empty() {
                break;
            }

            {
                let mut store = self.store.lock().await;
                store.write(ChangeOrigin::Sync, |wtx| {
                    incoming::integrate_records(wtx, store_id, &batch);
                    Ok(())
                })?;
            }
            let sync_ids: Vec<String> = batch
                .iter()
                .filter_map(|record| record.sync_id.clone())
                .collect();
            if !sync_ids.is_empty() {
                self.server.acknowledge_records(connection, &sync_ids).await?;
            }

            progress += batch.len() as u64;
            if progress >= total {
                // Records may have queued on the server while this pull ran.
                let waiting = self.server.queued_record_count(connection).await?;
                if waiting > 0 {
                    total = progress + waiting;
                }
            }
            self.update_status(|status| {
                status.progress = progress;
                status.total = total;
            });
            self.retune_batch_size(batch.len(), started.elapsed());
        }
        tracing::info!(pulled = progress, "pull phase complete");
        Ok(())
    }

    fn retune_batch_size(&self, processed: usize, elapsed: Duration) {
        if processed == 0 {
            return;
        }
        self.batch_size
            .store(next_batch_size(processed, elapsed), Ordering::Relaxed);
    }

    fn begin(&self) -> Result<SyncGuard<'_>> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return Err(Error::SyncInProgress);
        }
        Ok(SyncGuard(&self.in_progress))
    }

    fn finish_ok(&self) {
        self.update_status(|status| {
            status.state = SyncState::Idle;
            status.last_error = None;
        });
    }

    fn finish_failed(&self, error: &Error) {
        self.update_status(|status| {
            status.state = SyncState::Failed;
            status.last_error = Some(error.to_string());
        });
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        f(&mut self.status_guard());
    }

    fn status_guard(&self) -> std::sync::MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-progress flag however a sync run ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn connection_from(settings: &SyncSettings) -> Result<SyncConnection> {
    let complete = (|| {
        Some(SyncConnection {
            server_url: settings.url.clone()?,
            site_id: settings.site_id.clone()?,
            server_id: settings.server_id.clone()?,
            site_name: settings.site_name.clone()?,
            password_hash: settings.password_hash.clone()?,
            site_uuid: settings.site_uuid.clone()?,
        })
    })();
    complete.ok_or(Error::NotInitialised)
}

/// Pick the next batch size from how long the last batch took, aiming for
/// [`OPTIMAL_BATCH_DURATION_SECS`] per batch.
fn next_batch_size(processed: usize, elapsed: Duration) -> usize {
    let duration_per_record = elapsed.as_secs_f64() / processed as f64;
    let optimal = if duration_per_record > 0.0 {
        (OPTIMAL_BATCH_DURATION_SECS / duration_per_record).floor() as usize
    } else {
        MAX_SYNC_BATCH_SIZE
    };
    optimal.clamp(MIN_SYNC_BATCH_SIZE, MAX_SYNC_BATCH_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, RecordKind, Requisition};
    use crate::sync::incoming::IncomingRecord;
    use crate::sync::outgoing::OutgoingRecord;
    use crate::sync::server::SiteDetails;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedServer {
        details: SiteDetails,
        counts: StdMutex<VecDeque<u64>>,
        batches: StdMutex<VecDeque<Vec<IncomingRecord>>>,
        pushed: StdMutex<Vec<Value>>,
        acknowledged: StdMutex<Vec<String>>,
        dump_requested: AtomicBool,
        fail_auth: AtomicBool,
        fail_push: AtomicBool,
        // When set, push_records checks whether this store can be locked
        // while the request is in flight.
        watched_store: StdMutex<Option<Arc<Mutex<Store>>>>,
        store_free_during_push: AtomicBool,
    }

    impl SyncServer for ScriptedServer {
        async fn authenticate(&self, _connection: &SyncConnection) -> Result<SiteDetails> {
            if self.fail_auth.load(Ordering::SeqCst) {
                return Err(Error::InvalidCredentials("bad password".to_string()));
            }
            Ok(self.details.clone())
        }

        async fn queued_record_count(&self, _connection: &SyncConnection) -> Result<u64> {
            Ok(self.counts.lock().unwrap().pop_front().unwrap_or(0))
        }

        async fn queued_records(
            &self,
            _connection: &SyncConnection,
            limit: usize,
        ) -> Result<Vec<IncomingRecord>> {
            let mut batch = self
                .batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            batch.truncate(limit);
            Ok(batch)
        }

        async fn push_records(
            &self,
            _connection: &SyncConnection,
            records: &[OutgoingRecord],
        ) -> Result<()> {
            if self.fail_push.load(Ordering::SeqCst) {
                return Err(Error::ConnectionFailure("connection reset".to_string()));
            }
            if let Some(store) = self.watched_store.lock().unwrap().as_ref() {
                self.store_free_during_push
                    .store(store.try_lock().is_ok(), Ordering::SeqCst);
            }
            let mut pushed = self.pushed.lock().unwrap();
            for record in records {
                pushed.push(serde_json::to_value(record).unwrap());
            }
            Ok(())
        }

        async fn acknowledge_records(
            &self,
            _connection: &SyncConnection,
            sync_ids: &[String],
        ) -> Result<()> {
            self.acknowledged
                .lock()
                .unwrap()
                .extend(sync_ids.iter().cloned());
            Ok(())
        }

        async fn request_initial_dump(&self, _connection: &SyncConnection) -> Result<()> {
            self.dump_requested.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scripted_server() -> Arc<ScriptedServer> {
        Arc::new(ScriptedServer {
            details: SiteDetails {
                site_id: "17".to_string(),
                server_id: "1".to_string(),
                store_id: "store-1".to_string(),
            },
            ..ScriptedServer::default()
        })
    }

    fn shared_store() -> Arc<Mutex<Store>> {
        Arc::new(Mutex::new(Store::open_in_memory().unwrap()))
    }

    fn incoming_item(n: usize) -> IncomingRecord {
        IncomingRecord {
            sync_id: Some(format!("sync-{n}")),
            record_type: Some("item".to_string()),
            record_id: Some(format!("item-{n}")),
            sync_type: Some("I".to_string()),
            data: Some(
                json!({
                    "ID": format!("item-{n}"),
                    "code": format!("c{n}"),
                    "item_name": format!("Item {n}"),
                    "default_pack_size": "1"
                })
                .as_object()
                .unwrap()
                .clone(),
            ),
            ..IncomingRecord::default()
        }
    }

    fn local_requisition(id: &str) -> Entity {
        Entity::Requisition(Requisition {
            id: id.to_string(),
            status: Some("new".to_string()),
            ..Requisition::default()
        })
    }

    async fn initialised(
        store: &Arc<Mutex<Store>>,
        server: &Arc<ScriptedServer>,
    ) -> Synchroniser<Arc<ScriptedServer>> {
        let synchroniser = Synchroniser::new(Arc::clone(store), Arc::clone(server))
            .await
            .unwrap();
        synchroniser
            .initialise("https://sync.example.com", "clinic-a", "pw")
            .await
            .unwrap();
        synchroniser
    }

    #[test]
    fn batch_size_tracks_processing_speed() {
        // 50 records in 10s is 0.2s per record, so 25 fit in the target 5s.
        assert_eq!(next_batch_size(50, Duration::from_secs(10)), 25);
        // Fast batches are capped.
        assert_eq!(
            next_batch_size(500, Duration::from_secs(1)),
            MAX_SYNC_BATCH_SIZE
        );
        assert_eq!(next_batch_size(10, Duration::ZERO), MAX_SYNC_BATCH_SIZE);
        // Slow batches never shrink below the floor.
        assert_eq!(
            next_batch_size(10, Duration::from_secs(100)),
            MIN_SYNC_BATCH_SIZE
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn synchronise_requires_initialisation() {
        let synchroniser = Synchroniser::new(shared_store(), scripted_server())
            .await
            .unwrap();
        assert!(matches!(
            synchroniser.synchronise().await,
            Err(Error::NotInitialised)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initialise_authenticates_dumps_and_pulls() {
        let store = shared_store();
        let server = scripted_server();
        server.counts.lock().unwrap().extend([1, 0]);
        server
            .batches
            .lock()
            .unwrap()
            .push_back(vec![incoming_item(1)]);

        let synchroniser = initialised(&store, &server).await;

        assert!(server.dump_requested.load(Ordering::SeqCst));
        assert_eq!(
            server.acknowledged.lock().unwrap().as_slice(),
            ["sync-1".to_string()]
        );
        let store = synchroniser.store().await;
        assert!(store
            .get(RecordKind::Item, "item-1")
            .unwrap()
            .is_some());
        let settings = SyncSettings::load(&store).unwrap();
        assert!(settings.is_initialised);
        assert_eq!(settings.site_id.as_deref(), Some("17"));
        assert_eq!(settings.store_id.as_deref(), Some("store-1"));
        assert!(store.outbox().is_enabled());
        assert_eq!(synchroniser.status().state, SyncState::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_initialise_leaves_the_queue_disabled() {
        let store = shared_store();
        let server = scripted_server();
        server.fail_auth.store(true, Ordering::SeqCst);

        let synchroniser = Synchroniser::new(Arc::clone(&store), Arc::clone(&server))
            .await
            .unwrap();
        let result = synchroniser
            .initialise("https://sync.example.com", "clinic-a", "pw")
            .await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));

        let store = synchroniser.store().await;
        assert!(!SyncSettings::load(&store).unwrap().is_initialised);
        assert!(!store.outbox().is_enabled());
        assert_eq!(synchroniser.status().state, SyncState::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reinitialising_against_a_new_site_wipes_local_data() {
        let store = shared_store();
        {
            let mut guard = store.lock().await;
            guard
                .write(ChangeOrigin::Sync, |wtx| {
                    wtx.upsert(&local_requisition("r1"))
                })
                .unwrap();
            SyncSettings {
                url: Some("https://old.example.com".to_string()),
                site_name: Some("clinic-a".to_string()),
                ..SyncSettings::default()
            }
            .save(&guard)
            .unwrap();
        }

        let server = scripted_server();
        let synchroniser = initialised(&store, &server).await;

        assert!(server.dump_requested.load(Ordering::SeqCst));
        let store = synchroniser.store().await;
        assert!(store
            .get(RecordKind::Requisition, "r1")
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_drains_the_outbox() {
        let store = shared_store();
        let server = scripted_server();
        let synchroniser = initialised(&store, &server).await;

        {
            let mut store = synchroniser.store().await;
            store
                .write(ChangeOrigin::Local, |wtx| {
                    wtx.upsert(&local_requisition("r1"))
                })
                .unwrap();
            assert_eq!(store.outbox().len(&store).unwrap(), 1);
        }

        synchroniser.synchronise().await.unwrap();

        let pushed = server.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0]["RecordID"], "r1");
        assert_eq!(pushed[0]["RecordType"], "requisition");
        drop(pushed);

        let store = synchroniser.store().await;
        assert!(store.outbox().is_empty(&store).unwrap());
        assert!(!SyncSettings::load(&store).unwrap().prior_failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_drains_a_multi_batch_backlog() {
        let store = shared_store();
        let server = scripted_server();
        let synchroniser = initialised(&store, &server).await;

        // More entries than the starting batch size, so the queue drains
        // over several push requests.
        {
            let mut store = synchroniser.store().await;
            for n in 1..=25 {
                store
                    .write(ChangeOrigin::Local, |wtx| {
                        wtx.upsert(&local_requisition(&format!("r{n:02}")))
                    })
                    .unwrap();
            }
            assert_eq!(store.outbox().len(&store).unwrap(), 25);
        }

        synchroniser.synchronise().await.unwrap();

        let mut pushed_ids: Vec<String> = server
            .pushed
            .lock()
            .unwrap()
            .iter()
            .map(|record| record["RecordID"].as_str().unwrap().to_string())
            .collect();
        pushed_ids.sort();
        let expected: Vec<String> = (1..=25).map(|n| format!("r{n:02}")).collect();
        assert_eq!(pushed_ids, expected);

        let store = synchroniser.store().await;
        assert!(store.outbox().is_empty(&store).unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_stays_lockable_while_a_push_is_in_flight() {
        let store = shared_store();
        let server = scripted_server();
        let synchroniser = initialised(&store, &server).await;

        {
            let mut store = synchroniser.store().await;
            store
                .write(ChangeOrigin::Local, |wtx| {
                    wtx.upsert(&local_requisition("r1"))
                })
                .unwrap();
        }
        *server.watched_store.lock().unwrap() = Some(Arc::clone(&store));

        synchroniser.synchronise().await.unwrap();

        assert!(server.store_free_during_push.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_rechecks_the_backlog_after_draining() {
        let store = shared_store();
        let server = scripted_server();
        // 10 waiting at first, 4 more arrive during the pull.
        server.counts.lock().unwrap().extend([10, 4, 0]);
        {
            let mut batches = server.batches.lock().unwrap();
            batches.push_back((1..=10).map(incoming_item).collect());
            batches.push_back((11..=14).map(incoming_item).collect());
        }

        let synchroniser = initialised(&store, &server).await;

        assert_eq!(server.acknowledged.lock().unwrap().len(), 14);
        let status = synchroniser.status();
        assert_eq!(status.progress, 14);
        assert_eq!(status.total, 14);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_push_keeps_the_queue_and_the_prior_failed_flag() {
        let store = shared_store();
        let server = scripted_server();
        let synchroniser = initialised(&store, &server).await;

        {
            let mut store = synchroniser.store().await;
            store
                .write(ChangeOrigin::Local, |wtx| {
                    wtx.upsert(&local_requisition("r1"))
                })
                .unwrap();
        }
        server.fail_push.store(true, Ordering::SeqCst);

        let result = synchroniser.synchronise().await;
        assert!(matches!(result, Err(Error::ConnectionFailure(_))));

        let status = synchroniser.status();
        assert_eq!(status.state, SyncState::Failed);
        assert!(status.last_error.is_some());

        let store = synchroniser.store().await;
        assert!(SyncSettings::load(&store).unwrap().prior_failed);
        assert_eq!(store.outbox().len(&store).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_sync_runs_are_rejected() {
        let store = shared_store();
        let server = scripted_server();
        let synchroniser = initialised(&store, &server).await;

        let _running = synchroniser.begin().unwrap();
        assert!(matches!(
            synchroniser.synchronise().await,
            Err(Error::SyncInProgress)
        ));
    }
}
