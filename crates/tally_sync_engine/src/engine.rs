//! Sync engine state machine.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::debounce::DebounceTimer;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tally_document::{DocumentError, DocumentResult, Origin, ReplicatedDocument};
use tally_sync_protocol::{PullRequest, PushRequest, PushUpdate};
use tally_update_log::{CursorStore, LogError, UpdateLog};

/// The UI-facing status of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle in flight.
    Idle,
    /// A push/pull cycle is in flight.
    Syncing,
    /// The last cycle failed; clears on the next successful cycle.
    Error,
}

impl SyncState {
    /// Returns true if a cycle is in flight.
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if the last cycle failed.
    pub fn is_error(&self) -> bool {
        matches!(self, SyncState::Error)
    }
}

/// Counters accumulated across sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles attempted (successful or not).
    pub cycles_completed: u64,
    /// Total updates pushed.
    pub updates_pushed: u64,
    /// Total updates pulled and applied.
    pub updates_pulled: u64,
    /// Premium bootstrap pushes performed.
    pub bootstraps_completed: u64,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
}

/// Result of one sync cycle.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Updates pushed this cycle.
    pub pushed: u64,
    /// Updates pulled and applied this cycle.
    pub pulled: u64,
    /// Whether a premium bootstrap ran this cycle.
    pub bootstrapped: bool,
    /// Whether the cycle succeeded.
    pub success: bool,
    /// Failure message when `success` is false.
    pub error: Option<String>,
    /// True when this caller was handed the outcome of a cycle that was
    /// already in flight when it asked, instead of running its own.
    pub coalesced: bool,
}

/// Orchestrates replication between the local ledger and the remote
/// authority.
///
/// The engine owns the document handle for its process lifetime. Local
/// edits go through [`edit`](SyncEngine::edit), which takes the same lock
/// remote application takes, so the two never interleave on one document.
///
/// Cycles are single-flight: one attempt in flight per engine, and a
/// trigger arriving during `Syncing` awaits that attempt's outcome rather
/// than starting a duplicate.
pub struct SyncEngine<D, T, L, C>
where
    D: ReplicatedDocument + Send,
    T: SyncTransport,
    L: UpdateLog + 'static,
    C: CursorStore,
{
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<T>,
    log: Arc<L>,
    cursors: Arc<C>,
    document: Arc<Mutex<D>>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    debounce: Arc<Mutex<DebounceTimer>>,
    /// Outcome of the most recently finished cycle. Held for the whole
    /// cycle, which is what serializes attempts.
    cycle: Mutex<Option<SyncOutcome>>,
    finished_cycles: AtomicU64,
}

impl<D, T, L, C> SyncEngine<D, T, L, C>
where
    D: ReplicatedDocument + Send,
    T: SyncTransport,
    L: UpdateLog + 'static,
    C: CursorStore,
{
    /// Creates an engine using the system wall clock.
    pub fn new(
        config: SyncConfig,
        transport: Arc<T>,
        log: Arc<L>,
        cursors: Arc<C>,
        document: D,
    ) -> Self {
        Self::with_clock(config, transport, log, cursors, document, Arc::new(SystemClock))
    }

    /// Creates an engine with an explicit clock (used by tests).
    pub fn with_clock(
        config: SyncConfig,
        transport: Arc<T>,
        log: Arc<L>,
        cursors: Arc<C>,
        mut document: D,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let debounce = Arc::new(Mutex::new(DebounceTimer::new(config.debounce_window)));

        // Local-origin deltas are logged durably before the edit returns;
        // sync-origin deltas are dropped here, which is the only thing
        // stopping a pulled update from being pushed back out.
        {
            let log = Arc::clone(&log);
            let debounce = Arc::clone(&debounce);
            let device_id = config.device_id.clone();
            document.subscribe(Box::new(move |delta, origin| {
                if !origin.is_local() {
                    return Ok(());
                }
                log.append(delta.to_vec(), &device_id)
                    .map_err(|e| Box::new(e) as tally_document::ObserverError)?;
                debounce.lock().poke(Instant::now());
                Ok(())
            }));
        }

        Self {
            config,
            clock,
            transport,
            log,
            cursors,
            document: Arc::new(Mutex::new(document)),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            debounce,
            cycle: Mutex::new(None),
            finished_cycles: AtomicU64::new(0),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns accumulated counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mutates the local document.
    ///
    /// Takes the document lock, so an edit never interleaves with an
    /// in-flight remote apply. The mutation is saved (durably logged)
    /// when this returns `Ok`; a log failure surfaces here as
    /// [`SyncError::Storage`] and the edit is not considered saved.
    pub fn edit<R>(&self, f: impl FnOnce(&mut D) -> DocumentResult<R>) -> SyncResult<R> {
        let mut document = self.document.lock();
        f(&mut document).map_err(|e| {
            let err = map_document_error(e);
            if matches!(err, SyncError::Storage(_)) {
                *self.state.write() = SyncState::Error;
            }
            err
        })
    }

    /// Reads the local document.
    pub fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.document.lock())
    }

    /// Pumps the debounce timer and opportunistic maintenance.
    ///
    /// Hosts call this from their event loop. Returns `Some` when a cycle
    /// ran.
    pub fn tick(&self) -> SyncResult<Option<SyncOutcome>> {
        self.tick_at(Instant::now())
    }

    /// [`tick`](SyncEngine::tick) with an explicit notion of now.
    pub fn tick_at(&self, now: Instant) -> SyncResult<Option<SyncOutcome>> {
        self.maybe_prune();

        if !self.debounce.lock().fire_if_due(now) {
            return Ok(None);
        }
        if self.log.list_unsynced()?.is_empty() {
            return Ok(None);
        }
        self.sync().map(Some)
    }

    /// Runs one sync cycle: bootstrap if due, push, then pull.
    ///
    /// Single-flight: if a cycle is already in flight this call blocks
    /// until it finishes and returns that cycle's outcome with
    /// `coalesced` set, without starting another attempt.
    pub fn sync(&self) -> SyncResult<SyncOutcome> {
        let observed = self.finished_cycles.load(Ordering::SeqCst);
        let mut slot = self.cycle.lock();

        if self.finished_cycles.load(Ordering::SeqCst) > observed {
            // A cycle finished while we waited for the lock; share it.
            if let Some(outcome) = slot.as_ref() {
                let mut outcome = outcome.clone();
                outcome.coalesced = true;
                return Ok(outcome);
            }
        }

        *self.state.write() = SyncState::Syncing;
        tracing::debug!(device_id = %self.config.device_id, "sync cycle started");

        let result = self.run_cycle();
        let outcome = match &result {
            Ok(outcome) => outcome.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "sync cycle failed");
                SyncOutcome {
                    pushed: 0,
                    pulled: 0,
                    bootstrapped: false,
                    success: false,
                    error: Some(e.to_string()),
                    coalesced: false,
                }
            }
        };

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.updates_pushed += outcome.pushed;
            stats.updates_pulled += outcome.pulled;
            if outcome.bootstrapped {
                stats.bootstraps_completed += 1;
            }
            stats.last_error = outcome.error.clone();
        }
        *self.state.write() = if outcome.success {
            SyncState::Idle
        } else {
            SyncState::Error
        };

        *slot = Some(outcome);
        self.finished_cycles.fetch_add(1, Ordering::SeqCst);

        result
    }

    /// Zeroes both sync watermarks (debug/recovery operation).
    ///
    /// The next pull re-fetches from the beginning of time; re-applying
    /// already-merged deltas is harmless.
    pub fn reset_sync_state(&self) -> SyncResult<()> {
        self.cursors.reset()?;
        *self.state.write() = SyncState::Idle;
        Ok(())
    }

    fn run_cycle(&self) -> SyncResult<SyncOutcome> {
        let bootstrapped = self.bootstrap_if_due()?;
        let pushed = self.push_pending()?;
        let pulled = self.pull_remote()?;

        tracing::info!(pushed, pulled, bootstrapped, "sync cycle completed");
        Ok(SyncOutcome {
            pushed,
            pulled,
            bootstrapped,
            success: true,
            error: None,
            coalesced: false,
        })
    }

    /// Pushes the full current snapshot once per premium activation.
    ///
    /// Devices that never synced while on the free tier have local state
    /// that was never logged as deltas; the snapshot push contributes it
    /// exactly once after upgrade.
    fn bootstrap_if_due(&self) -> SyncResult<bool> {
        let Some(activated_at) = self.config.premium_activated_at else {
            return Ok(false);
        };
        if self.cursors.last_premium_sync()? >= activated_at {
            return Ok(false);
        }

        let snapshot = self
            .document
            .lock()
            .encode_snapshot()
            .map_err(map_document_error)?;

        if snapshot.is_empty() {
            // Nothing to contribute, but the watermark still advances so
            // an empty account does not retry this every session.
            tracing::debug!("bootstrap skipped for empty document");
        } else {
            tracing::info!(bytes = snapshot.len(), "pushing bootstrap snapshot");
            let request = PushRequest::new(vec![PushUpdate {
                payload: snapshot,
                timestamp_ms: self.clock.now_ms(),
                device_id: self.config.device_id.clone(),
            }]);
            let response = self.transport.push(&request)?;
            if !response.success {
                return Err(SyncError::Server(
                    response.error.unwrap_or_else(|| "bootstrap rejected".into()),
                ));
            }
        }

        self.cursors.set_last_premium_sync(self.clock.now_ms())?;
        Ok(true)
    }

    fn push_pending(&self) -> SyncResult<u64> {
        let batch = self.log.list_unsynced()?;
        if batch.is_empty() {
            return Ok(0);
        }

        let ids: Vec<u64> = batch.iter().map(|r| r.local_id).collect();
        let updates: Vec<PushUpdate> = batch
            .into_iter()
            .map(|record| PushUpdate {
                payload: record.payload,
                timestamp_ms: record.created_at_local,
                device_id: record.device_id,
            })
            .collect();

        tracing::debug!(count = ids.len(), "pushing unsynced updates");
        let response = self.transport.push(&PushRequest::new(updates))?;
        if !response.success {
            return Err(SyncError::Server(
                response.error.unwrap_or_else(|| "push rejected".into()),
            ));
        }

        // Mark exactly the ids included in this request; a record appended
        // while the push was in flight stays unsynced.
        if let Err(e) = self.log.mark_synced(&ids) {
            tracing::warn!(error = %e, "mark_synced failed; records will be redelivered");
        }
        Ok(ids.len() as u64)
    }

    fn pull_remote(&self) -> SyncResult<u64> {
        let since = self.cursors.last_sync()?;
        let request = PullRequest::new((since > 0).then_some(since));
        let response = self.transport.pull(&request)?;

        if response.updates.is_empty() {
            return Ok(0);
        }

        {
            let mut document = self.document.lock();
            for update in &response.updates {
                document
                    .apply_delta(&update.payload, Origin::Sync)
                    .map_err(map_document_error)?;
            }
        }

        // Advance only after the whole batch is applied; a crash before
        // this point re-pulls the batch, and apply is idempotent.
        if let Some(max_created_at) = response.max_created_at() {
            if max_created_at > since {
                self.cursors.set_last_sync(max_created_at)?;
            }
        }
        Ok(response.updates.len() as u64)
    }

    fn maybe_prune(&self) {
        let Some(age) = self.config.prune_after else {
            return;
        };
        let bound = self.clock.now_ms() - age.as_millis() as i64;
        match self.log.prune(bound) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "pruned synced records"),
            Err(e) => tracing::warn!(error = %e, "prune failed; retrying next tick"),
        }
    }
}

/// Unwraps log failures smuggled through the document's observer channel.
fn map_document_error(e: DocumentError) -> SyncError {
    match e {
        DocumentError::Observer(inner) => match inner.downcast::<LogError>() {
            Ok(log_err) => SyncError::Storage(*log_err),
            Err(other) => SyncError::Apply(DocumentError::Observer(other)),
        },
        other => SyncError::Apply(other),
    }
}
