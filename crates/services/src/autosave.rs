//! Best-effort persistence of in-progress survey state.
//!
//! The tracker pushes snapshots to the remote store without ever blocking the
//! respondent: update and completion failures are reported through the event
//! sink and structured logs, never surfaced as errors. Only `start` can fail,
//! because without a session id autosave cannot function for the attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clinic_core::backoff::RetryPolicy;
use clinic_core::model::{SessionId, SurveyProgress};
use storage::repository::SessionStore;

use crate::error::AutosaveError;
use crate::events::{EventSink, NullSink, ProgressEvent, SkipReason};
use crate::progress_api::ProgressApi;
use crate::retry::RetryingCallExecutor;

/// Tracks one browsing context's autosave session.
///
/// Reuses the cached session id across restarts (idempotent `start`),
/// serializes update pushes so an older snapshot can never overwrite a newer
/// one, and discards pushes that outlive their session.
pub struct ProgressAutosaveTracker {
    api: Arc<dyn ProgressApi>,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn EventSink>,
    create_executor: RetryingCallExecutor<SessionId>,
    // Ticket counter for update ordering; the latest assigned ticket wins.
    update_seq: AtomicU64,
    // Serializes sends so snapshots reach the backend in ticket order.
    send_lock: tokio::sync::Mutex<()>,
}

impl ProgressAutosaveTracker {
    #[must_use]
    pub fn new(api: Arc<dyn ProgressApi>, store: Arc<dyn SessionStore>) -> Self {
        Self::with_policy(api, store, RetryPolicy::default())
    }

    #[must_use]
    pub fn with_policy(
        api: Arc<dyn ProgressApi>,
        store: Arc<dyn SessionStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            store,
            sink: Arc::new(NullSink),
            create_executor: RetryingCallExecutor::new(policy),
            update_seq: AtomicU64::new(0),
            send_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Subscribe an event sink for autosave lifecycle notifications.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Begin (or resume) autosave for the given attempt.
    ///
    /// When a session id is already cached this adopts it into `progress` and
    /// returns without touching the network, so re-renders and reloads never
    /// create duplicate sessions. Otherwise the remote record is created with
    /// bounded retry and the minted id is cached.
    ///
    /// # Errors
    ///
    /// Returns `AutosaveError` once creation retries are exhausted or the id
    /// cannot be cached. Callers should proceed without autosave rather than
    /// treat this as fatal.
    pub async fn start(&self, progress: &mut SurveyProgress) -> Result<SessionId, AutosaveError> {
        if let Some(existing) = self.store.get().await? {
            tracing::debug!(session_id = %existing, "resuming cached autosave session");
            progress.adopt_session(existing.clone());
            return Ok(existing);
        }

        let api = Arc::clone(&self.api);
        let snapshot = progress.clone();
        let minted = self
            .create_executor
            .handle_call(move || {
                let api = Arc::clone(&api);
                let snapshot = snapshot.clone();
                async move { api.create_progress(&snapshot).await }
            })
            .await?;

        self.store.set(&minted).await?;
        progress.adopt_session(minted.clone());
        tracing::debug!(session_id = %minted, "autosave session created");
        Ok(minted)
    }

    /// Push the latest snapshot to the remote store, best effort.
    ///
    /// Never fails and never retries on its own; the next user action
    /// supersedes a failed push. Pushes are serialized in submission order,
    /// a snapshot superseded before sending is dropped, and a snapshot whose
    /// session is no longer active is discarded.
    pub async fn update(&self, progress: &SurveyProgress) {
        let ticket = self.update_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = progress.clone();

        let _guard = self.send_lock.lock().await;

        if self.update_seq.load(Ordering::SeqCst) > ticket {
            self.sink.publish(&ProgressEvent::AutosaveSkipped {
                session_id: snapshot.session_id().clone(),
                reason: SkipReason::Superseded,
            });
            return;
        }

        let active = self.store.get().await.ok().flatten();
        if active.as_ref() != Some(snapshot.session_id()) {
            tracing::debug!(
                session_id = %snapshot.session_id(),
                "dropping autosave push for inactive session"
            );
            self.sink.publish(&ProgressEvent::AutosaveSkipped {
                session_id: snapshot.session_id().clone(),
                reason: SkipReason::StaleSession,
            });
            return;
        }

        match self
            .api
            .update_progress(snapshot.session_id(), &snapshot)
            .await
        {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {
                tracing::warn!(session_id = %snapshot.session_id(), "autosave session expired server-side");
                self.sink.publish(&ProgressEvent::SessionExpired {
                    session_id: snapshot.session_id().clone(),
                });
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %snapshot.session_id(),
                    kind = %error.kind,
                    "autosave push failed"
                );
                self.sink.publish(&ProgressEvent::AutosaveFailed {
                    session_id: snapshot.session_id().clone(),
                    kind: error.kind,
                });
            }
        }
    }

    /// Tear down the session after a successful submission.
    ///
    /// Remote deletion is best effort (orphan cleanup is a backend concern);
    /// the local id is always cleared so the next survey starts fresh.
    pub async fn complete(&self) {
        let current = match self.store.get().await {
            Ok(current) => current,
            Err(error) => {
                tracing::warn!(%error, "could not read cached session during completion");
                None
            }
        };

        if let Some(session_id) = current {
            if let Err(error) = self.api.delete_progress(&session_id).await {
                tracing::warn!(
                    session_id = %session_id,
                    kind = %error.kind,
                    "failed to delete remote progress record"
                );
                self.sink.publish(&ProgressEvent::AutosaveFailed {
                    session_id: session_id.clone(),
                    kind: error.kind,
                });
            }
            self.sink.publish(&ProgressEvent::SessionCompleted {
                session_id: session_id.clone(),
            });
        }

        self.clear_session().await;
    }

    /// The cached session id, if an attempt is active.
    ///
    /// Store failures are treated as "no session" and logged.
    pub async fn current_session_id(&self) -> Option<SessionId> {
        match self.store.get().await {
            Ok(current) => current,
            Err(error) => {
                tracing::warn!(%error, "could not read cached session id");
                None
            }
        }
    }

    /// Drop the local session without remote deletion (abandonment/logout).
    pub async fn clear_session(&self) {
        // Invalidate in-flight pushes before clearing the cached id.
        self.update_seq.fetch_add(1, Ordering::SeqCst);
        if let Err(error) = self.store.clear().await {
            tracing::warn!(%error, "failed to clear cached session id");
        }
    }
}
