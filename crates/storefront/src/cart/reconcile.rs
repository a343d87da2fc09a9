//! One-shot merge of the guest cart into the remote cart.
//!
//! The trigger is an explicit state machine stored with the device data:
//!
//! ```text
//! Guest --token seen--> Reconciling --merge ok--> Authenticated
//!   ^                        |
//!   +------merge failed------+
//! ```
//!
//! Any request without a token puts the session back in `Guest`, so the next
//! sign-in reconciles again.
//!
//! Concurrent requests from one device each carry their own copy of the
//! device data, so the stored phase alone cannot stop two of them merging.
//! Merges are serialized per device through an in-process gate that also
//! remembers whether the device has been merged since it was last a guest.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use cartwheel_core::EnrichedCart;

use super::error::CartError;
use super::local::{DeviceCartStore, DeviceStorage, LocalCartStore};
use crate::models::{SessionToken, session_keys};
use crate::upstream::{RemoteCart, UpstreamError};

/// Where a session stands with respect to guest cart reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session token seen; the guest cart is authoritative.
    #[default]
    Guest,
    /// A merge is in flight.
    Reconciling,
    /// The guest cart has been merged; the remote cart is authoritative.
    Authenticated,
}

impl SessionPhase {
    /// Whether a request in this phase should start a merge.
    #[must_use]
    pub const fn should_reconcile(self, authenticated: bool) -> bool {
        authenticated && matches!(self, Self::Guest)
    }

    /// Phase after a merge attempt.
    #[must_use]
    pub const fn after_merge(succeeded: bool) -> Self {
        if succeeded {
            Self::Authenticated
        } else {
            Self::Guest
        }
    }

    /// Read the phase from device storage. Missing or corrupt reads as `Guest`.
    pub async fn load(storage: &dyn DeviceStorage) -> Self {
        match storage.load(session_keys::SESSION_PHASE).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => Self::Guest,
            Err(err) => {
                warn!(error = %err, "Failed to load session phase, assuming guest");
                Self::Guest
            }
        }
    }

    /// Persist the phase to device storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot store the value.
    pub async fn store(self, storage: &dyn DeviceStorage) -> Result<(), CartError> {
        storage
            .save(
                session_keys::SESSION_PHASE,
                serde_json::to_value(self).map_err(super::local::StorageError::from)?,
            )
            .await?;
        Ok(())
    }
}

/// Outcome of [`CartReconciler::ensure`] for an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// The session was already reconciled, by this request's device data or
    /// by a concurrent request from the same device.
    Already,
    /// The guest cart was empty; nothing was sent upstream.
    NothingToMerge,
    /// The guest cart was merged; carries the resulting remote cart.
    Merged(EnrichedCart),
    /// The cart service accepted the merge but the resulting cart could not
    /// be read. The guest cart is cleared all the same.
    MergedUnread,
}

/// Devices tracked by the merge gate.
const GATE_CAPACITY: u64 = 100_000;

/// A gate nobody has touched for this long is dropped; by then the stored
/// phase has caught up.
const GATE_IDLE: Duration = Duration::from_secs(600);

/// Per-device lock; the flag records a merge since the device was last a guest.
type Gate = Arc<Mutex<bool>>;

/// Merges the guest cart into the remote cart exactly once per sign-in.
#[derive(Clone)]
pub struct CartReconciler {
    remote: Arc<dyn RemoteCart>,
    gates: Cache<String, Gate>,
}

impl CartReconciler {
    /// Create a reconciler against the given remote cart.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteCart>) -> Self {
        Self {
            remote,
            gates: Cache::builder()
                .max_capacity(GATE_CAPACITY)
                .time_to_idle(GATE_IDLE)
                .build(),
        }
    }

    async fn gate(&self, storage: &dyn DeviceStorage) -> Option<Gate> {
        let device_id = storage.device_id()?;
        Some(
            self.gates
                .get_with(device_id, async { Arc::new(Mutex::new(false)) })
                .await,
        )
    }

    /// Drive the state machine for a request carrying `token`.
    ///
    /// # Errors
    ///
    /// - [`CartError::Unauthenticated`] if the cart service rejects the token
    /// - [`CartError::ReconciliationFailed`] if the merge fails; the guest cart
    ///   is left untouched and the next request retries
    ///
    /// A merge the cart service accepted counts as done even when no cart
    /// came back ([`Reconciled::MergedUnread`]).
    #[instrument(skip_all)]
    pub async fn ensure(
        &self,
        storage: &dyn DeviceStorage,
        token: &SessionToken,
    ) -> Result<Reconciled, CartError> {
        let gate = self.gate(storage).await;
        let mut merged = match &gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let phase = SessionPhase::load(storage).await;
        if merged.as_deref() == Some(&true) {
            if phase != SessionPhase::Authenticated {
                debug!(?phase, "Device merged by a concurrent request");
                DeviceCartStore::new(storage).clear().await?;
                SessionPhase::Authenticated.store(storage).await?;
            }
            return Ok(Reconciled::Already);
        }
        if !phase.should_reconcile(true) {
            debug!(?phase, "No reconciliation needed");
            return Ok(Reconciled::Already);
        }

        SessionPhase::Reconciling.store(storage).await?;
        let outcome = self.reconcile(&DeviceCartStore::new(storage), token).await;
        let phase = SessionPhase::after_merge(outcome.is_ok());
        if let Some(merged) = merged.as_deref_mut() {
            *merged = phase == SessionPhase::Authenticated;
        }
        phase.store(storage).await?;
        outcome
    }

    /// Mark the session as unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot store the phase.
    pub async fn reset(&self, storage: &dyn DeviceStorage) -> Result<(), CartError> {
        if let Some(device_id) = storage.device_id() {
            if let Some(gate) = self.gates.get(&device_id).await {
                *gate.lock().await = false;
            }
        }
        if SessionPhase::load(storage).await != SessionPhase::Guest {
            debug!("Session token gone, returning to guest phase");
            SessionPhase::Guest.store(storage).await?;
        }
        Ok(())
    }

    /// Merge `local` into the remote cart and clear it on success.
    ///
    /// # Errors
    ///
    /// See [`CartReconciler::ensure`].
    pub async fn reconcile(
        &self,
        local: &dyn LocalCartStore,
        token: &SessionToken,
    ) -> Result<Reconciled, CartError> {
        let guest = local.read().await;
        if guest.is_empty() {
            return Ok(Reconciled::NothingToMerge);
        }

        let merged = match self.remote.merge_lines(token, guest.lines()).await {
            Ok(merged) => Reconciled::Merged(merged),
            Err(UpstreamError::Unauthorized) => return Err(CartError::Unauthenticated),
            Err(err) if err.change_committed() => {
                warn!(error = %err, "Guest cart merge accepted but the result was unreadable");
                Reconciled::MergedUnread
            }
            Err(err) => {
                warn!(error = %err, lines = guest.len(), "Guest cart merge failed");
                return Err(CartError::ReconciliationFailed(err));
            }
        };

        // The merge is committed upstream at this point; a failed clear must
        // not send the session back to Guest.
        if let Err(err) = local.clear().await {
            error!(error = %err, "Guest cart merged but could not be cleared");
        }

        info!(
            lines = guest.len(),
            units = guest.total_quantity(),
            "Guest cart merged into remote cart"
        );
        Ok(merged)
    }
}
