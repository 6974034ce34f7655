//! Round-robin credential selection and blocking execution
//!
//! The pool owns an ordered list of credentials, each bound to its own client
//! handle, plus a per-member status. Selection advances a single shared
//! cursor, so concurrent callers interleave but never skip or repeat a member
//! out of order.
//!
//! `execute` keeps trying until the operation succeeds, fails fatally, or is
//! cancelled:
//! - each rotation tries every active member once, starting after the cursor
//! - a member rejected with Unauthorized is disabled and skipped from then on
//! - after a rotation with no success the pool sleeps for `backoff`
//!
//! There is no retry ceiling; bound a call with a `Cancellation` instead.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};
use twitter_api::{ApiError, ApiResult, CredentialRecord, ErrorKind, TwitterApi};

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::operation::{ApiResponse, Operation};

/// Wait after a full rotation of failures.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(15);

/// Runtime status of a pool member.
///
/// Transitions:
/// - Active → Disabled (credential rejected with 401)
/// - Disabled is final for the life of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Active,
    Disabled,
}

impl MemberStatus {
    /// Status label for summaries and logging.
    pub fn label(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Disabled => "disabled",
        }
    }
}

/// One validated credential and the client built from it.
pub struct Credential<C> {
    label: String,
    client: Arc<C>,
}

impl<C> Credential<C> {
    pub fn new(label: impl Into<String>, client: C) -> Self {
        Self {
            label: label.into(),
            client: Arc::new(client),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

/// Credential pool with round-robin selection and blocking retry.
///
/// The member list is fixed at construction. `cursor` stores the index of the
/// last member handed out plus one, with 0 meaning nothing selected yet.
pub struct CredentialPool<C> {
    members: Vec<Credential<C>>,
    statuses: RwLock<Vec<MemberStatus>>,
    cursor: AtomicUsize,
    backoff: Duration,
}

impl<C> CredentialPool<C> {
    /// Create a pool from already-built members, in order.
    pub fn new(members: Vec<Credential<C>>, backoff: Duration) -> Self {
        let statuses = vec![MemberStatus::Active; members.len()];
        info!(
            credentials = members.len(),
            backoff_secs = backoff.as_secs(),
            "credential pool initialized"
        );
        Self {
            members,
            statuses: RwLock::new(statuses),
            cursor: AtomicUsize::new(0),
            backoff,
        }
    }

    /// Build a pool from credential records.
    ///
    /// `build` turns a record into a client; a record it rejects is logged
    /// and left out. Surviving records keep their input order. Zero
    /// survivors yields an empty pool, whose `execute` fails immediately.
    pub fn from_records<E, F>(records: Vec<CredentialRecord>, backoff: Duration, mut build: F) -> Self
    where
        F: FnMut(CredentialRecord) -> std::result::Result<C, E>,
        E: Display,
    {
        let mut members = Vec::with_capacity(records.len());
        for record in records {
            let label = record.label().to_string();
            match build(record) {
                Ok(client) => members.push(Credential::new(label, client)),
                Err(e) => warn!(credential = %label, error = %e, "discarding invalid credential"),
            }
        }
        Self::new(members, backoff)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Index of the member most recently selected, `None` before the first
    /// selection.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor.load(Ordering::Acquire).checked_sub(1)
    }

    /// Advance the cursor and return the member it now points at.
    ///
    /// Ignores member status; `execute` skips disabled members itself.
    pub fn select_next(&self) -> Option<&Credential<C>> {
        self.advance().map(|index| &self.members[index])
    }

    pub fn status(&self, index: usize) -> Option<MemberStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .copied()
    }

    pub fn active_count(&self) -> usize {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| **s == MemberStatus::Active)
            .count()
    }

    /// Pool summary as JSON for the status command and logs.
    ///
    /// Status is "healthy" if every member is active, "degraded" if some
    /// are, "unhealthy" if none (or the pool is empty).
    pub fn summary(&self) -> serde_json::Value {
        let statuses = self
            .statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let active = statuses
            .iter()
            .filter(|s| **s == MemberStatus::Active)
            .count();
        let total = self.members.len();
        let overall = if total > 0 && active == total {
            "healthy"
        } else if active > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        let credentials: Vec<serde_json::Value> = self
            .members
            .iter()
            .zip(statuses.iter())
            .map(|(member, status)| {
                serde_json::json!({
                    "label": member.label,
                    "status": status.label(),
                })
            })
            .collect();

        serde_json::json!({
            "status": overall,
            "credentials_total": total,
            "credentials_active": active,
            "credentials_disabled": total - active,
            "cursor": self.cursor(),
            "backoff_secs": self.backoff.as_secs(),
            "credentials": credentials,
        })
    }

    /// Run `op` against successive members until it succeeds.
    ///
    /// The closure gets the selected member's client handle and is called
    /// once per attempt. Errors are handled by `ApiError::kind`: retryable
    /// kinds rotate, Unauthorized disables the member and rotates, Fatal is
    /// returned at once.
    pub async fn execute_with<T, F, Fut>(&self, cancel: &Cancellation, op: F) -> Result<T>
    where
        F: Fn(Arc<C>) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if self.members.is_empty() {
            return Err(Error::NoCredentials("credential pool is empty".into()));
        }

        let mut rotation: u64 = 0;
        loop {
            rotation += 1;
            let mut last_error: Option<ApiError> = None;

            for _ in 0..self.members.len() {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let Some(index) = self.advance() else {
                    return Err(Error::NoCredentials("credential pool is empty".into()));
                };
                if self.status(index) != Some(MemberStatus::Active) {
                    continue;
                }
                let member = &self.members[index];

                let outcome = tokio::select! {
                    result = op(Arc::clone(&member.client)) => result,
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                };

                match outcome {
                    Ok(value) => {
                        metrics::counter!("pool_attempts_total", "outcome" => "success").increment(1);
                        debug!(credential = %member.label, rotation, "operation succeeded");
                        return Ok(value);
                    }
                    Err(e) => {
                        metrics::counter!("pool_attempts_total", "outcome" => e.kind.label())
                            .increment(1);
                        if e.kind.is_retryable() {
                            warn!(
                                credential = %member.label,
                                kind = e.kind.label(),
                                error = %e,
                                "attempt failed, rotating credential"
                            );
                        } else if e.kind == ErrorKind::Unauthorized {
                            warn!(
                                credential = %member.label,
                                error = %e,
                                "credential rejected, disabling"
                            );
                            self.disable(index);
                        } else {
                            debug!(credential = %member.label, error = %e, "fatal error, not retrying");
                            return Err(Error::Api(e));
                        }
                        last_error = Some(e);
                    }
                }
            }

            if self.active_count() == 0 {
                let detail = match last_error {
                    Some(e) => format!("all {} credentials disabled, last error: {e}", self.members.len()),
                    None => format!("all {} credentials disabled", self.members.len()),
                };
                return Err(Error::NoCredentials(detail));
            }

            metrics::counter!("pool_backoffs_total").increment(1);
            info!(
                rotation,
                backoff_secs = self.backoff.as_secs(),
                "all credentials failed, backing off"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.backoff) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    fn advance(&self) -> Option<usize> {
        let n = self.members.len();
        if n == 0 {
            return None;
        }
        let previous = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |stored| {
                Some(if stored == 0 { 1 } else { stored % n + 1 })
            })
            .unwrap_or_else(|stored| stored);
        Some(if previous == 0 { 0 } else { previous % n })
    }

    fn disable(&self, index: usize) {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = statuses.get_mut(index) {
            *status = MemberStatus::Disabled;
        }
    }
}

impl<C: TwitterApi + 'static> CredentialPool<C> {
    /// Run a typed operation with rotation and backoff.
    pub async fn execute(&self, cancel: &Cancellation, operation: &Operation<C>) -> Result<ApiResponse> {
        debug!(operation = operation.name(), "executing pooled operation");
        match operation {
            Operation::Call(call) => {
                self.execute_with(cancel, |client| {
                    let call = call.clone();
                    async move { call.dispatch(client.as_ref()).await }
                })
                .await
            }
            Operation::Callback(callback) => self.execute_with(cancel, |client| callback(client)).await,
        }
    }
}
