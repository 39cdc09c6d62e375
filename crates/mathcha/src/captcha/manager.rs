//! CAPTCHA lifecycle manager.
//!
//! Each key moves `Pending → Ready → removed`. `generate` inserts a pending
//! record and hands it to a spawned rendering task, which runs the pipeline
//! without holding the lock and then settles the record: promoted with an
//! expiry timer, or removed along with its files.
//!
//! A pending record belongs to its rendering task until the task settles it.
//! `cleanup` only marks it cancelled, so the key stays in flight and no
//! second pipeline can start on the same files. Ready records are removed by
//! whichever of `cleanup` or the expiry timer gets there first, and files are
//! deleted under the write lock.

use chrono::{DateTime, TimeDelta, Utc};
use mathcha_common::constants::MAX_DRAW_ATTEMPTS;
use mathcha_common::{CaptchaError, CaptchaTicket, RecordState};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use super::CaptchaConfig;
use super::pipeline::{Toolchain, derive_key, wrap_document};
use crate::expr::{Expr, OperatorRegistry, generate_expression};

/// Decimal places beyond which f64 scaling stops being meaningful
const MAX_PLACES: u32 = 15;

/// A tracked CAPTCHA
struct CaptchaRecord {
    /// Distinguishes successive records that reuse the same key
    id: u64,
    expression: Expr,
    answer: f64,
    image_path: PathBuf,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    state: RecordState,
    /// Cleaned up while pending; the rendering task drops it when done
    cancelled: bool,
    expiry: Option<AbortHandle>,
}

impl CaptchaRecord {
    fn ticket(&self, key: &str) -> CaptchaTicket {
        let ready = self.state == RecordState::Ready;
        CaptchaTicket {
            key: key.to_string(),
            state: self.state,
            image_path: ready.then(|| self.image_path.display().to_string()),
            created_at: self.created_at.timestamp(),
            expires_at: self.expires_at.map(|at| at.timestamp()),
        }
    }
}

/// Expression drawn for a new CAPTCHA, before it is tracked
struct Draft {
    key: String,
    document: String,
    expression: Expr,
    answer: f64,
}

enum Reservation {
    /// A ready record already exists for this document
    Existing(String),
    /// A new pending record was inserted
    Fresh { draft: Draft, id: u64 },
}

struct Inner {
    config: CaptchaConfig,
    ttl: TimeDelta,
    operators: OperatorRegistry,
    toolchain: Toolchain,
    records: RwLock<HashMap<String, CaptchaRecord>>,
    next_id: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for record in self.records.get_mut().values() {
            if let Some(handle) = &record.expiry {
                handle.abort();
            }
        }
    }
}

/// Generates, tracks and verifies CAPTCHAs.
///
/// Cloning is cheap; clones share the same records.
#[derive(Clone)]
pub struct CaptchaManager {
    inner: Arc<Inner>,
}

impl CaptchaManager {
    /// Create a manager using the four arithmetic operators
    pub fn new(config: CaptchaConfig) -> Result<Self, CaptchaError> {
        Self::with_operators(config, OperatorRegistry::arithmetic())
    }

    /// Create a manager with a custom operator set.
    ///
    /// The registry is frozen from here on.
    pub fn with_operators(
        config: CaptchaConfig,
        operators: OperatorRegistry,
    ) -> Result<Self, CaptchaError> {
        let toolchain = Toolchain::from_config(&config)?;
        let ttl = expiry_delta(config.cleanup_secs)?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                ttl,
                operators,
                toolchain,
                records: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn config(&self) -> &CaptchaConfig {
        &self.inner.config
    }

    /// Generate a CAPTCHA and render its image. Resolves to the key once the
    /// image exists.
    ///
    /// If the drawn document is already tracked and ready, its key is
    /// returned as is. If it is still rendering, a new expression is drawn.
    /// Dropping the returned future does not abandon the render.
    pub async fn generate(&self) -> Result<String, CaptchaError> {
        let (draft, id) = match self.reserve().await? {
            Reservation::Existing(key) => return Ok(key),
            Reservation::Fresh { draft, id } => (draft, id),
        };

        let key = draft.key.clone();
        let manager = self.clone();

        // Detached, so the pending record is settled even if this future is dropped.
        let task = tokio::spawn(async move { manager.render(draft, id).await });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "CAPTCHA rendering task cancelled");
                Err(CaptchaError::Removed(key))
            }
        }
    }

    /// Rendered image path, once ready
    pub async fn image(&self, key: &str) -> Option<PathBuf> {
        let records = self.inner.records.read().await;
        records
            .get(key)
            .filter(|r| r.state == RecordState::Ready)
            .map(|r| r.image_path.clone())
    }

    /// Compare `answer` with the stored answer after rounding both to
    /// `places` decimals. Unknown keys never match.
    pub async fn check(&self, key: &str, answer: f64, places: u32) -> bool {
        let records = self.inner.records.read().await;
        records
            .get(key)
            .filter(|r| !r.cancelled)
            .is_some_and(|r| answers_match(r.answer, answer, places))
    }

    /// Stop tracking `key` and delete its files. No-op for unknown keys.
    ///
    /// A pending key disappears from lookups at once; its rendering task
    /// removes the files and resolves its `generate` call with `Removed`.
    pub async fn cleanup(&self, key: &str) {
        self.remove(key, None, true).await;
    }

    /// Public view of a tracked CAPTCHA
    pub async fn info(&self, key: &str) -> Option<CaptchaTicket> {
        let records = self.inner.records.read().await;
        records.get(key).filter(|r| !r.cancelled).map(|r| r.ticket(key))
    }

    /// The expression a CAPTCHA was generated from
    pub async fn expression(&self, key: &str) -> Option<Expr> {
        let records = self.inner.records.read().await;
        records
            .get(key)
            .filter(|r| !r.cancelled)
            .map(|r| r.expression.clone())
    }

    /// Number of tracked records, pending included
    pub async fn len(&self) -> usize {
        let records = self.inner.records.read().await;
        records.values().filter(|r| !r.cancelled).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn draft(&self) -> Result<Draft, CaptchaError> {
        let config = &self.inner.config;
        let expression = generate_expression(
            &self.inner.operators,
            config.min_ops,
            config.max_ops,
            &config.values,
            &mut rand::rng(),
        )?;

        let answer = expression.evaluate();
        let document = wrap_document(&expression.render());
        let key = derive_key(&document);

        Ok(Draft {
            key,
            document,
            expression,
            answer,
        })
    }

    async fn reserve(&self) -> Result<Reservation, CaptchaError> {
        let mut last_key = String::new();

        for attempt in 1..=MAX_DRAW_ATTEMPTS {
            let draft = self.draft()?;
            let mut records = self.inner.records.write().await;

            match records.get(&draft.key).map(|r| r.state) {
                Some(RecordState::Ready) => {
                    tracing::debug!(key = %draft.key, "Reusing ready CAPTCHA");
                    return Ok(Reservation::Existing(draft.key));
                }
                Some(RecordState::Pending) => {
                    tracing::debug!(key = %draft.key, attempt, "Key in flight, redrawing");
                    last_key = draft.key;
                }
                None => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    records.insert(
                        draft.key.clone(),
                        CaptchaRecord {
                            id,
                            expression: draft.expression.clone(),
                            answer: draft.answer,
                            image_path: self.inner.toolchain.image_path(&draft.key),
                            created_at: Utc::now(),
                            expires_at: None,
                            state: RecordState::Pending,
                            cancelled: false,
                            expiry: None,
                        },
                    );
                    return Ok(Reservation::Fresh { draft, id });
                }
            }
        }

        Err(CaptchaError::KeyCollision(last_key))
    }

    async fn render(&self, draft: Draft, id: u64) -> Result<String, CaptchaError> {
        tracing::debug!(key = %draft.key, "Rendering CAPTCHA");

        let outcome = self.inner.toolchain.run(&draft.key, &draft.document).await;
        if let Err(e) = &outcome {
            tracing::warn!(key = %draft.key, error = %e, "CAPTCHA pipeline failed");
        }

        self.settle(&draft.key, id, outcome.map(|_| ()))
            .await
            .map(|()| draft.key)
    }

    /// Finish a pipeline: promote its record, or drop the record and its files.
    async fn settle(
        &self,
        key: &str,
        id: u64,
        outcome: Result<(), CaptchaError>,
    ) -> Result<(), CaptchaError> {
        let mut records = self.inner.records.write().await;

        let Some(record) = records.get_mut(key).filter(|r| r.id == id) else {
            return Err(CaptchaError::Removed(key.to_string()));
        };

        if outcome.is_ok() && !record.cancelled {
            let ttl = self.inner.config.cleanup_secs;
            record.state = RecordState::Ready;
            record.expires_at = Utc::now().checked_add_signed(self.inner.ttl);
            record.expiry = Some(self.arm_expiry(key, id, Duration::from_secs(ttl)));

            tracing::debug!(key = %key, ttl_secs = ttl, "CAPTCHA ready");
            return Ok(());
        }

        let cancelled = record.cancelled;
        records.remove(key);
        self.inner.toolchain.remove_artifacts(key).await;

        if cancelled {
            tracing::debug!(key = %key, "CAPTCHA removed while rendering");
            return Err(CaptchaError::Removed(key.to_string()));
        }
        outcome
    }

    fn arm_expiry(&self, key: &str, id: u64, delay: Duration) -> AbortHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let key = key.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                tracing::debug!(key = %key, "CAPTCHA expired");
                CaptchaManager { inner }.remove(&key, Some(id), false).await;
            }
        })
        .abort_handle()
    }

    /// Take a ready record out of the map and delete its files, or mark a
    /// pending one cancelled for its rendering task to drop.
    ///
    /// With `id`, only that exact record is touched. `cancel_timer` must be
    /// false when called from the timer task itself, which would otherwise
    /// cancel its own cleanup.
    async fn remove(&self, key: &str, id: Option<u64>, cancel_timer: bool) {
        let mut records = self.inner.records.write().await;

        let Some(record) = records
            .get_mut(key)
            .filter(|r| id.is_none_or(|id| r.id == id))
        else {
            return;
        };

        if record.state == RecordState::Pending {
            if !record.cancelled {
                record.cancelled = true;
                tracing::debug!(key = %key, "Cancelling CAPTCHA still rendering");
            }
            return;
        }

        let Some(record) = records.remove(key) else {
            return;
        };

        if cancel_timer {
            if let Some(handle) = &record.expiry {
                handle.abort();
            }
        }

        // Still under the lock: no new pipeline can claim the key meanwhile.
        self.inner.toolchain.remove_artifacts(key).await;
        tracing::debug!(key = %key, "CAPTCHA cleaned up");
    }
}

/// Expiry offset for ticket timestamps; rejects values chrono cannot represent
fn expiry_delta(cleanup_secs: u64) -> Result<TimeDelta, CaptchaError> {
    i64::try_from(cleanup_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| {
            CaptchaError::InvalidConfig(format!("cleanup_secs {} is out of range", cleanup_secs))
        })
}

/// Scale both values by `10^places`, round to the nearest integer, compare.
///
/// `places` is capped at 15. Values that overflow once scaled never match.
pub fn answers_match(expected: f64, given: f64, places: u32) -> bool {
    let scale = 10f64.powi(places.min(MAX_PLACES) as i32);
    let (expected, given) = ((expected * scale).round(), (given * scale).round());
    expected.is_finite() && given.is_finite() && expected == given
}
