use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::auth::TokenAuthority;
use crate::config::WorkerConfig;
use crate::logs::AuditLog;
use crate::store::{CHECKS, RecordStore};

use super::outcome::OutcomeProcessor;
use super::prober::Prober;
use super::validation;

/// Background worker: periodic check sweep, token sweep and log rotation.
///
/// The three loops are independent and share no lock; each runs once
/// immediately on spawn, then on its own interval.
pub struct Worker {
    store: Arc<dyn RecordStore>,
    logs: Arc<AuditLog>,
    auth: Arc<TokenAuthority>,
    prober: Arc<Prober>,
    processor: Arc<OutcomeProcessor>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        logs: Arc<AuditLog>,
        auth: Arc<TokenAuthority>,
        prober: Arc<Prober>,
        processor: Arc<OutcomeProcessor>,
        config: WorkerConfig,
    ) -> Self {
        Self { store, logs, auth, prober, processor, config }
    }

    /// Spawn the three periodic loops and hand back their handles.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            Arc::clone(&self).spawn_check_sweep(),
            Arc::clone(&self).spawn_token_sweep(),
            self.spawn_log_rotation(),
        ]
    }

    fn spawn_check_sweep(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(self.config.check_interval_secs));
            loop {
                timer.tick().await;
                if let Err(err) = self.sweep_checks_once().await {
                    warn!("check sweep failed: {err}");
                }
            }
        })
    }

    /// One full pass over every stored check: read, validate, probe,
    /// process. Checks run concurrently under a bounded limit so one slow
    /// probe cannot block the rest, and one bad record never aborts the
    /// sweep.
    pub async fn sweep_checks_once(&self) -> crate::error::Result<()> {
        let ids = self.store.list(CHECKS).await?;
        debug!(count = ids.len(), "starting check sweep");

        futures::stream::iter(ids)
            .for_each_concurrent(self.config.probe_concurrency, |id| async move {
                self.run_check(&id).await;
            })
            .await;
        Ok(())
    }

    async fn run_check(&self, id: &str) {
        let raw = match self.store.read(CHECKS, id).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(check = %id, "failed to read check: {err}");
                return;
            }
        };

        let check = match validation::validate(&raw) {
            Ok(check) => check,
            Err(err) => {
                warn!(check = %id, "skipping invalid check: {err}");
                return;
            }
        };

        let outcome = self.prober.probe(&check).await;
        self.processor.process(&check, &outcome).await;
    }

    fn spawn_token_sweep(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(self.config.token_sweep_interval_secs));
            loop {
                timer.tick().await;
                match self.auth.sweep_expired().await {
                    Ok(0) => debug!("token sweep found nothing expired"),
                    Ok(deleted) => info!(deleted, "token sweep deleted expired tokens"),
                    Err(err) => warn!("token sweep failed: {err}"),
                }
            }
        })
    }

    fn spawn_log_rotation(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(self.config.log_rotation_interval_secs));
            loop {
                timer.tick().await;
                match self.logs.rotate_all().await {
                    Ok(rotated) => debug!(rotated, "log rotation pass finished"),
                    Err(err) => warn!("log rotation failed: {err}"),
                }
            }
        })
    }
}
