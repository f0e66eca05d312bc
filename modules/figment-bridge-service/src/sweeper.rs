//! Retention pass over debug records.
//!
//! Removes debug files whose modification time is older than [`DEBUG_TTL`].
//! Runs once at startup; a periodic loop is available but off by default.
//! The token map and snapshots are never pruned.

use crate::error::StoreError;
use crate::store::DebugStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub const DEBUG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: Vec<String>,
    pub failed: usize,
}

pub async fn sweep_expired(
    store: &DebugStore,
    now: SystemTime,
    ttl: Duration,
) -> Result<SweepReport, StoreError> {
    let mut report = SweepReport::default();
    let Some(cutoff) = now.checked_sub(ttl) else {
        return Ok(report);
    };
    for file in store.list().await? {
        report.scanned += 1;
        // Files stamped in the future have no age yet.
        let Ok(age) = now.duration_since(file.modified) else {
            continue;
        };
        if age <= ttl {
            continue;
        }
        match store.delete_if_older(&file.token, cutoff).await {
            Ok(false) => {
                log::debug!("[SWEEP] Kept {}, rewritten since listing", file.path.display());
            }
            Ok(true) => {
                log::debug!(
                    "[SWEEP] Removed {} (age {}h)",
                    file.path.display(),
                    age.as_secs() / 3600
                );
                report.removed.push(file.token);
            }
            Err(e) => {
                log::warn!("[SWEEP] Failed to remove {}: {}", file.path.display(), e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

pub async fn run_sweep(store: &DebugStore) {
    match sweep_expired(store, SystemTime::now(), DEBUG_TTL).await {
        Ok(report) => log::info!(
            "[SWEEP] Scanned {} debug records, removed {}, failed {}",
            report.scanned,
            report.removed.len(),
            report.failed
        ),
        Err(e) => log::error!("[SWEEP] Sweep aborted: {}", e),
    }
}

pub async fn run_periodic(store: Arc<crate::store::BridgeStore>, interval_secs: u64) {
    log::info!("[SWEEP] Periodic sweep every {}s", interval_secs);
    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        run_sweep(&store.debug).await;
    }
}
