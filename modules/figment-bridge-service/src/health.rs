//! Tier status snapshot served by `GET /health`.

use crate::inspect;
use crate::store::BridgeStore;
use chrono::{DateTime, Utc};
use figment_bridge_types::{DebugFileEntry, HealthReport, RealTimeSummary};

const RECENT_DEBUG_LIMIT: usize = 10;

/// Build the report. A tier that cannot be read shows up empty instead of failing the report.
pub async fn build_report(store: &BridgeStore, port: u16, uptime_secs: u64) -> HealthReport {
    let mut debug_files = store.debug.list().await.unwrap_or_else(|e| {
        log::warn!("[HEALTH] Cannot list debug records: {}", e);
        Vec::new()
    });
    debug_files.sort_by(|a, b| b.modified.cmp(&a.modified));
    let recent_debug_files = debug_files
        .into_iter()
        .take(RECENT_DEBUG_LIMIT)
        .map(|f| DebugFileEntry {
            token: f.token,
            file: f.path.display().to_string(),
            size: f.size,
            modified: DateTime::<Utc>::from(f.modified),
        })
        .collect();

    let now = Utc::now();
    let tokens: Vec<_> = match store.tokens.load().await {
        Ok(map) => map
            .values()
            .map(|record| inspect::token_summary(record, now))
            .collect(),
        Err(e) => {
            log::warn!("[HEALTH] Cannot read token map: {}", e);
            Vec::new()
        }
    };

    HealthReport {
        status: "ok".to_string(),
        port,
        storage_dir: store.dir().display().to_string(),
        uptime_secs,
        recent_debug_files,
        token_count: tokens.len(),
        tokens,
        real_time: real_time_summary(store).await,
    }
}

async fn real_time_summary(store: &BridgeStore) -> RealTimeSummary {
    let size = match tokio::fs::metadata(store.real_time.path()).await {
        Ok(m) => m.len(),
        Err(_) => return RealTimeSummary::default(),
    };
    match store.real_time.get().await {
        Ok(Some(snapshot)) => RealTimeSummary {
            exists: true,
            size: Some(size),
            component_count: Some(snapshot.figment.component_count()),
            token: Some(snapshot.token),
        },
        Ok(None) => RealTimeSummary::default(),
        Err(e) => {
            log::warn!("[HEALTH] Cannot read real-time snapshot: {}", e);
            RealTimeSummary {
                exists: true,
                size: Some(size),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment_bridge_types::{
        ComponentPayload, DebugMetadata, DebugRecord, FigmentPayload, RealTimeSnapshot,
        TokenRecord,
    };
    use serde_json::json;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    async fn put_debug(store: &BridgeStore, token: &str, age_secs: u64) {
        let path = store
            .debug
            .put(&DebugRecord {
                token: token.to_string(),
                timestamp: Utc::now(),
                component: ComponentPayload::default(),
                figment: FigmentPayload::default(),
                metadata: DebugMetadata::default(),
            })
            .await
            .unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = BridgeStore::open(tmp.path()).await.unwrap();
        let report = build_report(&store, 9103, 5).await;
        assert_eq!(report.status, "ok");
        assert_eq!(report.port, 9103);
        assert!(report.recent_debug_files.is_empty());
        assert!(report.tokens.is_empty());
        assert!(!report.real_time.exists);
        assert!(report.real_time.size.is_none());
    }

    #[tokio::test]
    async fn test_recent_debug_files_newest_first_and_capped() {
        let tmp = TempDir::new().unwrap();
        let store = BridgeStore::open(tmp.path()).await.unwrap();
        for i in 0..12u64 {
            put_debug(&store, &format!("t{:02}", i), (i + 1) * 60).await;
        }
        let report = build_report(&store, 9103, 0).await;
        let tokens: Vec<&str> = report
            .recent_debug_files
            .iter()
            .map(|f| f.token.as_str())
            .collect();
        assert_eq!(tokens.len(), RECENT_DEBUG_LIMIT);
        assert_eq!(tokens[0], "t00");
        assert_eq!(tokens[9], "t09");
    }

    #[tokio::test]
    async fn test_token_and_real_time_summaries() {
        let tmp = TempDir::new().unwrap();
        let store = BridgeStore::open(tmp.path()).await.unwrap();
        let component: ComponentPayload = serde_json::from_value(json!({
            "id": "tok",
            "name": "Button",
            "type": "COMPONENT",
            "children": [{}],
            "enhancedVisual": { "blur": 2 }
        }))
        .unwrap();
        store
            .tokens
            .put(TokenRecord::new("tok".into(), component, Utc::now()))
            .await
            .unwrap();
        let figment: FigmentPayload =
            serde_json::from_value(json!({ "components": [{}, {}, {}] })).unwrap();
        store
            .real_time
            .put(&RealTimeSnapshot {
                figment,
                token: "tok".into(),
                exported_at: Utc::now(),
            })
            .await
            .unwrap();

        let report = build_report(&store, 9103, 0).await;
        assert_eq!(report.token_count, 1);
        let summary = &report.tokens[0];
        assert_eq!(summary.component_name.as_deref(), Some("Button"));
        assert_eq!(summary.component_type.as_deref(), Some("COMPONENT"));
        assert!(summary.has_enhanced_visual);
        assert!(summary.has_children);
        assert!(!summary.expired);

        assert!(report.real_time.exists);
        assert!(report.real_time.size.unwrap() > 0);
        assert_eq!(report.real_time.token.as_deref(), Some("tok"));
        assert_eq!(report.real_time.component_count, Some(3));
    }

    #[tokio::test]
    async fn test_corrupt_token_map_degrades() {
        let tmp = TempDir::new().unwrap();
        let store = BridgeStore::open(tmp.path()).await.unwrap();
        std::fs::write(store.tokens.path(), "[broken").unwrap();
        let report = build_report(&store, 9103, 0).await;
        assert!(report.tokens.is_empty());
        assert_eq!(report.token_count, 0);
    }
}
