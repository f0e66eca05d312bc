//! Multi-tier token lookup behind `GET /debug/{token}`.
//!
//! Tiers are consulted in a fixed order and the first hit wins:
//! debug record, then token map, then the real-time snapshot (only when its
//! embedded token matches). Every tier is checked regardless so the response
//! can report what exists on disk. A failed read degrades that tier to a miss.

use crate::store::{self, BridgeStore};
use crate::token;
use figment_bridge_types::{
    DebugFileSource, RealTimeFileSource, ResolveHit, ResolveMiss, ResolveSource, ResolvedData,
    TierSources, TokenMap, TokensFileSource,
};

pub enum Resolution {
    Hit(ResolveHit),
    Miss(ResolveMiss),
}

pub async fn resolve(store: &BridgeStore, token: &str) -> Resolution {
    // Malformed tokens never touch the debug tier since they would name an arbitrary file.
    let token_ok = token::is_valid_token(token);
    let debug_path = store.debug.path_for(token);
    let debug_exists = token_ok && store::file_exists(&debug_path).await;
    let debug_record = if debug_exists {
        store.debug.get(token).await.unwrap_or_else(|e| {
            log::warn!("[RESOLVE] Debug record for {} unreadable: {}", token, e);
            None
        })
    } else {
        None
    };

    let tokens_exists = store::file_exists(store.tokens.path()).await;
    let mut token_map = store.tokens.load().await.unwrap_or_else(|e| {
        log::warn!("[RESOLVE] Token map unreadable: {}", e);
        TokenMap::new()
    });
    let token_record = token_map.remove(token);

    let real_time_exists = store::file_exists(store.real_time.path()).await;
    let real_time = store.real_time.get().await.unwrap_or_else(|e| {
        log::warn!("[RESOLVE] Real-time snapshot unreadable: {}", e);
        None
    });
    let real_time_token = real_time.as_ref().map(|s| s.token.clone());
    let real_time_matches = real_time_token.as_deref() == Some(token);

    let sources = TierSources {
        debug_file: DebugFileSource {
            path: debug_path.display().to_string(),
            exists: debug_exists,
        },
        tokens_file: TokensFileSource {
            path: store.tokens.path().display().to_string(),
            exists: tokens_exists,
            has_token: token_record.is_some(),
        },
        real_time_file: RealTimeFileSource {
            path: store.real_time.path().display().to_string(),
            exists: real_time_exists,
            token: real_time_token,
            matches: real_time_matches,
        },
    };
    log::debug!(
        "[RESOLVE] {} debug={} tokens={} realtime={}",
        token,
        debug_record.is_some(),
        sources.tokens_file.has_token,
        real_time_matches
    );

    let hit = if let Some(record) = debug_record {
        Some((ResolveSource::DebugFile, ResolvedData::Debug(record)))
    } else if let Some(record) = token_record {
        Some((ResolveSource::TokensFile, ResolvedData::Token(record)))
    } else {
        real_time
            .filter(|_| real_time_matches)
            .map(|snapshot| (ResolveSource::RealTimeFile, ResolvedData::RealTime(snapshot)))
    };

    match hit {
        Some((source, data)) => {
            log::info!("[RESOLVE] {} resolved from {:?}", token, source);
            Resolution::Hit(ResolveHit {
                success: true,
                token: token.to_string(),
                source,
                data,
                sources,
            })
        }
        None => {
            log::warn!(
                "[RESOLVE] {} not found ({} known tokens)",
                token,
                token_map.len()
            );
            Resolution::Miss(ResolveMiss {
                success: false,
                error: format!("Token '{}' not found in any storage tier", token),
                token: token.to_string(),
                sources,
                available_tokens: token_map.into_keys().collect(),
                storage_dir: store.dir().display().to_string(),
            })
        }
    }
}
