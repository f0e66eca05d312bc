//! Shared types for the figment bridge service and the tooling that reads its files.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How long a token record stays valid after it is created.
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

// =====================================================
// Design Payload Schema
// =====================================================

/// A single design component as exported by the plugin.
///
/// Only the members the bridge inspects are named; everything else the
/// plugin sends is carried through untouched in `extra`. A named member
/// whose value has an unexpected shape is left in `extra` as sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_visual: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_tokens: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentPayload {
    pub fn from_map(mut extra: Map<String, Value>) -> Self {
        Self {
            id: take_member(&mut extra, "id"),
            name: take_member(&mut extra, "name"),
            kind: take_member(&mut extra, "type"),
            children: take_member(&mut extra, "children"),
            enhanced_visual: take_member(&mut extra, "enhancedVisual"),
            interactions: take_member(&mut extra, "interactions"),
            accessibility: take_member(&mut extra, "accessibility"),
            design_tokens: take_member(&mut extra, "designTokens"),
            extra,
        }
    }
}

impl<'de> Deserialize<'de> for ComponentPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

/// The design tree wrapper sent under the `figment` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FigmentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentPayload>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for FigmentPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut extra = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            components: take_member(&mut extra, "components"),
            extra,
        })
    }
}

/// Pull `key` out of `map` as a `T`. Null is dropped; a value of the wrong
/// shape goes back into the map unchanged.
fn take_member<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(&value) {
        Ok(member) => Some(member),
        Err(_) => {
            map.insert(key.to_string(), value);
            None
        }
    }
}

impl FigmentPayload {
    pub fn component_count(&self) -> usize {
        self.components.as_ref().map(|c| c.len()).unwrap_or(0)
    }
}

// =====================================================
// Request Types
// =====================================================

/// Body of `POST /export`, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExportRequest {
    /// Plain export, only the latest snapshot is updated.
    Figment { figment: Map<String, Value> },
    /// Token-scoped export feeding every tier.
    RealTime {
        figment: FigmentPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(
            default,
            rename = "componentId",
            skip_serializing_if = "Option::is_none"
        )]
        component_id: Option<String>,
    },
}

// =====================================================
// Stored Records
// =====================================================

/// Entry of the aggregate token map (`tokens.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: String,
    pub component: ComponentPayload,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(token: String, component: ComponentPayload, created: DateTime<Utc>) -> Self {
        Self {
            token,
            component,
            created,
            expires: created + Duration::hours(TOKEN_LIFETIME_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// The whole token map file, ordered by token.
pub type TokenMap = BTreeMap<String, TokenRecord>;

/// Shallow shape checks computed from a component at export time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugMetadata {
    pub component_id: Option<String>,
    pub component_name: Option<String>,
    pub component_type: Option<String>,
    pub has_enhanced_visual: bool,
    pub has_children: bool,
    pub child_count: usize,
    pub component_count: usize,
    pub interactions: PresenceCount,
    pub accessibility: KeySummary,
    pub design_tokens: KeySummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceCount {
    pub present: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySummary {
    pub present: bool,
    pub keys: Vec<String>,
}

/// Per-token debug file (`debug-<token>.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugRecord {
    pub token: String,
    pub timestamp: DateTime<Utc>,
    pub component: ComponentPayload,
    pub figment: FigmentPayload,
    pub metadata: DebugMetadata,
}

/// Most recent non token-scoped export (`latest.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSnapshot {
    pub figment: Map<String, Value>,
    pub exported_at: DateTime<Utc>,
}

/// Most recent token-scoped export (`realtime.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeSnapshot {
    pub figment: FigmentPayload,
    pub token: String,
    pub exported_at: DateTime<Utc>,
}

// =====================================================
// Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub message: String,
    pub file: String,
}

/// Which tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveSource {
    DebugFile,
    TokensFile,
    RealTimeFile,
}

/// Record returned by a lookup, shaped by the tier it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedData {
    Debug(DebugRecord),
    Token(TokenRecord),
    RealTime(RealTimeSnapshot),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSources {
    pub debug_file: DebugFileSource,
    pub tokens_file: TokensFileSource,
    pub real_time_file: RealTimeFileSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugFileSource {
    pub path: String,
    pub exists: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensFileSource {
    pub path: String,
    pub exists: bool,
    pub has_token: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealTimeFileSource {
    pub path: String,
    pub exists: bool,
    pub token: Option<String>,
    pub matches: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveHit {
    pub success: bool,
    pub token: String,
    pub source: ResolveSource,
    pub data: ResolvedData,
    pub sources: TierSources,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveMiss {
    pub success: bool,
    pub error: String,
    pub token: String,
    pub sources: TierSources,
    pub available_tokens: Vec<String>,
    pub storage_dir: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub success: bool,
    pub error: String,
    pub path: String,
    pub available_endpoints: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodNotAllowedResponse {
    pub success: bool,
    pub error: String,
    pub method: String,
    pub path: String,
    pub supported_methods: Vec<String>,
}

// =====================================================
// Health
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub port: u16,
    pub storage_dir: String,
    pub uptime_secs: u64,
    pub recent_debug_files: Vec<DebugFileEntry>,
    pub tokens: Vec<TokenSummary>,
    pub token_count: usize,
    pub real_time: RealTimeSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugFileEntry {
    pub token: String,
    pub file: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub token: String,
    pub component_name: Option<String>,
    pub component_type: Option<String>,
    pub has_enhanced_visual: bool,
    pub has_children: bool,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub expired: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeSummary {
    pub exists: bool,
    pub size: Option<u64>,
    pub token: Option<String>,
    pub component_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_real_time_request() {
        let body = json!({
            "type": "real-time",
            "figment": { "components": [{ "id": "c1", "name": "Button", "fills": [] }] },
            "componentId": "1:23"
        });
        let req: ExportRequest = serde_json::from_value(body).unwrap();
        match req {
            ExportRequest::RealTime {
                figment,
                token,
                component_id,
            } => {
                assert!(token.is_none());
                assert_eq!(component_id.as_deref(), Some("1:23"));
                let first = &figment.components.unwrap()[0];
                assert_eq!(first.id.as_deref(), Some("c1"));
                assert_eq!(first.name.as_deref(), Some("Button"));
                assert!(first.extra.contains_key("fills"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_parse_figment_request() {
        let body = json!({ "type": "figment", "figment": { "name": "Card" } });
        let req: ExportRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(req, ExportRequest::Figment { ref figment } if figment["name"] == "Card"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let body = json!({ "type": "batch", "figment": {} });
        assert!(serde_json::from_value::<ExportRequest>(body).is_err());
    }

    #[test]
    fn test_figment_must_be_object() {
        let body = json!({ "type": "figment", "figment": "nope" });
        assert!(serde_json::from_value::<ExportRequest>(body).is_err());
    }

    #[test]
    fn test_component_keeps_unknown_keys() {
        let value = json!({ "id": "x", "type": "FRAME", "layout": { "mode": "row" } });
        let component: ComponentPayload = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(component.kind.as_deref(), Some("FRAME"));
        assert_eq!(serde_json::to_value(&component).unwrap(), value);
    }

    #[test]
    fn test_misshapen_members_stay_in_extra() {
        let value = json!({
            "id": 42,
            "name": 7,
            "type": ["FRAME"],
            "children": { "a": 1 },
            "interactions": { "onClick": true },
            "accessibility": null
        });
        let component: ComponentPayload = serde_json::from_value(value).unwrap();
        assert!(component.id.is_none());
        assert!(component.name.is_none());
        assert!(component.kind.is_none());
        assert!(component.children.is_none());
        assert!(component.interactions.is_none());
        assert!(component.accessibility.is_none());
        assert_eq!(component.extra["id"], 42);
        assert_eq!(component.extra["children"], json!({ "a": 1 }));
        assert!(!component.extra.contains_key("accessibility"));
        assert_eq!(
            serde_json::to_value(&component).unwrap(),
            json!({
                "id": 42,
                "name": 7,
                "type": ["FRAME"],
                "children": { "a": 1 },
                "interactions": { "onClick": true }
            })
        );
    }

    #[test]
    fn test_real_time_request_with_odd_component_parses() {
        let body = json!({
            "type": "real-time",
            "figment": { "components": [{ "id": 42, "children": {} }] }
        });
        let req: ExportRequest = serde_json::from_value(body).unwrap();
        let ExportRequest::RealTime { figment, .. } = req else {
            panic!("expected real-time request");
        };
        assert_eq!(figment.component_count(), 1);
    }

    #[test]
    fn test_non_array_components_kept_raw() {
        let figment: FigmentPayload =
            serde_json::from_value(json!({ "components": "none" })).unwrap();
        assert!(figment.components.is_none());
        assert_eq!(figment.extra["components"], "none");
    }

    #[test]
    fn test_token_record_expires_after_created() {
        let now = Utc::now();
        let record = TokenRecord::new("t".into(), ComponentPayload::default(), now);
        assert!(record.created < record.expires);
        assert_eq!(record.expires - record.created, Duration::hours(24));
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn test_resolve_source_names() {
        assert_eq!(
            serde_json::to_value(ResolveSource::DebugFile).unwrap(),
            json!("debugFile")
        );
        assert_eq!(
            serde_json::to_value(ResolveSource::RealTimeFile).unwrap(),
            json!("realTimeFile")
        );
    }
}
