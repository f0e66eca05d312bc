//! Shallow shape checks over exported design payloads.
//!
//! Nothing here validates the design tree itself; it only records which of
//! the known optional members are present and how large they are.

use figment_bridge_types::{
    ComponentPayload, DebugMetadata, FigmentPayload, KeySummary, PresenceCount, TokenRecord,
    TokenSummary,
};
use serde_json::Value;

/// First exported component, or the figment itself when it carries no component list.
pub fn primary_component(figment: &FigmentPayload) -> ComponentPayload {
    if let Some(first) = figment.components.as_ref().and_then(|c| c.first()) {
        return first.clone();
    }
    ComponentPayload::from_map(figment.extra.clone())
}

/// Rebind a component to its token. Returns the id it carried before, rendered
/// as text when it was not a string.
pub fn stamp_component(mut component: ComponentPayload, token: &str) -> (ComponentPayload, Option<String>) {
    let original = component.id.replace(token.to_string()).or_else(|| {
        component
            .extra
            .remove("id")
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
    });
    (component, original)
}

pub fn debug_metadata(
    component: &ComponentPayload,
    figment: &FigmentPayload,
    component_id: Option<String>,
) -> DebugMetadata {
    let child_count = component.children.as_ref().map(|c| c.len()).unwrap_or(0);
    DebugMetadata {
        component_id,
        component_name: component.name.clone(),
        component_type: component.kind.clone(),
        has_enhanced_visual: is_present(component.enhanced_visual.as_ref()),
        has_children: child_count > 0,
        child_count,
        component_count: figment.component_count(),
        interactions: PresenceCount {
            present: component.interactions.is_some(),
            count: component.interactions.as_ref().map(|i| i.len()).unwrap_or(0),
        },
        accessibility: key_summary(component.accessibility.as_ref()),
        design_tokens: key_summary(component.design_tokens.as_ref()),
    }
}

pub fn token_summary(record: &TokenRecord, now: chrono::DateTime<chrono::Utc>) -> TokenSummary {
    let component = &record.component;
    TokenSummary {
        token: record.token.clone(),
        component_name: component.name.clone(),
        component_type: component.kind.clone(),
        has_enhanced_visual: is_present(component.enhanced_visual.as_ref()),
        has_children: component.children.as_ref().is_some_and(|c| !c.is_empty()),
        created: record.created,
        expires: record.expires,
        expired: record.is_expired(now),
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

fn key_summary(value: Option<&Value>) -> KeySummary {
    let keys = match value {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    KeySummary {
        present: is_present(value),
        keys,
    }
}
