use omnicore_store::{Event, EventKind};
use serde::{Deserialize, Serialize};

/// Wire representation of a watch event, sent as one JSON object per line
/// (newline-delimited) over the streaming response body.
///
/// `resource`/`old` are pre-serialized JSON strings of the resource, not
/// nested objects, so the wire schema never couples to `AnyResource`'s own
/// shape. `sort_field_data`/`sort_descending` are reserved for a future
/// sort-aware watch (this watch implementation doesn't carry per-event sort
/// state, so they are always `None` today) — present on the wire so a
/// client parsing against the full contract doesn't need a schema bump once
/// that lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: WireEventType,
    pub offset: Option<u64>,
    pub resource: Option<String>,
    pub old: Option<String>,
    pub total: Option<u64>,
    pub sort_field_data: Option<String>,
    pub sort_descending: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireEventType {
    Created,
    Updated,
    Destroyed,
    Bootstrapped,
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        match event {
            Event::Resource { offset, resource, old, kind, .. } => WireEvent {
                event_type: match kind {
                    EventKind::Created => WireEventType::Created,
                    EventKind::Updated => WireEventType::Updated,
                    EventKind::Destroyed => WireEventType::Destroyed,
                },
                offset: Some(*offset),
                resource: serde_json::to_string(resource).ok(),
                old: old.as_ref().and_then(|o| serde_json::to_string(o).ok()),
                total: None,
                sort_field_data: None,
                sort_descending: None,
            },
            Event::Bootstrapped { total } => WireEvent {
                event_type: WireEventType::Bootstrapped,
                offset: None,
                resource: None,
                old: None,
                total: Some(*total as u64),
                sort_field_data: None,
                sort_descending: None,
            },
        }
    }
}
