//! Change notifications for store subscribers.

use pharmacy_core::EntityKind;
use serde::Serialize;

/// Emitted after a store mutation has been applied and snapshotted.
///
/// Delivery is best effort: with no live subscriber the event is dropped,
/// and a subscriber lagging past the channel capacity skips ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    Created { kind: EntityKind, id: String },
    Updated { kind: EntityKind, id: String },
    Deleted { kind: EntityKind, id: String },
    /// A collection was replaced by a backend load.
    Loaded { kind: EntityKind, count: usize },
    CurrentUserChanged { id: Option<String> },
    Reset,
}

impl StoreEvent {
    /// The collection this event concerns, if any.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            StoreEvent::Created { kind, .. }
            | StoreEvent::Updated { kind, .. }
            | StoreEvent::Deleted { kind, .. }
            | StoreEvent::Loaded { kind, .. } => Some(*kind),
            StoreEvent::CurrentUserChanged { .. } | StoreEvent::Reset => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = StoreEvent::Deleted {
            kind: EntityKind::Products,
            id: "p1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["kind"], "products");
        assert_eq!(event.kind(), Some(EntityKind::Products));
        assert_eq!(StoreEvent::Reset.kind(), None);
    }
}
