// Parlance - Typed state and edge settings
//
// All fields are optional so a settings value can describe a partial update;
// upserting settings onto a state merges field-wise (present fields win).
// Unknown attributes are preserved in `extra` for forward compatibility.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::Speaker;

/// Effective memory capacity when a state does not set one
pub const DEFAULT_MEMORY: usize = 1;

/// Effective edge weight when an edge does not set one
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Effective edge priority when an edge does not set one
pub const DEFAULT_PRIORITY: i64 = 0;

/// Per-state settings.
///
/// `error_successor` is the fallback target when a turn at this state cannot
/// proceed. The multi-hop flags keep the named speaker's turn going after
/// landing here. `global_user`/`global_system` hold expression source for a
/// global transition targeting this state. `memory` bounds the ring of
/// remembered responses used for novelty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSettings<S> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_successor: Option<S>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_multi_hop: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_multi_hop: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<usize>,

    /// Attributes the engine does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl<S> Default for StateSettings<S> {
    fn default() -> Self {
        Self {
            error_successor: None,
            user_multi_hop: None,
            system_multi_hop: None,
            global_user: None,
            global_system: None,
            memory: None,
            extra: HashMap::new(),
        }
    }
}

impl<S> StateSettings<S> {
    /// Create empty settings (every field unset)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback target for failed turns at this state
    pub fn with_error_successor(mut self, state: S) -> Self {
        self.error_successor = Some(state);
        self
    }

    /// Keep the user's turn going after landing here
    pub fn with_user_multi_hop(mut self, enabled: bool) -> Self {
        self.user_multi_hop = Some(enabled);
        self
    }

    /// Keep the system's turn going after landing here
    pub fn with_system_multi_hop(mut self, enabled: bool) -> Self {
        self.system_multi_hop = Some(enabled);
        self
    }

    /// Attach a global user-transition expression targeting this state
    pub fn with_global_user(mut self, expression: impl Into<String>) -> Self {
        self.global_user = Some(expression.into());
        self
    }

    /// Attach a global system-transition expression targeting this state
    pub fn with_global_system(mut self, expression: impl Into<String>) -> Self {
        self.global_system = Some(expression.into());
        self
    }

    /// Bound the response-novelty ring for this state
    pub fn with_memory(mut self, capacity: usize) -> Self {
        self.memory = Some(capacity);
        self
    }

    /// Attach an uninterpreted attribute
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Whether the given speaker's turn continues after landing here
    pub fn multi_hop(&self, speaker: Speaker) -> bool {
        match speaker {
            Speaker::User => self.user_multi_hop.unwrap_or(false),
            Speaker::System => self.system_multi_hop.unwrap_or(false),
        }
    }

    /// Effective novelty-memory capacity
    pub fn memory_capacity(&self) -> usize {
        self.memory.unwrap_or(DEFAULT_MEMORY)
    }

    /// Merge another settings value into this one. Fields present in `other`
    /// win; absent fields keep their prior values; `extra` extends.
    pub fn merge(&mut self, other: StateSettings<S>) {
        if other.error_successor.is_some() {
            self.error_successor = other.error_successor;
        }
        if other.user_multi_hop.is_some() {
            self.user_multi_hop = other.user_multi_hop;
        }
        if other.system_multi_hop.is_some() {
            self.system_multi_hop = other.system_multi_hop;
        }
        if other.global_user.is_some() {
            self.global_user = other.global_user;
        }
        if other.global_system.is_some() {
            self.global_system = other.global_system;
        }
        if other.memory.is_some() {
            self.memory = other.memory;
        }
        self.extra.extend(other.extra);
    }
}

/// Per-edge settings. `weight` biases system-side random selection;
/// `priority` orders user-side match precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    /// Attributes the engine does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl EdgeSettings {
    /// Create empty settings (every field unset)
    pub fn new() -> Self {
        Self::default()
    }

    /// Bias system-side random selection toward this edge
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Raise or lower this edge in user-side match precedence
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attach an uninterpreted attribute
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Effective selection weight
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }

    /// Effective match priority
    pub fn effective_priority(&self) -> i64 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_settings_defaults() {
        let settings: StateSettings<&str> = StateSettings::new();
        assert_eq!(settings.memory_capacity(), 1);
        assert!(!settings.multi_hop(Speaker::User));
        assert!(!settings.multi_hop(Speaker::System));
        assert!(settings.error_successor.is_none());
    }

    #[test]
    fn test_state_settings_merge_present_fields_win() {
        let mut base = StateSettings::new()
            .with_error_successor("fallback")
            .with_memory(3)
            .with_extra("topic", json!("movies"));

        let update = StateSettings::new()
            .with_memory(5)
            .with_system_multi_hop(true)
            .with_extra("mood", json!("light"));

        base.merge(update);

        // updated fields
        assert_eq!(base.memory, Some(5));
        assert_eq!(base.system_multi_hop, Some(true));
        // untouched fields survive
        assert_eq!(base.error_successor, Some("fallback"));
        assert!(base.user_multi_hop.is_none());
        // extra extends
        assert_eq!(base.extra["topic"], json!("movies"));
        assert_eq!(base.extra["mood"], json!("light"));
    }

    #[test]
    fn test_state_settings_serde_camel_case_with_extra() {
        let yaml = r#"
errorSuccessor: fallback
systemMultiHop: true
memory: 2
topic: movies
"#;
        let settings: StateSettings<String> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.error_successor.as_deref(), Some("fallback"));
        assert_eq!(settings.system_multi_hop, Some(true));
        assert_eq!(settings.memory, Some(2));
        assert_eq!(settings.extra["topic"], json!("movies"));

        let round = serde_json::to_value(&settings).unwrap();
        assert_eq!(round["errorSuccessor"], json!("fallback"));
        assert_eq!(round["topic"], json!("movies"));
        // unset fields stay absent
        assert!(round.get("globalUser").is_none());
    }

    #[test]
    fn test_edge_settings_effective_values() {
        let bare = EdgeSettings::new();
        assert_eq!(bare.effective_weight(), 1.0);
        assert_eq!(bare.effective_priority(), 0);

        let tuned = EdgeSettings::new().with_weight(2.5).with_priority(10);
        assert_eq!(tuned.effective_weight(), 2.5);
        assert_eq!(tuned.effective_priority(), 10);
    }
}
