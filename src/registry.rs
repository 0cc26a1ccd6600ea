// Parlance - State registry
//
// Per-state settings plus compiled global-transition handles, kept in
// registration order so global candidates are tried deterministically.
// Settings upserts merge field-wise rather than replace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::expression::{Generator, Matcher};
use crate::settings::{StateSettings, DEFAULT_MEMORY};
use crate::state::{Speaker, StateId};

/// Registry entry: settings plus compiled handles for any global
/// transitions targeting this state.
#[derive(Clone)]
pub struct StateEntry<S> {
    pub settings: StateSettings<S>,
    pub global_user: Option<Arc<dyn Matcher>>,
    pub global_system: Option<Arc<dyn Generator>>,
}

impl<S: fmt::Debug> fmt::Debug for StateEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEntry")
            .field("settings", &self.settings)
            .field("global_user", &self.global_user.is_some())
            .field("global_system", &self.global_system.is_some())
            .finish()
    }
}

/// The flow's per-state store
#[derive(Debug, Clone)]
pub struct StateRegistry<S: StateId> {
    entries: HashMap<S, StateEntry<S>>,
    order: Vec<S>,
}

impl<S: StateId> Default for StateRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateId> StateRegistry<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Merge settings onto a state, registering it if new. Returns the
    /// entry so the caller can attach compiled global handles.
    pub fn upsert(&mut self, state: S, settings: StateSettings<S>) -> &mut StateEntry<S> {
        if !self.entries.contains_key(&state) {
            self.order.push(state.clone());
        }
        let entry = self.entries.entry(state).or_insert_with(|| StateEntry {
            settings: StateSettings::default(),
            global_user: None,
            global_system: None,
        });
        entry.settings.merge(settings);
        entry
    }

    pub fn contains(&self, state: &S) -> bool {
        self.entries.contains_key(state)
    }

    pub fn get(&self, state: &S) -> Option<&StateEntry<S>> {
        self.entries.get(state)
    }

    pub fn settings(&self, state: &S) -> Option<&StateSettings<S>> {
        self.entries.get(state).map(|e| &e.settings)
    }

    /// Fallback target for failed turns at `state`
    pub fn error_successor(&self, state: &S) -> Option<&S> {
        self.entries
            .get(state)
            .and_then(|e| e.settings.error_successor.as_ref())
    }

    /// Effective novelty-memory capacity at `state`
    pub fn memory(&self, state: &S) -> usize {
        self.entries
            .get(state)
            .map_or(DEFAULT_MEMORY, |e| e.settings.memory_capacity())
    }

    /// Whether the given speaker keeps the turn after landing on `state`
    pub fn multi_hop(&self, state: &S, speaker: Speaker) -> bool {
        self.entries
            .get(state)
            .map_or(false, |e| e.settings.multi_hop(speaker))
    }

    /// Registered states in registration order
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.order.iter()
    }

    /// Global user-transition handles, (target state, matcher), in
    /// registration order
    pub fn global_user_handles(&self) -> impl Iterator<Item = (&S, &Arc<dyn Matcher>)> {
        self.order.iter().filter_map(|s| {
            self.entries
                .get(s)
                .and_then(|e| e.global_user.as_ref().map(|m| (s, m)))
        })
    }

    /// Global system-transition handles, (target state, generator), in
    /// registration order
    pub fn global_system_handles(&self) -> impl Iterator<Item = (&S, &Arc<dyn Generator>)> {
        self.order.iter().filter_map(|s| {
            self.entries
                .get(s)
                .and_then(|e| e.global_system.as_ref().map(|g| (s, g)))
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{MatchOutcome, Vars};

    struct StubMatch;

    impl Matcher for StubMatch {
        fn evaluate(&self, _input: &str, _vars: &Vars) -> Option<MatchOutcome> {
            Some(MatchOutcome::new(""))
        }
    }

    #[test]
    fn test_upsert_merges_and_keeps_order() {
        let mut registry: StateRegistry<&str> = StateRegistry::new();
        registry.upsert("a", StateSettings::new().with_memory(3));
        registry.upsert("b", StateSettings::new());
        registry.upsert("a", StateSettings::new().with_system_multi_hop(true));

        let order: Vec<&str> = registry.states().copied().collect();
        assert_eq!(order, vec!["a", "b"]);

        let settings = registry.settings(&"a").unwrap();
        assert_eq!(settings.memory, Some(3));
        assert_eq!(settings.system_multi_hop, Some(true));
    }

    #[test]
    fn test_defaults_for_unknown_states() {
        let registry: StateRegistry<&str> = StateRegistry::new();
        assert_eq!(registry.memory(&"nowhere"), 1);
        assert!(!registry.multi_hop(&"nowhere", Speaker::System));
        assert!(registry.error_successor(&"nowhere").is_none());
    }

    #[test]
    fn test_global_handles_iterate_in_registration_order() {
        let mut registry: StateRegistry<&str> = StateRegistry::new();
        registry.upsert("later", StateSettings::new());
        registry.upsert("first", StateSettings::new()).global_user = Some(Arc::new(StubMatch));
        registry.upsert("second", StateSettings::new()).global_user = Some(Arc::new(StubMatch));

        let targets: Vec<&str> = registry.global_user_handles().map(|(s, _)| *s).collect();
        // "later" registered first but carries no global handle
        assert_eq!(targets, vec!["first", "second"]);
        assert_eq!(registry.global_system_handles().count(), 0);
    }
}
