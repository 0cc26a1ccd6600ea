// Parlance - Composite dialogue controller
//
// Several flows, each under a namespace, with exactly one active at a time.
// A hop onto a Remote target hands the conversation over: bindings travel
// with it (the handing-over side wins on conflict) and the landing rule is
// applied under the destination's settings. The active flow is held out of
// the component map so access to it never has a failure path.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{FlowError, FlowResult};
use crate::expression::Vars;
use crate::flow::DialogueFlow;
use crate::settings::{EdgeSettings, StateSettings};
use crate::state::{Speaker, StateId, Target};

/// Namespace of the component a composite starts with
pub const ROOT_NAMESPACE: &str = "SYSTEM";

/// A set of dialogue flows conversing as one, indexed by namespace.
///
/// Authoring calls address states either bare (the root component) or as
/// `(namespace, state)` pairs. Turns run on whichever component is active,
/// following cross-namespace transitions as they happen.
#[derive(Debug, Clone)]
pub struct CompositeDialogueFlow<S: StateId> {
    active_namespace: String,
    active_flow: DialogueFlow<S>,
    inactive: HashMap<String, DialogueFlow<S>>,
}

impl<S: StateId> CompositeDialogueFlow<S> {
    /// Create a composite whose root component starts at `initial_state`
    /// with `initial_speaker` holding the floor
    pub fn new(initial_state: S, initial_speaker: Speaker) -> Self {
        Self::from_flow(DialogueFlow::new(initial_state, initial_speaker))
    }

    /// Wrap an existing flow as the root component
    pub fn from_flow(flow: DialogueFlow<S>) -> Self {
        Self {
            active_namespace: ROOT_NAMESPACE.to_string(),
            active_flow: flow,
            inactive: HashMap::new(),
        }
    }

    /// Register a flow under a namespace. Re-registering a namespace
    /// replaces its component.
    pub fn add_component(&mut self, namespace: impl Into<String>, flow: DialogueFlow<S>) {
        let namespace = namespace.into();
        if namespace == self.active_namespace {
            self.active_flow = flow;
        } else {
            self.inactive.insert(namespace, flow);
        }
    }

    pub fn has_component(&self, namespace: &str) -> bool {
        namespace == self.active_namespace || self.inactive.contains_key(namespace)
    }

    pub fn component(&self, namespace: &str) -> FlowResult<&DialogueFlow<S>> {
        if namespace == self.active_namespace {
            Ok(&self.active_flow)
        } else {
            self.inactive
                .get(namespace)
                .ok_or_else(|| FlowError::UnknownNamespace(namespace.to_string()))
        }
    }

    pub fn component_mut(&mut self, namespace: &str) -> FlowResult<&mut DialogueFlow<S>> {
        if namespace == self.active_namespace {
            Ok(&mut self.active_flow)
        } else {
            self.inactive
                .get_mut(namespace)
                .ok_or_else(|| FlowError::UnknownNamespace(namespace.to_string()))
        }
    }

    /// Every component, active first
    pub fn components(&self) -> impl Iterator<Item = (&str, &DialogueFlow<S>)> {
        std::iter::once((self.active_namespace.as_str(), &self.active_flow))
            .chain(self.inactive.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Hand the conversation over to another component. The source's
    /// bindings merge into the destination, winning on conflict.
    pub fn set_active(&mut self, namespace: &str) -> FlowResult<()> {
        if namespace == self.active_namespace {
            return Ok(());
        }
        let incoming = self
            .inactive
            .remove(namespace)
            .ok_or_else(|| FlowError::UnknownNamespace(namespace.to_string()))?;
        debug!(from = %self.active_namespace, to = %namespace, "controller handover");
        let previous_namespace =
            std::mem::replace(&mut self.active_namespace, namespace.to_string());
        let previous = std::mem::replace(&mut self.active_flow, incoming);

        let mut merged = self.active_flow.vars().clone();
        merged.extend(previous.vars().clone());
        self.active_flow.set_vars(merged);

        self.inactive.insert(previous_namespace, previous);
        Ok(())
    }

    // ---- authoring ----

    /// Merge settings onto a state; bare states address the root component
    pub fn add_state(
        &mut self,
        state: impl Into<Target<S>>,
        settings: StateSettings<S>,
    ) -> FlowResult<()> {
        self.update_state_settings(state, settings)
    }

    /// Merge settings onto a state; bare states address the root component
    pub fn update_state_settings(
        &mut self,
        state: impl Into<Target<S>>,
        settings: StateSettings<S>,
    ) -> FlowResult<()> {
        let (namespace, state) = split(state.into());
        self.component_mut(&namespace)?
            .update_state_settings(state, settings)
    }

    /// Add a user transition inside the source's component
    pub fn add_user_transition(
        &mut self,
        source: impl Into<Target<S>>,
        target: impl Into<Target<S>>,
        expression: &str,
    ) -> FlowResult<()> {
        let (namespace, source) = split(source.into());
        self.component_mut(&namespace)?
            .add_user_transition(source, target, expression)
    }

    /// Add a user transition with explicit edge settings
    pub fn add_user_transition_with(
        &mut self,
        source: impl Into<Target<S>>,
        target: impl Into<Target<S>>,
        expression: &str,
        settings: EdgeSettings,
    ) -> FlowResult<()> {
        let (namespace, source) = split(source.into());
        self.component_mut(&namespace)?
            .add_user_transition_with(source, target, expression, settings)
    }

    /// Add a system transition inside the source's component
    pub fn add_system_transition(
        &mut self,
        source: impl Into<Target<S>>,
        target: impl Into<Target<S>>,
        expression: &str,
    ) -> FlowResult<()> {
        let (namespace, source) = split(source.into());
        self.component_mut(&namespace)?
            .add_system_transition(source, target, expression)
    }

    /// Add a system transition with explicit edge settings
    pub fn add_system_transition_with(
        &mut self,
        source: impl Into<Target<S>>,
        target: impl Into<Target<S>>,
        expression: &str,
        settings: EdgeSettings,
    ) -> FlowResult<()> {
        let (namespace, source) = split(source.into());
        self.component_mut(&namespace)?
            .add_system_transition_with(source, target, expression, settings)
    }

    // ---- turns ----

    /// Commit a hop, following namespace changes. A `Remote` target hands
    /// the conversation over, then applies the landing rule under the
    /// destination's settings.
    pub fn take_composite_transition(&mut self, target: Target<S>) -> FlowResult<()> {
        match target {
            Target::Local(state) => {
                self.active_flow.take_transition(state);
                Ok(())
            }
            Target::Remote { namespace, state } => {
                let speaker = self.active_flow.speaker();
                self.set_active(&namespace)?;
                self.active_flow.set_speaker(speaker);
                self.active_flow.take_transition(state);
                Ok(())
            }
        }
    }

    /// Run one full system turn across components. Returns the
    /// space-joined hop texts.
    pub fn system_turn(&mut self) -> FlowResult<String> {
        let mut responses: Vec<String> = Vec::new();
        let mut visited: HashSet<(String, S)> = HashSet::new();
        visited.insert(self.position());
        while self.active_flow.speaker() == Speaker::System {
            let source = self.active_flow.state().clone();
            let (text, target) = self.active_flow.system_transition_from(&source)?;
            if !text.is_empty() {
                self.active_flow.record_response(&source, text.clone());
                responses.push(text);
            }
            self.take_composite_transition(target)?;
            if visited.contains(&self.position())
                && self.active_flow.speaker() == Speaker::System
            {
                debug!(namespace = %self.active_namespace, "revisit within turn, yielding floor");
                self.active_flow.set_speaker(Speaker::User);
                break;
            }
            visited.insert(self.position());
        }
        Ok(responses.join(" "))
    }

    /// Run one full user turn across components over a single utterance
    pub fn user_turn(&mut self, input: &str) -> FlowResult<()> {
        let mut visited: HashSet<(String, S)> = HashSet::new();
        visited.insert(self.position());
        while self.active_flow.speaker() == Speaker::User {
            let source = self.active_flow.state().clone();
            let target = self.active_flow.user_transition_from(input, &source)?;
            self.take_composite_transition(target)?;
            if visited.contains(&self.position()) && self.active_flow.speaker() == Speaker::User
            {
                debug!(namespace = %self.active_namespace, "revisit within turn, yielding floor");
                self.active_flow.set_speaker(Speaker::System);
                break;
            }
            visited.insert(self.position());
        }
        Ok(())
    }

    fn position(&self) -> (String, S) {
        (
            self.active_namespace.clone(),
            self.active_flow.state().clone(),
        )
    }

    // ---- inspection ----

    /// Check every component, and that every cross-namespace transition
    /// lands in a registered component. Findings are logged; returns false
    /// if any check fails.
    pub fn check(&self) -> bool {
        let mut ok = true;
        for (namespace, flow) in self.components() {
            if !flow.check() {
                ok = false;
            }
            for edge in flow.graph().iter() {
                if let Target::Remote {
                    namespace: target_namespace,
                    ..
                } = &edge.target
                {
                    if !self.has_component(target_namespace) {
                        warn!(
                            from = %namespace,
                            namespace = %target_namespace,
                            "transition into unknown namespace"
                        );
                        ok = false;
                    }
                }
            }
        }
        ok
    }

    /// Reset every component and make the root component active again
    pub fn reset(&mut self) {
        self.active_flow.reset();
        for flow in self.inactive.values_mut() {
            flow.reset();
        }
        if self.active_namespace != ROOT_NAMESPACE {
            if let Some(root) = self.inactive.remove(ROOT_NAMESPACE) {
                let previous_namespace =
                    std::mem::replace(&mut self.active_namespace, ROOT_NAMESPACE.to_string());
                let previous = std::mem::replace(&mut self.active_flow, root);
                self.inactive.insert(previous_namespace, previous);
            }
        }
    }

    pub fn active_namespace(&self) -> &str {
        &self.active_namespace
    }

    pub fn active(&self) -> &DialogueFlow<S> {
        &self.active_flow
    }

    pub fn active_mut(&mut self) -> &mut DialogueFlow<S> {
        &mut self.active_flow
    }

    /// Current state of the active component
    pub fn state(&self) -> &S {
        self.active_flow.state()
    }

    pub fn set_state(&mut self, state: S) {
        self.active_flow.set_state(state);
    }

    /// Current speaker of the active component
    pub fn speaker(&self) -> Speaker {
        self.active_flow.speaker()
    }

    pub fn set_speaker(&mut self, speaker: Speaker) {
        self.active_flow.set_speaker(speaker);
    }

    /// Bindings of the active component
    pub fn vars(&self) -> &Vars {
        self.active_flow.vars()
    }

    pub fn set_vars(&mut self, vars: Vars) {
        self.active_flow.set_vars(vars);
    }
}

fn split<S>(target: Target<S>) -> (String, S) {
    match target {
        Target::Local(state) => (ROOT_NAMESPACE.to_string(), state),
        Target::Remote { namespace, state } => (namespace, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handover_merges_vars_source_wins() {
        let mut composite: CompositeDialogueFlow<&str> =
            CompositeDialogueFlow::new("start", Speaker::System);
        let mut movies = DialogueFlow::new("intro", Speaker::System);
        movies.vars_mut().insert("genre".into(), json!("noir"));
        movies.vars_mut().insert("count".into(), json!(3));
        composite.add_component("movies", movies);

        composite
            .active_mut()
            .vars_mut()
            .insert("genre".into(), json!("comedy"));

        composite.set_active("movies").unwrap();
        assert_eq!(composite.active_namespace(), "movies");
        // the handing-over side wins on conflict, other keys survive
        assert_eq!(composite.vars()["genre"], json!("comedy"));
        assert_eq!(composite.vars()["count"], json!(3));
    }

    #[test]
    fn test_unknown_namespace_is_an_error() {
        let mut composite: CompositeDialogueFlow<&str> =
            CompositeDialogueFlow::new("start", Speaker::System);
        assert!(matches!(
            composite.set_active("nowhere"),
            Err(FlowError::UnknownNamespace(_))
        ));
        assert!(composite.component("nowhere").is_err());
        assert!(composite.component(ROOT_NAMESPACE).is_ok());
    }

    #[test]
    fn test_reset_reactivates_root() {
        let mut composite: CompositeDialogueFlow<&str> =
            CompositeDialogueFlow::new("start", Speaker::System);
        composite.add_component("movies", DialogueFlow::new("intro", Speaker::User));
        composite.set_active("movies").unwrap();
        composite.set_state("elsewhere");

        composite.reset();
        assert_eq!(composite.active_namespace(), ROOT_NAMESPACE);
        assert_eq!(composite.state(), &"start");
        assert_eq!(composite.speaker(), Speaker::System);
        // the parked component was reset too
        let movies = composite.component("movies").unwrap();
        assert_eq!(movies.state(), &"intro");
        assert_eq!(movies.speaker(), Speaker::User);
    }
}
