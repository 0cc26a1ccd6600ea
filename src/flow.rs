// Parlance - Single-flow dialogue controller
//
// Owns a transition graph, a state registry, the expression compiler, and
// the conversation position (state, speaker, bindings, response memory).
// Single-hop transitions pick one edge without moving; take_transition
// commits a hop and applies the landing rule; the turn loops chain hops
// until the speaker changes or a revisit forces a stop.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{FlowError, FlowResult};
use crate::expression::{ExpressionCompiler, Vars};
use crate::graph::{Edge, EdgeHandle, TransitionGraph};
use crate::phrase::PhraseCompiler;
use crate::registry::StateRegistry;
use crate::select::{self, GenerationCandidate, MatchCandidate};
use crate::settings::{EdgeSettings, StateSettings, DEFAULT_WEIGHT};
use crate::state::{Speaker, StateId, Target};

/// A state-transition dialogue controller over a single namespace.
///
/// Structure (states, transitions) is registered up front; conversation
/// then proceeds turn by turn via [`system_turn`](Self::system_turn) and
/// [`user_turn`](Self::user_turn). Cross-namespace targets are rejected
/// here; compose flows with
/// [`CompositeDialogueFlow`](crate::composite::CompositeDialogueFlow) to
/// use them.
#[derive(Clone)]
pub struct DialogueFlow<S: StateId> {
    graph: TransitionGraph<S>,
    registry: StateRegistry<S>,
    compiler: Arc<dyn ExpressionCompiler>,
    state: S,
    speaker: Speaker,
    vars: Vars,
    memory: HashMap<S, VecDeque<String>>,
    rng: StdRng,
    initial_state: S,
    initial_speaker: Speaker,
}

impl<S: StateId> fmt::Debug for DialogueFlow<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogueFlow")
            .field("state", &self.state)
            .field("speaker", &self.speaker)
            .field("states", &self.registry.len())
            .field("edges", &self.graph.len())
            .finish()
    }
}

impl<S: StateId> DialogueFlow<S> {
    /// Create a flow positioned at `initial_state` with `initial_speaker`
    /// holding the floor. Uses the bundled phrase backend until
    /// [`with_compiler`](Self::with_compiler) swaps it.
    pub fn new(initial_state: S, initial_speaker: Speaker) -> Self {
        let mut flow = Self {
            graph: TransitionGraph::new(),
            registry: StateRegistry::new(),
            compiler: Arc::new(PhraseCompiler),
            state: initial_state.clone(),
            speaker: initial_speaker,
            vars: Vars::new(),
            memory: HashMap::new(),
            rng: StdRng::from_entropy(),
            initial_state,
            initial_speaker,
        };
        flow.registry.upsert(flow.state.clone(), StateSettings::default());
        flow
    }

    /// Replace the expression compiler. Apply before adding transitions;
    /// already-compiled edges keep their old handles.
    pub fn with_compiler(mut self, compiler: Arc<dyn ExpressionCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Seed the selection RNG for reproducible runs
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Start with the given variable bindings
    pub fn with_vars(mut self, vars: Vars) -> Self {
        self.vars = vars;
        self
    }

    // ---- authoring ----

    /// Register a state, merging `settings` onto any it already has
    pub fn add_state(&mut self, state: S, settings: StateSettings<S>) -> FlowResult<()> {
        self.update_state_settings(state, settings)
    }

    /// Merge settings onto a state. Global-transition expressions are
    /// compiled here; a compile failure leaves the state untouched.
    pub fn update_state_settings(
        &mut self,
        state: S,
        settings: StateSettings<S>,
    ) -> FlowResult<()> {
        let global_user = match &settings.global_user {
            Some(expr) => Some(self.compiler.compile_matcher(expr)?),
            None => None,
        };
        let global_system = match &settings.global_system {
            Some(expr) => Some(self.compiler.compile_generator(expr)?),
            None => None,
        };
        let entry = self.registry.upsert(state, settings);
        if let Some(handle) = global_user {
            entry.global_user = Some(handle);
        }
        if let Some(handle) = global_system {
            entry.global_system = Some(handle);
        }
        Ok(())
    }

    /// Add a user (NLU) transition
    pub fn add_user_transition(
        &mut self,
        source: S,
        target: impl Into<Target<S>>,
        expression: &str,
    ) -> FlowResult<()> {
        self.add_user_transition_with(source, target, expression, EdgeSettings::new())
    }

    /// Add a user (NLU) transition with explicit edge settings
    pub fn add_user_transition_with(
        &mut self,
        source: S,
        target: impl Into<Target<S>>,
        expression: &str,
        settings: EdgeSettings,
    ) -> FlowResult<()> {
        let target = target.into();
        let handle = EdgeHandle::Match(self.compiler.compile_matcher(expression)?);
        self.register_endpoints(&source, &target);
        self.graph.upsert(Edge {
            source,
            target,
            speaker: Speaker::User,
            expression: expression.to_string(),
            handle,
            settings,
        });
        Ok(())
    }

    /// Add a system (NLG) transition
    pub fn add_system_transition(
        &mut self,
        source: S,
        target: impl Into<Target<S>>,
        expression: &str,
    ) -> FlowResult<()> {
        self.add_system_transition_with(source, target, expression, EdgeSettings::new())
    }

    /// Add a system (NLG) transition with explicit edge settings
    pub fn add_system_transition_with(
        &mut self,
        source: S,
        target: impl Into<Target<S>>,
        expression: &str,
        settings: EdgeSettings,
    ) -> FlowResult<()> {
        let target = target.into();
        let handle = EdgeHandle::Generate(self.compiler.compile_generator(expression)?);
        self.register_endpoints(&source, &target);
        self.graph.upsert(Edge {
            source,
            target,
            speaker: Speaker::System,
            expression: expression.to_string(),
            handle,
            settings,
        });
        Ok(())
    }

    fn register_endpoints(&mut self, source: &S, target: &Target<S>) {
        if !self.registry.contains(source) {
            self.registry.upsert(source.clone(), StateSettings::default());
        }
        if let Target::Local(state) = target {
            if !self.registry.contains(state) {
                self.registry.upsert(state.clone(), StateSettings::default());
            }
        }
    }

    // ---- single-hop transitions ----

    /// Pick one system hop from the current state without moving.
    /// Returns the generated text and the destination; a fallback to the
    /// error successor returns empty text.
    pub fn system_transition(&mut self) -> FlowResult<(String, Target<S>)> {
        let state = self.state.clone();
        self.system_transition_from(&state)
    }

    /// Pick one system hop from an explicit source state without moving
    pub fn system_transition_from(&mut self, source: &S) -> FlowResult<(String, Target<S>)> {
        let mut candidates: Vec<GenerationCandidate<S>> = Vec::new();
        for edge in self.graph.edges_from(source, Speaker::System) {
            if let Some(generator) = edge.handle.as_generator() {
                if let Some(text) = generator.evaluate(&self.vars) {
                    candidates.push(GenerationCandidate {
                        text,
                        target: edge.target.clone(),
                        weight: edge.settings.effective_weight(),
                    });
                }
            }
        }
        if candidates.is_empty() {
            // global transitions back the concrete edges up; a global into
            // the source itself is skipped
            for (target, generator) in self.registry.global_system_handles() {
                if target == source {
                    continue;
                }
                if let Some(text) = generator.evaluate(&self.vars) {
                    candidates.push(GenerationCandidate {
                        text,
                        target: Target::Local(target.clone()),
                        weight: DEFAULT_WEIGHT,
                    });
                }
            }
        }

        let remembered = self.memory.get(source);
        let excluded =
            |text: &str| remembered.map_or(false, |ring| ring.iter().any(|r| r == text));
        if let Some(picked) = select::pick_weighted(&candidates, excluded, &mut self.rng) {
            debug!(source = ?source, target = ?picked.target, "system hop");
            return Ok((picked.text.clone(), picked.target.clone()));
        }

        if let Some(successor) = self.registry.error_successor(source) {
            warn!(state = ?source, "no viable system transition, taking error successor");
            return Ok((String::new(), Target::Local(successor.clone())));
        }
        Err(FlowError::NoViableGeneration {
            state: format!("{source:?}"),
        })
    }

    /// Pick one user hop from the current state without moving. The
    /// winning match's bindings merge into the flow variables.
    pub fn user_transition(&mut self, input: &str) -> FlowResult<Target<S>> {
        let state = self.state.clone();
        self.user_transition_from(input, &state)
    }

    /// Pick one user hop from an explicit source state without moving
    pub fn user_transition_from(&mut self, input: &str, source: &S) -> FlowResult<Target<S>> {
        let mut candidates: Vec<MatchCandidate<S>> = Vec::new();
        for (order, edge) in self.graph.edges_from(source, Speaker::User).enumerate() {
            if let Some(matcher) = edge.handle.as_matcher() {
                if let Some(outcome) = matcher.evaluate(input, &self.vars) {
                    candidates.push(MatchCandidate {
                        target: edge.target.clone(),
                        outcome,
                        priority: edge.settings.effective_priority(),
                        order,
                    });
                }
            }
        }
        if candidates.is_empty() {
            for (order, (target, matcher)) in self.registry.global_user_handles().enumerate() {
                if target == source {
                    continue;
                }
                if let Some(outcome) = matcher.evaluate(input, &self.vars) {
                    candidates.push(MatchCandidate {
                        target: Target::Local(target.clone()),
                        outcome,
                        priority: 0,
                        order,
                    });
                }
            }
        }

        if let Some(winner) = select::pick_match(candidates) {
            debug!(source = ?source, target = ?winner.target, "user hop");
            self.vars.extend(winner.outcome.bindings);
            return Ok(winner.target);
        }

        if let Some(successor) = self.registry.error_successor(source) {
            warn!(state = ?source, input, "no user transition matched, taking error successor");
            return Ok(Target::Local(successor.clone()));
        }
        Err(FlowError::NoMatchingEdge {
            state: format!("{source:?}"),
            input: input.to_string(),
        })
    }

    /// Commit a hop to a local state. The speaker flips unless the landed
    /// state grants the current speaker its multi-hop flag.
    pub fn take_transition(&mut self, state: S) {
        if !self.registry.multi_hop(&state, self.speaker) {
            self.speaker = self.speaker.other();
        }
        self.state = state;
    }

    // ---- turns ----

    /// Run one full system turn: chain hops while the system keeps the
    /// floor, stopping on speaker change or on a revisit within the turn.
    /// Returns the space-joined hop texts.
    pub fn system_turn(&mut self) -> FlowResult<String> {
        let mut responses: Vec<String> = Vec::new();
        let mut visited: HashSet<S> = HashSet::new();
        visited.insert(self.state.clone());
        while self.speaker == Speaker::System {
            let source = self.state.clone();
            let (text, target) = self.system_transition_from(&source)?;
            let state = self.expect_local(target)?;
            if !text.is_empty() {
                self.record_response(&source, text.clone());
                responses.push(text);
            }
            self.take_transition(state);
            if visited.contains(&self.state) && self.speaker == Speaker::System {
                debug!(state = ?self.state, "revisit within turn, yielding floor");
                self.speaker = self.speaker.other();
                break;
            }
            visited.insert(self.state.clone());
        }
        Ok(responses.join(" "))
    }

    /// Run one full user turn over a single utterance: chain hops while
    /// the user keeps the floor, stopping on speaker change or revisit.
    pub fn user_turn(&mut self, input: &str) -> FlowResult<()> {
        let mut visited: HashSet<S> = HashSet::new();
        visited.insert(self.state.clone());
        while self.speaker == Speaker::User {
            let source = self.state.clone();
            let target = self.user_transition_from(input, &source)?;
            let state = self.expect_local(target)?;
            self.take_transition(state);
            if visited.contains(&self.state) && self.speaker == Speaker::User {
                debug!(state = ?self.state, "revisit within turn, yielding floor");
                self.speaker = self.speaker.other();
                break;
            }
            visited.insert(self.state.clone());
        }
        Ok(())
    }

    fn expect_local(&self, target: Target<S>) -> FlowResult<S> {
        match target {
            Target::Local(state) => Ok(state),
            Target::Remote { namespace, .. } => Err(FlowError::config(format!(
                "transition into namespace {namespace:?} requires a composite flow"
            ))),
        }
    }

    /// Remember a response generated at `state` for novelty exclusion
    pub(crate) fn record_response(&mut self, state: &S, text: String) {
        let capacity = self.registry.memory(state);
        if capacity == 0 {
            return;
        }
        let ring = self.memory.entry(state.clone()).or_default();
        while ring.len() >= capacity {
            ring.pop_front();
        }
        ring.push_back(text);
    }

    // ---- inspection ----

    /// Verify the flow is fully conversable under its present bindings:
    /// every system-edge target can recover from unmatched user input, and
    /// every system-side expression can generate. Findings are logged;
    /// returns false if any check fails.
    pub fn check(&self) -> bool {
        let mut ok = true;
        for edge in self.graph.iter() {
            if edge.speaker != Speaker::System {
                continue;
            }
            if let Target::Local(target) = &edge.target {
                if self.registry.error_successor(target).is_none() {
                    warn!(state = ?target, "system transition target has no error successor");
                    ok = false;
                }
            }
            if let Some(generator) = edge.handle.as_generator() {
                if generator.evaluate(&self.vars).is_none() {
                    warn!(
                        source = ?edge.source,
                        expression = %edge.expression,
                        "system transition cannot generate"
                    );
                    ok = false;
                }
            }
        }
        for (target, generator) in self.registry.global_system_handles() {
            if generator.evaluate(&self.vars).is_none() {
                warn!(state = ?target, "global system transition cannot generate");
                ok = false;
            }
        }
        ok
    }

    /// Return to the initial state and speaker, dropping bindings and
    /// response memory
    pub fn reset(&mut self) {
        self.state = self.initial_state.clone();
        self.speaker = self.initial_speaker;
        self.vars.clear();
        self.memory.clear();
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn set_state(&mut self, state: S) {
        self.state = state;
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn set_speaker(&mut self, speaker: Speaker) {
        self.speaker = speaker;
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut Vars {
        &mut self.vars
    }

    pub fn set_vars(&mut self, vars: Vars) {
        self.vars = vars;
    }

    pub fn graph(&self) -> &TransitionGraph<S> {
        &self.graph
    }

    pub fn registry(&self) -> &StateRegistry<S> {
        &self.registry
    }

    /// The explicitly added (source, target, speaker) triples
    pub fn arcs(&self) -> HashSet<(S, Target<S>, Speaker)> {
        self.graph.arcs()
    }

    /// The raw expression on a transition. Falls back to the target
    /// state's global expression for that speaker when no concrete edge
    /// exists.
    pub fn transition_expression(
        &self,
        source: &S,
        target: &Target<S>,
        speaker: Speaker,
    ) -> Option<&str> {
        if let Some(edge) = self.graph.get(source, target, speaker) {
            return Some(&edge.expression);
        }
        if let Target::Local(state) = target {
            let settings = self.registry.settings(state)?;
            return match speaker {
                Speaker::User => settings.global_user.as_deref(),
                Speaker::System => settings.global_system.as_deref(),
            };
        }
        None
    }
}
