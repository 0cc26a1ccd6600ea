// Parlance - Transition graph
//
// Directed multigraph keyed by (source, target, speaker). Edges keep their
// insertion order, which user-side match precedence falls back on; re-adding
// an existing key replaces the edge in place without disturbing that order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::expression::{Generator, Matcher};
use crate::settings::EdgeSettings;
use crate::state::{Speaker, StateId, Target};

/// Compiled evaluation handle carried by an edge
#[derive(Clone)]
pub enum EdgeHandle {
    Match(Arc<dyn Matcher>),
    Generate(Arc<dyn Generator>),
}

impl EdgeHandle {
    /// The matcher, for USER edges
    pub fn as_matcher(&self) -> Option<&Arc<dyn Matcher>> {
        match self {
            EdgeHandle::Match(m) => Some(m),
            EdgeHandle::Generate(_) => None,
        }
    }

    /// The generator, for SYSTEM edges
    pub fn as_generator(&self) -> Option<&Arc<dyn Generator>> {
        match self {
            EdgeHandle::Generate(g) => Some(g),
            EdgeHandle::Match(_) => None,
        }
    }
}

impl fmt::Debug for EdgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeHandle::Match(_) => f.write_str("Match(..)"),
            EdgeHandle::Generate(_) => f.write_str("Generate(..)"),
        }
    }
}

/// A single transition
#[derive(Debug, Clone)]
pub struct Edge<S> {
    pub source: S,
    pub target: Target<S>,
    pub speaker: Speaker,
    pub expression: String,
    pub handle: EdgeHandle,
    pub settings: EdgeSettings,
}

/// The flow's edge store
#[derive(Debug, Clone)]
pub struct TransitionGraph<S: StateId> {
    edges: Vec<Edge<S>>,
    index: HashMap<(S, Target<S>, Speaker), usize>,
}

impl<S: StateId> Default for TransitionGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateId> TransitionGraph<S> {
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert an edge, replacing any existing edge with the same
    /// (source, target, speaker) key in place.
    pub fn upsert(&mut self, edge: Edge<S>) {
        let key = (edge.source.clone(), edge.target.clone(), edge.speaker);
        match self.index.get(&key) {
            Some(&i) => self.edges[i] = edge,
            None => {
                self.index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }

    /// Look up a concrete edge
    pub fn get(&self, source: &S, target: &Target<S>, speaker: Speaker) -> Option<&Edge<S>> {
        let key = (source.clone(), target.clone(), speaker);
        self.index.get(&key).map(|&i| &self.edges[i])
    }

    /// Edges leaving `source` for the given speaker, in insertion order
    pub fn edges_from<'a>(
        &'a self,
        source: &'a S,
        speaker: Speaker,
    ) -> impl Iterator<Item = &'a Edge<S>> {
        self.edges
            .iter()
            .filter(move |e| e.speaker == speaker && &e.source == source)
    }

    /// All edges in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Edge<S>> {
        self.edges.iter()
    }

    /// The set of explicitly added (source, target, speaker) triples
    pub fn arcs(&self) -> HashSet<(S, Target<S>, Speaker)> {
        self.edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone(), e.speaker))
            .collect()
    }

    /// Every state mentioned as an edge source or local target
    pub fn states(&self) -> HashSet<S> {
        let mut states = HashSet::new();
        for edge in &self.edges {
            states.insert(edge.source.clone());
            if let Target::Local(s) = &edge.target {
                states.insert(s.clone());
            }
        }
        states
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
