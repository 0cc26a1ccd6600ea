// Parlance - State identifiers, speakers, and transition targets
//
// States are whatever identifier type the embedding application prefers
// (an enum, &'static str, String, ...) as long as it can be cloned, hashed,
// and debug-printed. Targets distinguish plain in-flow states from
// namespaced positions in another component of a composite.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Bound alias for state identifier types.
///
/// Blanket-implemented; application code never implements this directly.
pub trait StateId: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> StateId for T {}

/// The two parties of a conversation. Every edge is tagged with the
/// speaker whose turn can traverse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    System,
    User,
}

impl Speaker {
    /// The opposite role
    pub fn other(self) -> Speaker {
        match self {
            Speaker::System => Speaker::User,
            Speaker::User => Speaker::System,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::System => write!(f, "system"),
            Speaker::User => write!(f, "user"),
        }
    }
}

/// Where a transition lands: a state in the same flow, or a state inside a
/// named component of a composite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target<S> {
    /// A state in the current flow
    Local(S),

    /// A state inside another component; traversing this edge hands the
    /// conversation over to that component
    Remote { namespace: String, state: S },
}

impl<S> Target<S> {
    /// The bare state identifier, ignoring any namespace
    pub fn state(&self) -> &S {
        match self {
            Target::Local(s) => s,
            Target::Remote { state, .. } => state,
        }
    }

    /// The namespace component, if any
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Target::Local(_) => None,
            Target::Remote { namespace, .. } => Some(namespace),
        }
    }
}

impl<S> From<S> for Target<S> {
    fn from(state: S) -> Self {
        Target::Local(state)
    }
}

impl<S> From<(&str, S)> for Target<S> {
    fn from((namespace, state): (&str, S)) -> Self {
        Target::Remote {
            namespace: namespace.to_string(),
            state,
        }
    }
}

impl<S> From<(String, S)> for Target<S> {
    fn from((namespace, state): (String, S)) -> Self {
        Target::Remote { namespace, state }
    }
}
