// Parlance - State-transition dialogue management

//! Turn-taking dialogue control over authorable conversation graphs.
//!
//! A [`DialogueFlow`] walks a directed graph of conversation states whose
//! edges carry natural-language matchers (user side) or generators (system
//! side). Each turn chains one or more hops until the floor changes hands,
//! with loop detection, per-state response novelty, global fallback
//! transitions, and error recovery. Several flows compose into a
//! [`CompositeDialogueFlow`] that hands the conversation across namespaces
//! mid-turn.
//!
//! The expression language is pluggable through [`ExpressionCompiler`]; the
//! bundled [`PhraseCompiler`] covers simple phrase matching and templating.
//!
//! ```
//! use parlance::{DialogueFlow, Speaker};
//!
//! let mut flow = DialogueFlow::new("start", Speaker::System);
//! flow.add_system_transition("start", "greeted", "hello there")?;
//! flow.add_user_transition("greeted", "weather", "how is the weather")?;
//! flow.add_system_transition("weather", "greeted", "looks sunny to me")?;
//!
//! let opening = flow.system_turn()?;
//! assert_eq!(opening, "hello there");
//! flow.user_turn("so how is the weather today")?;
//! assert_eq!(flow.state(), &"weather");
//! # Ok::<(), parlance::FlowError>(())
//! ```

pub mod composite;
pub mod error;
pub mod expression;
pub mod flow;
pub mod graph;
pub mod phrase;
pub mod registry;
pub mod script;
pub mod select;
pub mod settings;
pub mod state;

pub use composite::{CompositeDialogueFlow, ROOT_NAMESPACE};
pub use error::{FlowError, FlowResult};
pub use expression::{ExpressionCompiler, Generator, MatchOutcome, Matcher, Vars};
pub use flow::DialogueFlow;
pub use graph::{Edge, EdgeHandle, TransitionGraph};
pub use phrase::{PhraseCompiler, PhraseMatcher, TemplateGenerator};
pub use registry::{StateEntry, StateRegistry};
pub use script::{DialogueScript, StateDecl, TargetDecl, TransitionDecl};
pub use select::{GenerationCandidate, MatchCandidate};
pub use settings::{
    EdgeSettings, StateSettings, DEFAULT_MEMORY, DEFAULT_PRIORITY, DEFAULT_WEIGHT,
};
pub use state::{Speaker, StateId, Target};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
