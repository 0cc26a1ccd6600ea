// Parlance - Declarative dialogue scripts
//
// A serde-typed authoring format so dialogues can live in YAML or JSON
// files instead of code. A script validates structurally, then builds a
// DialogueFlow<String> against any expression compiler.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{FlowError, FlowResult};
use crate::expression::ExpressionCompiler;
use crate::flow::DialogueFlow;
use crate::phrase::PhraseCompiler;
use crate::settings::{EdgeSettings, StateSettings};
use crate::state::{Speaker, Target};

/// A complete dialogue definition
///
/// ```yaml
/// name: greeter
/// initialState: start
/// initialSpeaker: system
/// states:
///   - id: greeted
///     errorSuccessor: recover
/// transitions:
///   - source: start
///     target: greeted
///     speaker: system
///     expression: hello there
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueScript {
    pub name: String,
    pub initial_state: String,
    #[serde(default = "default_speaker")]
    pub initial_speaker: Speaker,
    #[serde(default)]
    pub states: Vec<StateDecl>,
    #[serde(default)]
    pub transitions: Vec<TransitionDecl>,
}

fn default_speaker() -> Speaker {
    Speaker::System
}

/// A state declaration: an id plus its settings, inline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDecl {
    pub id: String,
    #[serde(flatten)]
    pub settings: StateSettings<String>,
}

/// A transition declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDecl {
    pub source: String,
    pub target: TargetDecl,
    pub speaker: Speaker,
    pub expression: String,
    #[serde(flatten)]
    pub settings: EdgeSettings,
}

/// A target: either a bare state or a namespaced position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetDecl {
    Local(String),
    Remote { namespace: String, state: String },
}

impl From<TargetDecl> for Target<String> {
    fn from(decl: TargetDecl) -> Self {
        match decl {
            TargetDecl::Local(state) => Target::Local(state),
            TargetDecl::Remote { namespace, state } => Target::Remote { namespace, state },
        }
    }
}

impl DialogueScript {
    /// Parse a script from YAML
    pub fn from_yaml(yaml: &str) -> FlowResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FlowError::config(format!("failed to parse dialogue script: {e}")))
    }

    /// Parse a script from JSON
    pub fn from_json(json: &str) -> FlowResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FlowError::config(format!("failed to parse dialogue script: {e}")))
    }

    /// Load a script from a file, choosing the format by extension
    pub fn from_file(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowError::config(format!("failed to read {}: {e}", path.display())))?;
        if path.extension().map_or(false, |ext| ext == "json") {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> FlowResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| FlowError::config(format!("failed to serialize dialogue script: {e}")))
    }

    /// Structural validation: non-empty identifiers and expressions, no
    /// duplicate state declarations, and an initial state the script
    /// actually mentions.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("script name is empty".to_string());
        }
        if self.initial_state.is_empty() {
            return Err("initialState is empty".to_string());
        }
        if self.transitions.is_empty() {
            return Err("script defines no transitions".to_string());
        }

        let mut declared: HashSet<&str> = HashSet::new();
        for state in &self.states {
            if state.id.is_empty() {
                return Err("state declaration with empty id".to_string());
            }
            if !declared.insert(state.id.as_str()) {
                return Err(format!("duplicate state declaration {:?}", state.id));
            }
        }

        let mut mentioned: HashSet<&str> = declared;
        for transition in &self.transitions {
            if transition.source.is_empty() {
                return Err("transition with empty source".to_string());
            }
            if transition.expression.trim().is_empty() {
                return Err(format!(
                    "transition from {:?} has an empty expression",
                    transition.source
                ));
            }
            mentioned.insert(transition.source.as_str());
            match &transition.target {
                TargetDecl::Local(state) => {
                    if state.is_empty() {
                        return Err(format!(
                            "transition from {:?} has an empty target",
                            transition.source
                        ));
                    }
                    mentioned.insert(state.as_str());
                }
                TargetDecl::Remote { namespace, state } => {
                    if namespace.is_empty() || state.is_empty() {
                        return Err(format!(
                            "transition from {:?} has an incomplete namespaced target",
                            transition.source
                        ));
                    }
                }
            }
        }

        if !mentioned.contains(self.initial_state.as_str()) {
            return Err(format!(
                "initialState {:?} does not appear in the script",
                self.initial_state
            ));
        }
        Ok(())
    }

    /// Build a flow using the bundled phrase backend
    pub fn build(&self) -> FlowResult<DialogueFlow<String>> {
        self.build_with(Arc::new(PhraseCompiler))
    }

    /// Build a flow against an explicit expression compiler
    pub fn build_with(
        &self,
        compiler: Arc<dyn ExpressionCompiler>,
    ) -> FlowResult<DialogueFlow<String>> {
        self.validate().map_err(FlowError::config)?;

        let mut flow = DialogueFlow::new(self.initial_state.clone(), self.initial_speaker)
            .with_compiler(compiler);
        for state in &self.states {
            flow.update_state_settings(state.id.clone(), state.settings.clone())?;
        }
        for transition in &self.transitions {
            let target: Target<String> = transition.target.clone().into();
            match transition.speaker {
                Speaker::User => flow.add_user_transition_with(
                    transition.source.clone(),
                    target,
                    &transition.expression,
                    transition.settings.clone(),
                )?,
                Speaker::System => flow.add_system_transition_with(
                    transition.source.clone(),
                    target,
                    &transition.expression,
                    transition.settings.clone(),
                )?,
            }
        }
        Ok(flow)
    }
}
