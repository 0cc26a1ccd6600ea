// Parlance - Bundled phrase-expression backend
//
// A small matching/templating language so flows can be authored and tested
// without an external NLU/NLG stack. Matching: `|`-separated alternatives,
// each an ordered word sequence where `@name` captures one word. Generation:
// `|`-separated templates where `$name` substitutes a bound variable; an
// alternative is viable only when all of its references are bound.

use rand::seq::SliceRandom;
use regex::Regex;
use std::sync::Arc;

use crate::error::{FlowError, FlowResult};
use crate::expression::{ExpressionCompiler, Generator, MatchOutcome, Matcher, Vars};

/// Compiler for the bundled phrase language
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseCompiler;

impl ExpressionCompiler for PhraseCompiler {
    fn compile_matcher(&self, expression: &str) -> FlowResult<Arc<dyn Matcher>> {
        Ok(Arc::new(PhraseMatcher::compile(expression)?))
    }

    fn compile_generator(&self, expression: &str) -> FlowResult<Arc<dyn Generator>> {
        Ok(Arc::new(TemplateGenerator::compile(expression)?))
    }
}

struct MatchAlternative {
    regex: Regex,
    /// Capture names, in group order
    names: Vec<String>,
}

/// User-side phrase matcher. Alternatives are tried in authoring order;
/// the first acceptance wins.
pub struct PhraseMatcher {
    alternatives: Vec<MatchAlternative>,
}

impl PhraseMatcher {
    pub fn compile(expression: &str) -> FlowResult<Self> {
        let mut alternatives = Vec::new();
        for alt in expression.split('|') {
            let tokens: Vec<&str> = alt.split_whitespace().collect();
            if tokens.is_empty() {
                return Err(FlowError::expression(format!(
                    "empty alternative in matcher expression {expression:?}"
                )));
            }
            let mut pattern = String::from("(?i)");
            let mut names = Vec::new();
            for (i, token) in tokens.iter().enumerate() {
                if i > 0 {
                    pattern.push_str(".*?");
                }
                if let Some(name) = token.strip_prefix('@') {
                    if !is_valid_name(name) {
                        return Err(FlowError::expression(format!(
                            "invalid capture name {token:?} in {expression:?}"
                        )));
                    }
                    pattern.push_str(r"\b(\w+)\b");
                    names.push(name.to_string());
                } else {
                    pattern.push_str(r"\b");
                    pattern.push_str(&regex::escape(token));
                    pattern.push_str(r"\b");
                }
            }
            let regex = Regex::new(&pattern)
                .map_err(|e| FlowError::expression(format!("bad matcher {expression:?}: {e}")))?;
            alternatives.push(MatchAlternative { regex, names });
        }
        Ok(Self { alternatives })
    }
}

impl Matcher for PhraseMatcher {
    fn evaluate(&self, input: &str, _vars: &Vars) -> Option<MatchOutcome> {
        for alt in &self.alternatives {
            if let Some(caps) = alt.regex.captures(input) {
                let mut outcome = MatchOutcome::new(caps.get(0).map_or("", |m| m.as_str()));
                for (i, name) in alt.names.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        outcome
                            .bindings
                            .insert(name.clone(), serde_json::Value::String(m.as_str().into()));
                    }
                }
                return Some(outcome);
            }
        }
        None
    }
}

enum Segment {
    Literal(String),
    Var(String),
}

struct TemplateAlternative {
    segments: Vec<Segment>,
}

impl TemplateAlternative {
    fn viable(&self, vars: &Vars) -> bool {
        self.segments.iter().all(|seg| match seg {
            Segment::Literal(_) => true,
            Segment::Var(name) => vars.get(name).map_or(false, |v| !v.is_null()),
        })
    }

    fn render(&self, vars: &Vars) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    if let Some(value) = vars.get(name) {
                        out.push_str(&value_text(value));
                    }
                }
            }
        }
        out
    }
}

/// System-side template generator. A random viable alternative is rendered;
/// with no viable alternative the edge is non-viable for the hop.
pub struct TemplateGenerator {
    alternatives: Vec<TemplateAlternative>,
}

impl TemplateGenerator {
    pub fn compile(expression: &str) -> FlowResult<Self> {
        let mut alternatives = Vec::new();
        for alt in expression.split('|') {
            let alt = alt.trim();
            if alt.is_empty() {
                return Err(FlowError::expression(format!(
                    "empty alternative in generator expression {expression:?}"
                )));
            }
            alternatives.push(TemplateAlternative {
                segments: parse_segments(alt),
            });
        }
        Ok(Self { alternatives })
    }
}

impl Generator for TemplateGenerator {
    fn evaluate(&self, vars: &Vars) -> Option<String> {
        let viable: Vec<&TemplateAlternative> = self
            .alternatives
            .iter()
            .filter(|alt| alt.viable(vars))
            .collect();
        let chosen = viable.choose(&mut rand::thread_rng())?;
        Some(chosen.render(vars))
    }
}

fn parse_segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                // a lone `$` stays literal
                literal.push(c);
            } else {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Var(name));
            }
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
