//! CompositeDialogueFlow Behavior Tests
//!
//! Coverage of namespace handover: authoring that addresses components,
//! turns that cross namespaces mid-hop, binding survival across handover,
//! the composite conversability check, and reset.

use parlance::{
    CompositeDialogueFlow, DialogueFlow, FlowError, Speaker, StateSettings, ROOT_NAMESPACE,
};
use serde_json::json;

// ============================================================================
// Construction and Authoring
// ============================================================================

#[test]
fn test_composite_starts_on_root() {
    let composite: CompositeDialogueFlow<&str> =
        CompositeDialogueFlow::new("start", Speaker::System);
    assert_eq!(composite.active_namespace(), ROOT_NAMESPACE);
    assert_eq!(composite.state(), &"start");
    assert_eq!(composite.speaker(), Speaker::System);
    assert!(composite.has_component(ROOT_NAMESPACE));
    assert!(!composite.has_component("movies"));
}

#[test]
fn test_authoring_forwards_to_components() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::System);
    composite.add_component("movies", DialogueFlow::new("intro", Speaker::System));

    composite
        .add_system_transition(("movies", "intro"), "asked", "what do you watch")
        .unwrap();
    composite
        .update_state_settings(
            ("movies", "asked"),
            StateSettings::new().with_error_successor("intro"),
        )
        .unwrap();

    let movies = composite.component("movies").unwrap();
    assert_eq!(movies.graph().len(), 1);
    assert!(movies.registry().error_successor(&"asked").is_some());
    // bare states address the root component
    assert_eq!(composite.component(ROOT_NAMESPACE).unwrap().graph().len(), 0);

    assert!(matches!(
        composite.add_system_transition(("tv", "intro"), "x", "y"),
        Err(FlowError::UnknownNamespace(_))
    ));
}

// ============================================================================
// Turns Across Namespaces
// ============================================================================

#[test]
fn test_system_turn_hands_over_mid_turn() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::System);
    composite
        .add_system_transition("start", ("movies", "intro"), "let us talk movies")
        .unwrap();

    let mut movies = DialogueFlow::new("intro", Speaker::System);
    movies
        .update_state_settings("intro", StateSettings::new().with_system_multi_hop(true))
        .unwrap();
    movies
        .add_system_transition("intro", "asked", "what genre do you like")
        .unwrap();
    composite.add_component("movies", movies);

    let response = composite.system_turn().unwrap();
    assert_eq!(response, "let us talk movies what genre do you like");
    assert_eq!(composite.active_namespace(), "movies");
    assert_eq!(composite.state(), &"asked");
    assert_eq!(composite.speaker(), Speaker::User);
}

#[test]
fn test_user_turn_crosses_namespaces() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::User);
    composite
        .add_user_transition("start", ("movies", "intro"), "movies")
        .unwrap();
    composite.add_component("movies", DialogueFlow::new("intro", Speaker::System));

    composite.user_turn("let us talk movies").unwrap();
    assert_eq!(composite.active_namespace(), "movies");
    assert_eq!(composite.state(), &"intro");
    assert_eq!(composite.speaker(), Speaker::System);
}

#[test]
fn test_user_multi_hop_continues_after_handover() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::User);
    composite
        .add_user_transition("start", ("movies", "intro"), "movies")
        .unwrap();

    let mut movies = DialogueFlow::new("intro", Speaker::System);
    movies
        .update_state_settings("intro", StateSettings::new().with_user_multi_hop(true))
        .unwrap();
    movies
        .add_user_transition("intro", "genre_talk", "comedy")
        .unwrap();
    composite.add_component("movies", movies);

    // one utterance carries through the handover
    composite.user_turn("comedy movies").unwrap();
    assert_eq!(composite.active_namespace(), "movies");
    assert_eq!(composite.state(), &"genre_talk");
    assert_eq!(composite.speaker(), Speaker::System);
}

#[test]
fn test_bindings_travel_with_handover() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::System);
    composite
        .add_system_transition("start", ("movies", "intro"), "about movies then")
        .unwrap();
    composite
        .active_mut()
        .vars_mut()
        .insert("username".to_string(), json!("Ada"));
    composite
        .active_mut()
        .vars_mut()
        .insert("genre".to_string(), json!("comedy"));

    let mut movies = DialogueFlow::new("intro", Speaker::System);
    movies.vars_mut().insert("genre".to_string(), json!("noir"));
    movies
        .vars_mut()
        .insert("catalog_size".to_string(), json!(42));
    composite.add_component("movies", movies);

    assert_eq!(composite.system_turn().unwrap(), "about movies then");
    assert_eq!(composite.active_namespace(), "movies");
    // the handing-over side wins conflicts; everything else survives
    assert_eq!(composite.vars()["username"], json!("Ada"));
    assert_eq!(composite.vars()["genre"], json!("comedy"));
    assert_eq!(composite.vars()["catalog_size"], json!(42));
}

#[test]
fn test_turn_into_unknown_namespace_errors() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::System);
    composite
        .add_system_transition("start", ("nowhere", "x"), "off we go")
        .unwrap();
    assert!(matches!(
        composite.system_turn(),
        Err(FlowError::UnknownNamespace(_))
    ));
}

// ============================================================================
// Check and Reset
// ============================================================================

#[test]
fn test_composite_check_requires_known_namespaces() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::User);
    composite
        .add_user_transition("start", ("movies", "intro"), "movies")
        .unwrap();
    assert!(!composite.check());

    composite.add_component("movies", DialogueFlow::new("intro", Speaker::System));
    assert!(composite.check());
}

#[test]
fn test_composite_check_includes_every_component() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::User);
    let mut movies = DialogueFlow::new("intro", Speaker::System);
    // system edge whose target cannot recover from unmatched input
    movies.add_system_transition("intro", "asked", "what do you watch").unwrap();
    composite.add_component("movies", movies);
    assert!(!composite.check());

    composite
        .update_state_settings(
            ("movies", "asked"),
            StateSettings::new().with_error_successor("intro"),
        )
        .unwrap();
    assert!(composite.check());
}

#[test]
fn test_reset_reactivates_root_after_turns() {
    let mut composite = CompositeDialogueFlow::new("start", Speaker::System);
    composite
        .add_system_transition("start", ("movies", "intro"), "movie time")
        .unwrap();
    composite.add_component("movies", DialogueFlow::new("intro", Speaker::System));

    assert_eq!(composite.system_turn().unwrap(), "movie time");
    assert_eq!(composite.active_namespace(), "movies");

    composite.reset();
    assert_eq!(composite.active_namespace(), ROOT_NAMESPACE);
    assert_eq!(composite.state(), &"start");
    assert_eq!(composite.speaker(), Speaker::System);
    // the conversation runs again from the top
    assert_eq!(composite.system_turn().unwrap(), "movie time");
}
