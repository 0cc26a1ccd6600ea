// Parlance - Candidate selection
//
// Pure selection policies, separated from the flow so they can be tested
// with a seeded RNG. System-side choice is weighted random with a novelty
// exclusion that is waived when it would exclude everything; user-side
// choice is a total precedence order.

use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;

use crate::expression::MatchOutcome;
use crate::state::Target;

/// A viable system-side response for the current hop
#[derive(Debug, Clone)]
pub struct GenerationCandidate<S> {
    pub text: String,
    pub target: Target<S>,
    pub weight: f64,
}

/// A user-side edge that accepted the input
#[derive(Debug, Clone)]
pub struct MatchCandidate<S> {
    pub target: Target<S>,
    pub outcome: MatchOutcome,
    pub priority: i64,
    pub order: usize,
}

/// Weighted-random choice among candidates whose text is not excluded.
/// When exclusion rules out every candidate it is waived; degenerate
/// weights fall back to a uniform draw.
pub fn pick_weighted<'a, S, R>(
    candidates: &'a [GenerationCandidate<S>],
    excluded: impl Fn(&str) -> bool,
    rng: &mut R,
) -> Option<&'a GenerationCandidate<S>>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }
    let fresh: Vec<&GenerationCandidate<S>> = candidates
        .iter()
        .filter(|c| !excluded(&c.text))
        .collect();
    let pool = if fresh.is_empty() {
        candidates.iter().collect()
    } else {
        fresh
    };
    match pool.choose_weighted(rng, |c| c.weight) {
        Ok(c) => Some(*c),
        Err(_) => pool.choose(rng).copied(),
    }
}

/// Resolve competing user-side acceptances: priority descending, then
/// captured-text length descending, then insertion order ascending.
pub fn pick_match<S>(candidates: Vec<MatchCandidate<S>>) -> Option<MatchCandidate<S>> {
    candidates
        .into_iter()
        .min_by_key(|c| (Reverse(c.priority), Reverse(c.outcome.captured.len()), c.order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gen_candidate(text: &str, target: &'static str, weight: f64) -> GenerationCandidate<&'static str> {
        GenerationCandidate {
            text: text.to_string(),
            target: Target::Local(target),
            weight,
        }
    }

    fn match_candidate(
        target: &'static str,
        captured: &str,
        priority: i64,
        order: usize,
    ) -> MatchCandidate<&'static str> {
        MatchCandidate {
            target: Target::Local(target),
            outcome: MatchOutcome::new(captured),
            priority,
            order,
        }
    }

    #[test]
    fn test_pick_weighted_prefers_fresh_candidates() {
        let candidates = vec![gen_candidate("stale", "a", 10.0), gen_candidate("new", "b", 0.1)];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let picked = pick_weighted(&candidates, |t| t == "stale", &mut rng).unwrap();
            assert_eq!(picked.text, "new");
        }
    }

    #[test]
    fn test_pick_weighted_waives_exclusion_when_total() {
        let candidates = vec![gen_candidate("a", "a", 1.0), gen_candidate("b", "b", 1.0)];
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_weighted(&candidates, |_| true, &mut rng).is_some());
    }

    #[test]
    fn test_pick_weighted_respects_weights() {
        let candidates = vec![gen_candidate("never", "a", 0.0), gen_candidate("always", "b", 1.0)];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let picked = pick_weighted(&candidates, |_| false, &mut rng).unwrap();
            assert_eq!(picked.text, "always");
        }
    }

    #[test]
    fn test_pick_weighted_degenerate_weights_fall_back() {
        let candidates = vec![gen_candidate("a", "a", 0.0), gen_candidate("b", "b", 0.0)];
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_weighted(&candidates, |_| false, &mut rng).is_some());
        assert!(pick_weighted(&[] as &[GenerationCandidate<&str>], |_| false, &mut rng).is_none());
    }

    #[test]
    fn test_pick_match_priority_then_specificity_then_order() {
        let winner = pick_match(vec![
            match_candidate("low", "a much longer capture", 0, 0),
            match_candidate("high", "x", 5, 1),
        ])
        .unwrap();
        assert_eq!(winner.target, Target::Local("high"));

        let winner = pick_match(vec![
            match_candidate("short", "hi", 0, 0),
            match_candidate("long", "hi there", 0, 1),
        ])
        .unwrap();
        assert_eq!(winner.target, Target::Local("long"));

        let winner = pick_match(vec![
            match_candidate("first", "same", 0, 0),
            match_candidate("second", "same", 0, 1),
        ])
        .unwrap();
        assert_eq!(winner.target, Target::Local("first"));

        assert!(pick_match::<&str>(vec![]).is_none());
    }
}
