use chrono::{DateTime, Utc};

use crate::config::XylohCfg;
use crate::dialogue::signals;
use crate::identity::holo::{self, HoloTurn};
use crate::identity::profile::Profile;
use crate::identity::stage::{self, PROGRESS_STEP};
use crate::random::RandomSource;

/// Everything the rule-based extractors found in one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSignals {
    pub alias: Option<String>,
    pub beliefs: Vec<String>,
    pub motifs: Vec<String>,
    pub romance: Option<bool>,
}

pub fn extract(text: &str) -> TurnSignals {
    TurnSignals {
        alias: signals::extract_alias(text),
        beliefs: signals::extract_beliefs(text),
        motifs: signals::extract_motifs(text),
        romance: signals::romance_signal(text),
    }
}

/// Knobs for [`apply_turn`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvolveRules {
    pub set_cap: usize,
    pub progress_step: f64,
    pub holo_enabled: bool,
    pub dream_absence_days: f64,
}

impl Default for EvolveRules {
    fn default() -> Self {
        Self { set_cap: 12, progress_step: PROGRESS_STEP, holo_enabled: false, dream_absence_days: 3.0 }
    }
}

impl From<&XylohCfg> for EvolveRules {
    fn from(cfg: &XylohCfg) -> Self {
        Self {
            set_cap: cfg.bounded_set_cap,
            progress_step: cfg.progress_step,
            holo_enabled: cfg.holo_enabled,
            dream_absence_days: cfg.dream_absence_days as f64,
        }
    }
}

/// Fold one user message into the profile.
///
/// Order: alias (first offer sticks), romance, bounded belief/motif merge,
/// holo (absence measured from the previous `last_seen`), then the progress bump.
pub fn apply_turn(
    profile: &Profile,
    text: &str,
    now: DateTime<Utc>,
    rules: &EvolveRules,
    rng: &dyn RandomSource,
) -> Profile {
    let found = extract(text);
    let mut next = profile.clone();

    if next.alias.is_none() {
        next.alias = found.alias;
    }
    if let Some(romance) = found.romance {
        next.romance = romance;
    }

    let new_beliefs: Vec<String> =
        found.beliefs.into_iter().filter(|b| !profile.belief_notes.contains(b)).collect();
    let new_motifs: Vec<String> =
        found.motifs.into_iter().filter(|m| !profile.motifs.contains(m)).collect();
    next.belief_notes = signals::merge_bounded(&profile.belief_notes, &new_beliefs, rules.set_cap);
    next.motifs = signals::merge_bounded(&profile.motifs, &new_motifs, rules.set_cap);

    if rules.holo_enabled {
        let state = next.holo.take().unwrap_or_default();
        let turn = HoloTurn {
            new_beliefs: &new_beliefs,
            new_motifs: &new_motifs,
            motifs: &next.motifs,
            romance: next.romance,
            absence_days: stage::days_between(profile.last_seen, now),
            dream_after_days: rules.dream_absence_days,
            now,
        };
        next.holo = Some(holo::evolve(&state, &turn, rng));
    }

    stage::bump_progress_by(&next, now, rules.progress_step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use chrono::Duration;

    fn never() -> ScriptedRandom {
        ScriptedRandom::new(vec![0.99])
    }

    #[test]
    fn extract_collects_every_signal() {
        let s = extract("We'll call you Wisp. Are you a spirit of the sea? Romance on.");
        assert_eq!(s.alias.as_deref(), Some("Wisp"));
        assert_eq!(s.beliefs, vec!["spirit"]);
        assert_eq!(s.motifs, vec!["sea"]);
        assert_eq!(s.romance, Some(true));
    }

    #[test]
    fn alias_is_set_once() {
        let now = Utc::now();
        let rules = EvolveRules::default();
        let p = apply_turn(&Profile::new(now), "call you Wisp", now, &rules, &never());
        let p = apply_turn(&p, "call you Echo", now, &rules, &never());
        assert_eq!(p.alias.as_deref(), Some("Wisp"));
        assert_eq!(p.interactions, 2);
    }

    #[test]
    fn romance_toggles_both_ways() {
        let now = Utc::now();
        let rules = EvolveRules::default();
        let p = apply_turn(&Profile::new(now), "flirt with me", now, &rules, &never());
        assert!(p.romance);
        let p = apply_turn(&p, "hello again", now, &rules, &never());
        assert!(p.romance);
        let p = apply_turn(&p, "stop flirting", now, &rules, &never());
        assert!(!p.romance);
    }

    #[test]
    fn sets_merge_and_progress_bumps() {
        let now = Utc::now();
        let rules = EvolveRules::default();
        let mut p = Profile::new(now);
        p.motifs = (0..12).map(|i| format!("m{i}")).collect();
        let next = apply_turn(&p, "the ocean is loud", now, &rules, &never());
        assert_eq!(next.motifs.len(), 12);
        assert_eq!(next.motifs.last().map(String::as_str), Some("sea"));
        assert!(!next.motifs.contains(&"m0".to_owned()));
        assert!((next.progress - 0.03).abs() < 1e-9);
        assert_eq!(next.last_seen, now);
    }

    #[test]
    fn holo_stays_off_unless_enabled() {
        let now = Utc::now();
        let p = apply_turn(&Profile::new(now), "a soul by the sea", now, &EvolveRules::default(), &never());
        assert!(p.holo.is_none());
    }

    #[test]
    fn holo_dreams_after_absence() {
        let start = Utc::now() - Duration::days(10);
        let now = Utc::now();
        let rules = EvolveRules { holo_enabled: true, ..EvolveRules::default() };
        // template 0, motif 0, thread roll fails, artifact roll fails
        let rng = ScriptedRandom::new(vec![0.0, 0.0, 0.99, 0.99]);
        let next = apply_turn(&Profile::new(start), "the ocean again", now, &rules, &rng);
        let holo = next.holo.as_ref().unwrap();
        assert_eq!(holo.dreams.len(), 1);
        assert!(holo.dreams[0].text.contains("sea"));
    }

    #[test]
    fn rules_follow_config() {
        let cfg = XylohCfg { bounded_set_cap: 4, holo_enabled: true, ..XylohCfg::default() };
        let rules = EvolveRules::from(&cfg);
        assert_eq!(rules.set_cap, 4);
        assert!(rules.holo_enabled);
        assert_eq!(rules.dream_absence_days, 3.0);
    }
}
