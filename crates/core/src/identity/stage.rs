use chrono::{DateTime, Utc};

use crate::identity::profile::Profile;

pub const MAX_STAGE: u8 = 3;
/// Progress added per qualifying user turn.
pub const PROGRESS_STEP: f64 = 0.03;
pub const MAX_PROGRESS: f64 = 3.0;

const DAY_MS: f64 = 86_400_000.0;

/// Highest stage reachable after `days` of acquaintance.
pub fn time_cap(days: f64) -> u8 {
    if days >= 60.0 {
        3
    } else if days >= 21.0 {
        2
    } else if days >= 7.0 {
        1
    } else {
        0
    }
}

/// Days since `since` as a fraction (12 hours is 0.5), never negative.
pub fn days_between(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - since).num_milliseconds() as f64 / DAY_MS).max(0.0)
}

/// Stage gated by both elapsed time and accumulated progress.
pub fn compute_stage(profile: &Profile, now: DateTime<Utc>) -> u8 {
    let time = time_cap(days_between(profile.first_seen, now));
    let progress = if profile.progress.is_finite() {
        profile.progress.clamp(0.0, MAX_PROGRESS)
    } else {
        0.0
    };
    time.min(progress.floor() as u8).min(MAX_STAGE)
}

/// Record one user turn with the standard step.
pub fn bump_progress(profile: &Profile, now: DateTime<Utc>) -> Profile {
    bump_progress_by(profile, now, PROGRESS_STEP)
}

/// Record one user turn: count it, stamp `last_seen`, advance progress by `step`
/// (rounded to 4 decimals, capped at 3) and recompute the stage.
pub fn bump_progress_by(profile: &Profile, now: DateTime<Utc>, step: f64) -> Profile {
    let mut next = profile.clone();
    let step = if step.is_finite() { step.max(0.0) } else { 0.0 };
    let advanced = ((profile.progress + step) * 10_000.0).round() / 10_000.0;
    next.progress = advanced.max(profile.progress).min(MAX_PROGRESS);
    next.interactions = profile.interactions.saturating_add(1);
    next.last_seen = now;
    next.stage = compute_stage(&next, now);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile_aged(days: i64, progress: f64, now: DateTime<Utc>) -> Profile {
        let mut p = Profile::new(now - Duration::days(days));
        p.progress = progress;
        p
    }

    #[test]
    fn days_between_is_fractional() {
        let now = Utc::now();
        assert!((days_between(now - Duration::hours(12), now) - 0.5).abs() < 1e-9);
        assert_eq!(days_between(now + Duration::days(1), now), 0.0);
    }

    #[test]
    fn time_cap_thresholds() {
        assert_eq!(time_cap(0.0), 0);
        assert_eq!(time_cap(6.99), 0);
        assert_eq!(time_cap(7.0), 1);
        assert_eq!(time_cap(21.0), 2);
        assert_eq!(time_cap(59.9), 2);
        assert_eq!(time_cap(60.0), 3);
    }

    #[test]
    fn brand_new_profile_is_stage_zero_whatever_the_progress() {
        let now = Utc::now();
        assert_eq!(compute_stage(&profile_aged(0, 3.0, now), now), 0);
    }

    #[test]
    fn old_and_engaged_profile_reaches_stage_three() {
        let now = Utc::now();
        assert_eq!(compute_stage(&profile_aged(61, 3.0, now), now), 3);
    }

    #[test]
    fn stage_takes_the_lower_gate() {
        let now = Utc::now();
        assert_eq!(compute_stage(&profile_aged(61, 1.5, now), now), 1);
        assert_eq!(compute_stage(&profile_aged(8, 2.9, now), now), 1);
        assert_eq!(compute_stage(&profile_aged(30, 2.0, now), now), 2);
    }

    #[test]
    fn future_first_seen_counts_as_zero_days() {
        let now = Utc::now();
        let p = profile_aged(-5, 3.0, now);
        assert_eq!(compute_stage(&p, now), 0);
    }

    #[test]
    fn stage_is_monotone_in_time_and_progress() {
        let base = Utc::now();
        for step in 0..=30 {
            let progress = step as f64 * 0.1;
            let mut last = 0;
            for day in 0..=90 {
                let p = profile_aged(0, progress, base);
                let stage = compute_stage(&p, base + Duration::days(day));
                assert!(stage >= last && stage <= MAX_STAGE);
                last = stage;
            }
        }
        for day in [0, 7, 21, 60, 90] {
            let mut last = 0;
            for step in 0..=40 {
                let stage = compute_stage(&profile_aged(day, step as f64 * 0.1, base), base);
                assert!(stage >= last && stage <= MAX_STAGE);
                last = stage;
            }
        }
    }

    #[test]
    fn bump_accumulates_exact_steps() {
        let now = Utc::now();
        let mut p = Profile::new(now);
        for n in 1..=50u32 {
            p = bump_progress(&p, now);
            let expected = (PROGRESS_STEP * n as f64).min(3.0);
            assert!((p.progress - expected).abs() < 1e-9, "n={n} got {}", p.progress);
        }
        assert_eq!(p.interactions, 50);
    }

    #[test]
    fn hundred_bumps_clamp_to_three() {
        let now = Utc::now();
        let mut p = Profile::new(now);
        for _ in 0..100 {
            p = bump_progress(&p, now);
        }
        assert_eq!(p.progress, 3.0);
        for _ in 0..10 {
            p = bump_progress(&p, now);
        }
        assert_eq!(p.progress, 3.0);
        assert_eq!(p.interactions, 110);
    }

    #[test]
    fn bump_updates_last_seen_and_stage() {
        let start = Utc::now() - Duration::days(10);
        let mut p = Profile::new(start);
        p.progress = 0.99;
        let now = Utc::now();
        let next = bump_progress(&p, now);
        assert_eq!(next.last_seen, now);
        assert_eq!(next.first_seen, start);
        assert_eq!(next.stage, 1);
        // input is untouched
        assert_eq!(p.interactions, 0);
    }

    #[test]
    fn bump_is_deterministic() {
        let now = Utc::now();
        let p = profile_aged(12, 0.5, now);
        assert_eq!(bump_progress(&p, now), bump_progress(&p, now));
    }
}
