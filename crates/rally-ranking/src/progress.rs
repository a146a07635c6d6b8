use crate::types::RankProgress;
use rally_types::RankLadder;

/// Place a total score on the ladder. Progress interpolates linearly between
/// the current and next thresholds and clamps to 100 at the top tier.
pub fn rank_progress(ladder: &RankLadder, total_score: i64) -> RankProgress {
    let current = ladder.level_for(total_score).clone();
    let next = ladder.next_after(total_score).cloned();

    match next {
        Some(next_level) => {
            let span = (next_level.min_score - current.min_score) as f64;
            let into = (total_score - current.min_score) as f64;
            let percent = ((into / span) * 100.0).round() as u32;
            RankProgress {
                points_to_next: next_level.min_score - total_score,
                progress_percent: percent.min(100),
                current,
                next: Some(next_level),
            }
        }
        None => RankProgress {
            current,
            next: None,
            points_to_next: 0,
            progress_percent: 100,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_types::RankLevel;

    fn two_tier_ladder() -> RankLadder {
        RankLadder::new(vec![
            RankLevel {
                level: 1,
                name: "Recruit".to_string(),
                min_score: 0,
                badge: String::new(),
                color: String::new(),
            },
            RankLevel {
                level: 2,
                name: "Private".to_string(),
                min_score: 50,
                badge: String::new(),
                color: String::new(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_progress_interpolates() {
        let ladder = two_tier_ladder();
        let progress = rank_progress(&ladder, 35);
        assert_eq!(progress.current.name, "Recruit");
        assert_eq!(progress.next.as_ref().unwrap().name, "Private");
        assert_eq!(progress.points_to_next, 15);
        assert_eq!(progress.progress_percent, 70);
    }

    #[test]
    fn test_progress_at_threshold() {
        let ladder = two_tier_ladder();
        let progress = rank_progress(&ladder, 50);
        assert_eq!(progress.current.name, "Private");
        assert!(progress.next.is_none());
        assert_eq!(progress.progress_percent, 100);
        assert_eq!(progress.points_to_next, 0);
    }

    #[test]
    fn test_progress_at_zero() {
        let ladder = two_tier_ladder();
        let progress = rank_progress(&ladder, 0);
        assert_eq!(progress.current.name, "Recruit");
        assert_eq!(progress.progress_percent, 0);
        assert_eq!(progress.points_to_next, 50);
    }

    #[test]
    fn test_default_ladder_top_tier_clamps() {
        let ladder = RankLadder::default();
        let progress = rank_progress(&ladder, 1_000_000);
        assert_eq!(progress.current.name, "General");
        assert_eq!(progress.progress_percent, 100);
    }
}
