use crate::catalog;
use crate::models::UserProgress;

pub const POINTS_PER_BADGE: u64 = 10;
pub const POINTS_PER_STREAK_WEEK: u64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub achievement_points: u64,
    pub badge_points: u64,
    pub streak_points: u64,
    pub milestone_bonus: u64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u64 {
        self.achievement_points + self.badge_points + self.streak_points + self.milestone_bonus
    }
}

/// One-time bonus keyed by the longest streak ever reached.
pub fn milestone_bonus(longest_streak: u32) -> u64 {
    match longest_streak {
        0..=1 => 0,
        2..=3 => 10,
        4..=7 => 15,
        8..=11 => 25,
        12..=25 => 50,
        26..=51 => 75,
        _ => 100,
    }
}

pub fn breakdown(progress: &UserProgress) -> ScoreBreakdown {
    // Ids no longer in the catalog are worth nothing.
    let achievement_points = progress
        .achievements
        .keys()
        .filter_map(|id| catalog::achievement(id))
        .map(|achievement| u64::from(achievement.points))
        .sum();

    ScoreBreakdown {
        achievement_points,
        badge_points: POINTS_PER_BADGE * progress.badges.len() as u64,
        streak_points: POINTS_PER_STREAK_WEEK * u64::from(progress.current_streak),
        milestone_bonus: milestone_bonus(progress.longest_streak),
    }
}

pub fn total_score(progress: &UserProgress) -> u64 {
    breakdown(progress).total()
}
