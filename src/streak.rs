use crate::models::{Effect, Notification, UserProgress, WeekKey};

pub const DEFAULT_WEEKLY_TARGET: u32 = 3;
pub const MILESTONES: [u32; 6] = [3, 7, 14, 30, 50, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakState {
    Active(u32),
    Broken,
}

impl StreakState {
    pub fn from_count(count: u32) -> Self {
        if count == 0 {
            StreakState::Broken
        } else {
            StreakState::Active(count)
        }
    }

    pub fn count(self) -> u32 {
        match self {
            StreakState::Active(n) => n,
            StreakState::Broken => 0,
        }
    }

    pub fn advance(self, qualifying: bool) -> Self {
        match (self, qualifying) {
            (StreakState::Active(n), true) => StreakState::Active(n.saturating_add(1)),
            (StreakState::Broken, true) => StreakState::Active(1),
            (_, false) => StreakState::Broken,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub week: WeekKey,
    pub previous: u32,
    pub current: u32,
    pub longest: u32,
    pub milestone: Option<u32>,
}

impl StreakUpdate {
    pub fn effects(&self, user_id: &str) -> Vec<Effect> {
        let mut effects = vec![Effect::SetStreak {
            current: self.current,
            longest: self.longest,
            week: self.week,
        }];
        if let Some(weeks) = self.milestone {
            effects.push(Effect::Notify(Notification::StreakMilestone {
                user_id: user_id.to_string(),
                weeks,
            }));
        }
        effects
    }

    /// The snapshot as it reads once this update is persisted.
    pub fn apply_to(&self, progress: &UserProgress) -> UserProgress {
        UserProgress {
            current_streak: self.current,
            longest_streak: self.longest,
            last_streak_week: Some(self.week),
            ..progress.clone()
        }
    }
}

/// Closes `week` with `qualifying_count` ratings against `target`.
///
/// Returns `None` when `week` is not after the last closed week, so a week
/// can move the streak (and fire a milestone) at most once. Weeks skipped
/// since the last closed one count as missed: the streak breaks before
/// `week` is applied.
pub fn close_week(
    progress: &UserProgress,
    week: WeekKey,
    qualifying_count: u32,
    target: u32,
) -> Option<StreakUpdate> {
    if progress.last_streak_week.is_some_and(|last| week <= last) {
        return None;
    }

    let previous = progress.current_streak;
    let mut state = StreakState::from_count(previous);
    if progress
        .last_streak_week
        .is_some_and(|last| last.next() != Some(week))
    {
        state = state.advance(false);
    }
    let current = state.advance(qualifying_count >= target).count();
    let longest = progress.longest_streak.max(current);
    let milestone = (current > previous && MILESTONES.contains(&current)).then_some(current);

    Some(StreakUpdate {
        week,
        previous,
        current,
        longest,
        milestone,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(n: u32) -> WeekKey {
        WeekKey { year: 2026, week: n }
    }

    fn progress(current: u32, longest: u32) -> UserProgress {
        UserProgress {
            current_streak: current,
            longest_streak: longest,
            ..UserProgress::default()
        }
    }

    #[test]
    fn qualifying_week_extends_streak() {
        let update = close_week(&progress(4, 4), week(10), 3, 3).unwrap();
        assert_eq!(update.current, 5);
        assert_eq!(update.longest, 5);

        let restart = close_week(&progress(0, 9), week(10), 5, 3).unwrap();
        assert_eq!(restart.current, 1);
        assert_eq!(restart.longest, 9);
    }

    #[test]
    fn short_week_breaks_streak_regardless_of_length() {
        for n in [0, 1, 6, 99] {
            let update = close_week(&progress(n, n), week(10), 2, 3).unwrap();
            assert_eq!(update.current, 0);
            assert_eq!(update.longest, n);
            assert_eq!(update.milestone, None);
        }
    }

    #[test]
    fn longest_is_a_high_water_mark() {
        let mut snapshot = progress(0, 0);
        let counts = [3, 4, 0, 3, 3, 3, 3, 1];
        let mut highest = 0;
        for (i, count) in counts.into_iter().enumerate() {
            let update = close_week(&snapshot, week(i as u32 + 1), count, 3).unwrap();
            assert_eq!(update.longest, snapshot.longest_streak.max(update.current));
            assert!(update.longest >= highest);
            highest = update.longest;
            snapshot = update.apply_to(&snapshot);
        }
        assert_eq!(snapshot.longest_streak, 4);
        assert_eq!(snapshot.current_streak, 0);
    }

    #[test]
    fn milestone_fires_on_crossing_only() {
        let update = close_week(&progress(6, 6), week(20), 3, 3).unwrap();
        assert_eq!(update.milestone, Some(7));
        assert_eq!(update.effects("u1").len(), 2);

        let update = close_week(&progress(7, 7), week(21), 3, 3).unwrap();
        assert_eq!(update.milestone, None);
        assert_eq!(update.effects("u1").len(), 1);
    }

    #[test]
    fn a_week_is_closed_once() {
        let first = close_week(&progress(2, 2), week(30), 3, 3).unwrap();
        assert_eq!(first.milestone, Some(3));
        let after = first.apply_to(&progress(2, 2));

        assert!(close_week(&after, week(30), 3, 3).is_none());
        assert!(close_week(&after, week(29), 3, 3).is_none());
        assert!(close_week(&after, week(31), 3, 3).is_some());
    }

    #[test]
    fn skipped_weeks_break_the_streak() {
        let mut snapshot = progress(5, 5);
        snapshot.last_streak_week = Some(week(10));

        let update = close_week(&snapshot, week(20), 3, 3).unwrap();
        assert_eq!((update.previous, update.current, update.longest), (5, 1, 5));
        assert_eq!(update.milestone, None);

        let adjacent = close_week(&snapshot, week(11), 3, 3).unwrap();
        assert_eq!(adjacent.current, 6);
    }

    #[test]
    fn streak_carries_across_the_year_boundary() {
        let mut snapshot = progress(2, 2);
        snapshot.last_streak_week = Some(WeekKey { year: 2026, week: 53 });
        let update = close_week(&snapshot, WeekKey { year: 2027, week: 1 }, 3, 3).unwrap();
        assert_eq!(update.current, 3);
        assert_eq!(update.milestone, Some(3));
    }

    #[test]
    fn custom_target_is_honoured() {
        assert_eq!(close_week(&progress(1, 1), week(5), 1, 1).unwrap().current, 2);
        assert_eq!(close_week(&progress(1, 1), week(5), 4, 5).unwrap().current, 0);
    }
}
