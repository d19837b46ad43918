use crate::catalog::{ACHIEVEMENTS, BADGES};
use crate::models::{Effect, Evaluation, Notification, Trigger, UserProgress};
use crate::scoring;

/// Works out which catalog entries newly qualify for `progress` given `trigger`.
///
/// Pure: nothing is written. The returned effects are, in order, one unlock per
/// new entry, a score write when the recomputed total differs from the stored
/// one (always the case after an unlock), and one notification per new entry.
pub fn evaluate(user_id: &str, progress: &UserProgress, trigger: &Trigger) -> Evaluation {
    let at = trigger.occurred_at();

    let new_badges: Vec<&'static crate::models::Badge> = BADGES
        .iter()
        .filter(|badge| !progress.badges.contains(badge.id))
        .filter(|badge| badge.rule.is_met(progress, trigger))
        .collect();

    let new_achievements: Vec<&'static crate::models::Achievement> = ACHIEVEMENTS
        .iter()
        .filter(|achievement| !progress.achievements.contains_key(achievement.id))
        .filter(|achievement| achievement.rule.is_met(progress, trigger))
        .collect();

    let mut projected = progress.clone();
    projected
        .badges
        .extend(new_badges.iter().map(|badge| badge.id.to_string()));
    for achievement in new_achievements.iter() {
        projected.achievements.insert(achievement.id.to_string(), at);
    }
    let score = scoring::total_score(&projected);

    let mut effects = Vec::new();
    for badge in new_badges.iter() {
        effects.push(Effect::UnlockBadge(badge.id.to_string()));
    }
    for achievement in new_achievements.iter() {
        effects.push(Effect::UnlockAchievement {
            id: achievement.id.to_string(),
            at,
        });
    }
    if score != progress.total_score || !new_badges.is_empty() || !new_achievements.is_empty() {
        effects.push(Effect::SetScore(score));
    }
    for badge in new_badges.iter() {
        effects.push(Effect::Notify(Notification::BadgeUnlocked {
            user_id: user_id.to_string(),
            badge_id: badge.id.to_string(),
            name: badge.name.to_string(),
        }));
    }
    for achievement in new_achievements.iter() {
        effects.push(Effect::Notify(Notification::AchievementUnlocked {
            user_id: user_id.to_string(),
            achievement_id: achievement.id.to_string(),
            name: achievement.name.to_string(),
            points: achievement.points,
        }));
    }

    Evaluation {
        new_badges: new_badges.iter().map(|badge| badge.id.to_string()).collect(),
        new_achievements: new_achievements
            .iter()
            .map(|achievement| achievement.id.to_string())
            .collect(),
        score,
        effects,
    }
}
