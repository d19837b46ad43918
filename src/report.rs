use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::catalog::{ACHIEVEMENTS, BADGES};
use crate::models::{BadgeCategory, CategorySummary, UserProgress};
use crate::scoring;

pub fn summarize_by_category(progress: &UserProgress) -> Vec<CategorySummary> {
    BadgeCategory::ALL
        .iter()
        .map(|&category| {
            let in_category = BADGES.iter().filter(|badge| badge.category == category);
            let (total, unlocked) = in_category.fold((0, 0), |(total, unlocked), badge| {
                let held = usize::from(progress.badges.contains(badge.id));
                (total + 1, unlocked + held)
            });
            CategorySummary {
                category,
                unlocked,
                total,
            }
        })
        .collect()
}

pub fn build_report(user_id: &str, progress: &UserProgress, generated_at: DateTime<Utc>) -> String {
    let parts = scoring::breakdown(progress);
    let summaries = summarize_by_category(progress);

    let mut output = String::new();

    let _ = writeln!(output, "# Chai Finder Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        user_id,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Score");
    let _ = writeln!(output, "- Achievements: {}", parts.achievement_points);
    let _ = writeln!(output, "- Badges: {}", parts.badge_points);
    let _ = writeln!(output, "- Current streak: {}", parts.streak_points);
    let _ = writeln!(output, "- Streak milestone bonus: {}", parts.milestone_bonus);
    let _ = writeln!(output, "- **Total: {}**", parts.total());
    if progress.total_score != parts.total() {
        let _ = writeln!(
            output,
            "- Stored total {} is out of date and will be reconciled on the next evaluation",
            progress.total_score
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Streak");
    let _ = writeln!(
        output,
        "- Current: {} weeks (longest {})",
        progress.current_streak, progress.longest_streak
    );
    match progress.last_streak_week {
        Some(week) => {
            let _ = writeln!(output, "- Last closed week: {week}");
        }
        None => {
            let _ = writeln!(output, "- No weeks closed yet");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Badges");

    for summary in summaries.iter() {
        let _ = writeln!(
            output,
            "### {} ({}/{})",
            summary.category.label(),
            summary.unlocked,
            summary.total
        );
        for badge in BADGES.iter().filter(|badge| badge.category == summary.category) {
            if progress.badges.contains(badge.id) {
                let _ = writeln!(output, "- [x] {} ({})", badge.name, badge.rarity);
                continue;
            }
            match badge.rule.progress_target() {
                Some((counter, threshold)) => {
                    let _ = writeln!(
                        output,
                        "- [ ] {}: {} ({}/{})",
                        badge.name,
                        badge.description,
                        counter.read(progress).min(threshold),
                        threshold
                    );
                }
                None => {
                    let _ = writeln!(output, "- [ ] {}: {}", badge.name, badge.description);
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Achievements");

    let mut unlocked: Vec<_> = ACHIEVEMENTS
        .iter()
        .filter_map(|achievement| {
            progress
                .achievements
                .get(achievement.id)
                .map(|at| (achievement, *at))
        })
        .collect();
    unlocked.sort_by(|a, b| b.1.cmp(&a.1));

    if unlocked.is_empty() {
        let _ = writeln!(output, "No achievements unlocked yet.");
    } else {
        for (achievement, at) in unlocked.iter() {
            let _ = writeln!(
                output,
                "- {} (+{}) on {}",
                achievement.name,
                achievement.points,
                at.date_naive()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_progress() -> UserProgress {
        let mut progress = UserProgress {
            total_reviews: 3,
            spots_visited: 3,
            current_streak: 2,
            longest_streak: 2,
            ..UserProgress::default()
        };
        progress.badges.insert("first_review".to_string());
        progress.badges.insert("first_photo".to_string());
        progress.achievements.insert(
            "first_review".to_string(),
            Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        );
        progress.total_score = scoring::total_score(&progress);
        progress
    }

    #[test]
    fn categories_count_unlocked_badges() {
        let summaries = summarize_by_category(&sample_progress());
        let first_steps = summaries
            .iter()
            .find(|s| s.category == BadgeCategory::FirstSteps)
            .unwrap();
        assert_eq!((first_steps.unlocked, first_steps.total), (2, 3));
        let total: usize = summaries.iter().map(|s| s.total).sum();
        assert_eq!(total, BADGES.len());
    }

    #[test]
    fn report_lists_score_badges_and_progress() {
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).unwrap();
        let report = build_report("avery", &sample_progress(), generated_at);

        assert!(report.contains("Generated for avery on 2026-02-03 12:00 UTC"));
        // 10 + 2 * 10 + 2 * 5 + 10
        assert!(report.contains("**Total: 50**"));
        assert!(report.contains("- [x] First Sip (common)"));
        assert!(report.contains("- [ ] Wanderer: Visit 5 different chai spots (3/5)"));
        assert!(report.contains("- First Review (+10) on 2026-02-01"));
        assert!(!report.contains("out of date"));
    }

    #[test]
    fn report_flags_a_stale_total() {
        let mut progress = sample_progress();
        progress.total_score = 7;
        let report = build_report("avery", &progress, Utc::now());
        assert!(report.contains("Stored total 7 is out of date"));
    }
}
