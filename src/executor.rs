use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::models::{Effect, Notification};
use crate::notify::NotificationSink;
use crate::store::{ProgressStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub written: usize,
    pub unchanged: usize,
    pub failed: Vec<String>,
    pub notified: usize,
    pub suppressed: usize,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies `effects` for `user_id` in order.
///
/// Each write is independent: a failure is logged and recorded, later effects
/// still run, and nothing already written is undone. A notification goes out
/// only if the write it announces succeeded and actually changed the document.
pub async fn apply<S, N>(
    store: &S,
    sink: &N,
    user_id: &str,
    effects: &[Effect],
    retry: &RetryPolicy,
) -> ApplyReport
where
    S: ProgressStore,
    N: NotificationSink,
{
    let mut report = ApplyReport::default();
    let mut fresh_badges: HashSet<&str> = HashSet::new();
    let mut fresh_achievements: HashSet<&str> = HashSet::new();
    let mut streak_written = false;

    for effect in effects {
        match effect {
            Effect::UnlockBadge(id) => {
                let outcome = with_retry(retry, "add_badge", move || {
                    store.add_badge(user_id, id)
                })
                .await;
                match outcome {
                    Ok(true) => {
                        fresh_badges.insert(id.as_str());
                        report.written += 1;
                    }
                    Ok(false) => report.unchanged += 1,
                    Err(err) => record_failure(&mut report, user_id, effect, &err),
                }
            }
            Effect::UnlockAchievement { id, at } => {
                let at = *at;
                let outcome = with_retry(retry, "set_achievement", move || {
                    store.set_achievement(user_id, id, at)
                })
                .await;
                match outcome {
                    Ok(true) => {
                        fresh_achievements.insert(id.as_str());
                        report.written += 1;
                    }
                    Ok(false) => report.unchanged += 1,
                    Err(err) => record_failure(&mut report, user_id, effect, &err),
                }
            }
            Effect::SetScore(score) => {
                let score = *score;
                let outcome = with_retry(retry, "set_total_score", move || {
                    store.set_total_score(user_id, score)
                })
                .await;
                match outcome {
                    Ok(()) => report.written += 1,
                    Err(err) => record_failure(&mut report, user_id, effect, &err),
                }
            }
            Effect::SetStreak {
                current,
                longest,
                week,
            } => {
                let (current, longest, week) = (*current, *longest, *week);
                let outcome = with_retry(retry, "set_streak", move || {
                    store.set_streak(user_id, current, longest, week)
                })
                .await;
                match outcome {
                    Ok(()) => {
                        streak_written = true;
                        report.written += 1;
                    }
                    Err(err) => record_failure(&mut report, user_id, effect, &err),
                }
            }
            Effect::Notify(notification) => {
                let announced = match notification {
                    Notification::BadgeUnlocked { badge_id, .. } => {
                        fresh_badges.contains(badge_id.as_str())
                    }
                    Notification::AchievementUnlocked { achievement_id, .. } => {
                        fresh_achievements.contains(achievement_id.as_str())
                    }
                    Notification::StreakMilestone { .. } => streak_written,
                };
                if !announced {
                    debug!(user_id, kind = notification.kind(), "notification suppressed");
                    report.suppressed += 1;
                    continue;
                }
                match sink.deliver(notification.clone()) {
                    Ok(()) => report.notified += 1,
                    Err(err) => {
                        warn!(user_id, kind = notification.kind(), %err, "notification dropped");
                    }
                }
            }
        }
    }

    report
}

fn record_failure(report: &mut ApplyReport, user_id: &str, effect: &Effect, err: &StoreError) {
    warn!(user_id, ?effect, %err, "failed to persist effect");
    report.failed.push(format!("{effect:?}: {err}"));
}

async fn with_retry<T, F, Fut>(retry: &RetryPolicy, what: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < retry.max_attempts => {
                let delay = retry.delay_for(attempt);
                warn!(what, attempt, ?delay, %err, "store write failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::models::WeekKey;
    use crate::notify::ChannelSink;
    use crate::store::memory::{MemoryStore, Op};

    fn no_wait(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn badge_effects(id: &str) -> Vec<Effect> {
        vec![
            Effect::UnlockBadge(id.to_string()),
            Effect::SetScore(10),
            Effect::Notify(Notification::BadgeUnlocked {
                user_id: "u1".to_string(),
                badge_id: id.to_string(),
                name: "Wanderer".to_string(),
            }),
        ]
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn applies_writes_and_notifies() {
        let store = MemoryStore::default();
        let (sink, mut rx) = ChannelSink::channel();
        let report = apply(&store, &sink, "u1", &badge_effects("5_spots"), &no_wait(3)).await;

        assert!(report.is_clean());
        assert_eq!(report.written, 2);
        assert_eq!(report.notified, 1);
        assert_eq!(
            store.document("u1"),
            Some(json!({ "badges": ["5_spots"], "totalScore": 10 }))
        );
        assert_eq!(rx.try_recv().unwrap().kind(), "badge_unlocked");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let store = MemoryStore::default();
        store.fail_transiently(Op::AddBadge, 2);
        let (sink, _rx) = ChannelSink::channel();
        let report = apply(&store, &sink, "u1", &badge_effects("5_spots"), &no_wait(3)).await;

        assert!(report.is_clean());
        assert_eq!(store.calls(Op::AddBadge), 3);
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_without_stopping_later_effects() {
        let store = MemoryStore::default();
        store.fail_transiently(Op::AddBadge, 5);
        let (sink, mut rx) = ChannelSink::channel();
        let report = apply(&store, &sink, "u1", &badge_effects("5_spots"), &no_wait(2)).await;

        assert_eq!(store.calls(Op::AddBadge), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.written, 1);
        assert_eq!(report.suppressed, 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.document("u1"), Some(json!({ "totalScore": 10 })));
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let store = MemoryStore::default();
        store.fail_permanently(Op::SetScore);
        let (sink, _rx) = ChannelSink::channel();
        let report = apply(&store, &sink, "u1", &badge_effects("5_spots"), &no_wait(5)).await;

        assert_eq!(store.calls(Op::SetScore), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn duplicate_award_is_not_announced_twice() {
        let store = MemoryStore::with_document("u1", json!({ "badges": ["5_spots"] }));
        let (sink, mut rx) = ChannelSink::channel();
        let report = apply(&store, &sink, "u1", &badge_effects("5_spots"), &no_wait(3)).await;

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.notified, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn milestone_waits_for_the_streak_write() {
        let effects = vec![
            Effect::SetStreak {
                current: 3,
                longest: 3,
                week: WeekKey { year: 2026, week: 12 },
            },
            Effect::Notify(Notification::StreakMilestone {
                user_id: "u1".to_string(),
                weeks: 3,
            }),
        ];

        let store = MemoryStore::default();
        store.fail_permanently(Op::SetStreak);
        let (sink, _rx) = ChannelSink::channel();
        let report = apply(&store, &sink, "u1", &effects, &no_wait(1)).await;
        assert_eq!(report.suppressed, 1);

        let store = MemoryStore::default();
        let report = apply(&store, &sink, "u1", &effects, &no_wait(1)).await;
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn achievement_keeps_its_first_timestamp() {
        let store = MemoryStore::with_document(
            "u1",
            json!({ "achievements": { "first_review": "2026-01-01T00:00:00Z" } }),
        );
        let (sink, _rx) = ChannelSink::channel();
        let effects = vec![Effect::UnlockAchievement {
            id: "first_review".to_string(),
            at: Utc::now(),
        }];
        let report = apply(&store, &sink, "u1", &effects, &no_wait(1)).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(
            store.document("u1").unwrap()["achievements"]["first_review"],
            json!("2026-01-01T00:00:00Z")
        );
    }
}
