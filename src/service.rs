use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::document;
use crate::evaluator;
use crate::executor::{self, ApplyReport, RetryPolicy};
use crate::models::{Evaluation, NewRating, RatingEvent, Trigger, UserProgress, WeekKey};
use crate::notify::NotificationSink;
use crate::store::{ProgressStore, StoreError};
use crate::streak::{self, StreakUpdate};

#[derive(Debug, Clone)]
pub struct Outcome {
    pub evaluation: Evaluation,
    pub report: ApplyReport,
}

#[derive(Debug, Clone)]
pub struct WeekOutcome {
    /// `None` when the week had already been closed.
    pub streak: Option<StreakUpdate>,
    pub evaluation: Option<Evaluation>,
    pub report: ApplyReport,
}

/// Reads a fresh snapshot, evaluates it and applies the resulting effects.
///
/// The returned evaluation describes what qualified, whether or not every
/// write landed; check the report for persistence failures.
pub struct Engine<S, N> {
    store: S,
    sink: N,
    retry: RetryPolicy,
    weekly_target: u32,
}

impl<S, N> Engine<S, N>
where
    S: ProgressStore,
    N: NotificationSink,
{
    pub fn new(store: S, sink: N, retry: RetryPolicy, weekly_target: u32) -> Self {
        Self {
            store,
            sink,
            retry,
            weekly_target,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn progress(&self, user_id: &str) -> Result<UserProgress, StoreError> {
        let document = self.store.fetch_document(user_id).await.map_err(|err| {
            warn!(user_id, %err, "failed to read progress, skipping evaluation");
            err
        })?;
        Ok(document::decode_progress(user_id, document.as_ref()))
    }

    /// Records one rating and evaluates it against the snapshot it produced.
    ///
    /// Returns `None` for a rating that was already recorded. Batches must go
    /// through here one rating at a time so each evaluation sees the counters
    /// as they stood right after its own rating.
    pub async fn ingest(&self, rating: &NewRating) -> Result<Option<Outcome>, StoreError> {
        let recorded = self.store.record_rating(rating).await.map_err(|err| {
            warn!(user_id = %rating.user_id, %err, "failed to record rating");
            err
        })?;
        match recorded {
            Some(event) => self.on_rating(event).await.map(Some),
            None => {
                debug!(
                    user_id = %rating.user_id,
                    source_key = ?rating.source_key,
                    "rating already recorded"
                );
                Ok(None)
            }
        }
    }

    pub async fn on_rating(&self, event: RatingEvent) -> Result<Outcome, StoreError> {
        let user_id = event.user_id.clone();
        self.evaluate(&user_id, Trigger::Rating(event)).await
    }

    pub async fn on_friend_added(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Outcome, StoreError> {
        self.evaluate(user_id, Trigger::FriendAdded { at }).await
    }

    pub async fn evaluate(&self, user_id: &str, trigger: Trigger) -> Result<Outcome, StoreError> {
        let progress = self.progress(user_id).await?;
        let evaluation = evaluator::evaluate(user_id, &progress, &trigger);
        let report = self.apply(user_id, &evaluation).await;
        Ok(Outcome { evaluation, report })
    }

    /// Moves the streak for `week` and re-evaluates streak-dependent entries.
    pub async fn on_week_closed(
        &self,
        user_id: &str,
        week: WeekKey,
        qualifying_count: u32,
        at: DateTime<Utc>,
    ) -> Result<WeekOutcome, StoreError> {
        let progress = self.progress(user_id).await?;
        let Some(update) = streak::close_week(&progress, week, qualifying_count, self.weekly_target)
        else {
            info!(user_id, %week, "week already closed");
            return Ok(WeekOutcome {
                streak: None,
                evaluation: None,
                report: ApplyReport::default(),
            });
        };

        let projected = update.apply_to(&progress);
        let evaluation = evaluator::evaluate(user_id, &projected, &Trigger::WeekClosed { at });

        let mut effects = update.effects(user_id);
        effects.extend(evaluation.effects.iter().cloned());
        let report = executor::apply(&self.store, &self.sink, user_id, &effects, &self.retry).await;
        log_report(user_id, &report);

        info!(
            user_id,
            %week,
            qualifying_count,
            previous = update.previous,
            current = update.current,
            longest = update.longest,
            "streak updated"
        );
        Ok(WeekOutcome {
            streak: Some(update),
            evaluation: Some(evaluation),
            report,
        })
    }

    async fn apply(&self, user_id: &str, evaluation: &Evaluation) -> ApplyReport {
        if evaluation.unlocked_anything() {
            info!(
                user_id,
                badges = ?evaluation.new_badges,
                achievements = ?evaluation.new_achievements,
                score = evaluation.score,
                "new unlocks"
            );
        }
        let report = executor::apply(
            &self.store,
            &self.sink,
            user_id,
            &evaluation.effects,
            &self.retry,
        )
        .await;
        log_report(user_id, &report);
        report
    }
}

fn log_report(user_id: &str, report: &ApplyReport) {
    debug!(
        user_id,
        written = report.written,
        unchanged = report.unchanged,
        notified = report.notified,
        suppressed = report.suppressed,
        "effects applied"
    );
    if !report.is_clean() {
        warn!(
            user_id,
            failed = report.failed.len(),
            written = report.written,
            "some effects were not persisted"
        );
    }
}
