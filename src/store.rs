use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{NewRating, RatingEvent, WeekKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether repeating the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
        }
    }
}

/// Document store holding one progress document per user.
///
/// Writes are partial updates with last-write-wins semantics. The unlock
/// writes are unions: they return `false` when the id was already present.
pub trait ProgressStore {
    /// Stores the rating and bumps the user's counters in one step.
    ///
    /// Returns `None` when a rating with the same source key already exists.
    async fn record_rating(&self, rating: &NewRating) -> Result<Option<RatingEvent>, StoreError>;

    async fn fetch_document(&self, user_id: &str) -> Result<Option<Value>, StoreError>;

    async fn add_badge(&self, user_id: &str, badge_id: &str) -> Result<bool, StoreError>;

    async fn set_achievement(
        &self,
        user_id: &str,
        achievement_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn set_total_score(&self, user_id: &str, score: u64) -> Result<(), StoreError>;

    async fn set_streak(
        &self,
        user_id: &str,
        current: u32,
        longest: u32,
        week: WeekKey,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
pub mod memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use chrono::SecondsFormat;
    use serde_json::{json, Map};

    use super::*;
    use crate::document;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Op {
        RecordRating,
        Fetch,
        AddBadge,
        SetAchievement,
        SetScore,
        SetStreak,
    }

    #[derive(Debug, Clone, Copy)]
    enum Failure {
        Transient(u32),
        Permanent,
    }

    /// In-process stand-in for the document store with failure injection.
    #[derive(Default)]
    pub struct MemoryStore {
        documents: Mutex<HashMap<String, Value>>,
        source_keys: Mutex<HashSet<String>>,
        visited: Mutex<HashSet<(String, String)>>,
        failures: Mutex<HashMap<Op, Failure>>,
        calls: Mutex<Vec<Op>>,
    }

    impl MemoryStore {
        pub fn with_document(user_id: &str, document: Value) -> Self {
            let store = Self::default();
            store
                .documents
                .lock()
                .unwrap()
                .insert(user_id.to_string(), document);
            store
        }

        /// The next `times` calls of `op` fail with a transient error.
        pub fn fail_transiently(&self, op: Op, times: u32) {
            self.failures
                .lock()
                .unwrap()
                .insert(op, Failure::Transient(times));
        }

        /// Every call of `op` fails with an error that is not worth retrying.
        pub fn fail_permanently(&self, op: Op) {
            self.failures.lock().unwrap().insert(op, Failure::Permanent);
        }

        pub fn calls(&self, op: Op) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
        }

        pub fn document(&self, user_id: &str) -> Option<Value> {
            self.documents.lock().unwrap().get(user_id).cloned()
        }

        fn check(&self, op: Op) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push(op);
            let mut failures = self.failures.lock().unwrap();
            match failures.get(&op).copied() {
                Some(Failure::Permanent) => Err(StoreError::Database(sqlx::Error::RowNotFound)),
                Some(Failure::Transient(n)) if n > 0 => {
                    failures.insert(op, Failure::Transient(n - 1));
                    Err(StoreError::Database(sqlx::Error::PoolTimedOut))
                }
                _ => Ok(()),
            }
        }

        fn update<T>(&self, user_id: &str, f: impl FnOnce(&mut Map<String, Value>) -> T) -> T {
            let mut documents = self.documents.lock().unwrap();
            let document = documents
                .entry(user_id.to_string())
                .or_insert_with(|| json!({}));
            if !document.is_object() {
                *document = json!({});
            }
            let fields = document.as_object_mut().unwrap();
            f(fields)
        }
    }

    fn bump(fields: &mut Map<String, Value>, field: &str, by: u64) {
        let count = fields.get(field).and_then(Value::as_u64).unwrap_or(0);
        fields.insert(field.to_string(), json!(count + by));
    }

    impl ProgressStore for MemoryStore {
        async fn record_rating(
            &self,
            rating: &NewRating,
        ) -> Result<Option<RatingEvent>, StoreError> {
            self.check(Op::RecordRating)?;
            if let Some(key) = &rating.source_key {
                if !self.source_keys.lock().unwrap().insert(key.clone()) {
                    return Ok(None);
                }
            }
            let new_spot = self
                .visited
                .lock()
                .unwrap()
                .insert((rating.user_id.clone(), rating.spot_id.clone()));
            self.update(&rating.user_id, |fields| {
                bump(fields, document::TOTAL_REVIEWS, 1);
                bump(fields, document::SPOTS_VISITED, u64::from(new_spot));
                bump(fields, document::PHOTO_COUNT, u64::from(rating.has_photo));
            });
            Ok(Some(RatingEvent {
                user_id: rating.user_id.clone(),
                spot_id: rating.spot_id.clone(),
                has_photo: rating.has_photo,
                occurred_at: rating.occurred_at,
            }))
        }

        async fn fetch_document(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
            self.check(Op::Fetch)?;
            Ok(self.document(user_id))
        }

        async fn add_badge(&self, user_id: &str, badge_id: &str) -> Result<bool, StoreError> {
            self.check(Op::AddBadge)?;
            Ok(self.update(user_id, |fields| {
                let badges = fields
                    .entry(document::BADGES)
                    .or_insert_with(|| json!([]));
                if !badges.is_array() {
                    *badges = json!([]);
                }
                let list = badges.as_array_mut().unwrap();
                if list.iter().any(|b| b == badge_id) {
                    return false;
                }
                list.push(json!(badge_id));
                true
            }))
        }

        async fn set_achievement(
            &self,
            user_id: &str,
            achievement_id: &str,
            at: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            self.check(Op::SetAchievement)?;
            Ok(self.update(user_id, |fields| {
                let achievements = fields
                    .entry(document::ACHIEVEMENTS)
                    .or_insert_with(|| json!({}));
                if !achievements.is_object() {
                    *achievements = json!({});
                }
                let map = achievements.as_object_mut().unwrap();
                if map.contains_key(achievement_id) {
                    return false;
                }
                map.insert(
                    achievement_id.to_string(),
                    json!(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
                );
                true
            }))
        }

        async fn set_total_score(&self, user_id: &str, score: u64) -> Result<(), StoreError> {
            self.check(Op::SetScore)?;
            self.update(user_id, |fields| {
                fields.insert(document::TOTAL_SCORE.to_string(), json!(score));
            });
            Ok(())
        }

        async fn set_streak(
            &self,
            user_id: &str,
            current: u32,
            longest: u32,
            week: WeekKey,
        ) -> Result<(), StoreError> {
            self.check(Op::SetStreak)?;
            self.update(user_id, |fields| {
                fields.insert(document::CURRENT_STREAK.to_string(), json!(current));
                fields.insert(document::LONGEST_STREAK.to_string(), json!(longest));
                fields.insert(document::LAST_STREAK_WEEK.to_string(), json!(week.to_string()));
            });
            Ok(())
        }
    }

    mod tests {
        use chrono::TimeZone;

        use super::*;

        fn rating(spot_id: &str, has_photo: bool, source_key: Option<&str>) -> NewRating {
            NewRating {
                user_id: "u1".to_string(),
                spot_id: spot_id.to_string(),
                has_photo,
                occurred_at: Utc.with_ymd_and_hms(2026, 4, 2, 8, 15, 0).unwrap(),
                source_key: source_key.map(str::to_string),
            }
        }

        #[tokio::test]
        async fn repeat_spot_counts_a_review_but_not_a_visit() {
            let store = MemoryStore::default();
            store.record_rating(&rating("chai-point", true, None)).await.unwrap();
            store.record_rating(&rating("chai-point", false, None)).await.unwrap();
            store.record_rating(&rating("kadak-cafe", false, None)).await.unwrap();

            let document = store.document("u1").unwrap();
            assert_eq!(document[document::TOTAL_REVIEWS], json!(3));
            assert_eq!(document[document::SPOTS_VISITED], json!(2));
            assert_eq!(document[document::PHOTO_COUNT], json!(1));
        }

        #[tokio::test]
        async fn duplicate_source_key_is_skipped() {
            let store = MemoryStore::default();
            let first = store
                .record_rating(&rating("chai-point", false, Some("row-1")))
                .await
                .unwrap();
            assert!(first.is_some());
            let again = store
                .record_rating(&rating("chai-point", false, Some("row-1")))
                .await
                .unwrap();
            assert!(again.is_none());
            assert_eq!(store.document("u1").unwrap()[document::TOTAL_REVIEWS], json!(1));
        }
    }
}
