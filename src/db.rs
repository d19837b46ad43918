use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::document;
use crate::models::{LeaderboardEntry, NewRating, RatingEvent, WeekKey};
use crate::store::{ProgressStore, StoreError};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn ratings_in_week(&self, user_id: &str, week: WeekKey) -> anyhow::Result<u32> {
        let (start, end) = week
            .bounds()
            .with_context(|| format!("week {week} has no calendar bounds"))?;
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM chai_gamification.ratings
            WHERE user_id = $1 AND occurred_at >= $2 AND occurred_at < $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?
        .get("count");
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Records a mutual friendship. Returns `false` if it already existed.
    pub async fn add_friendship(&self, user_id: &str, friend_id: &str) -> anyhow::Result<bool> {
        anyhow::ensure!(user_id != friend_id, "a user cannot befriend themselves");
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO chai_gamification.friendships (user_id, friend_id)
            VALUES ($1, $2), ($2, $1)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(friend_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(false);
        }

        for id in [user_id, friend_id] {
            sqlx::query(
                r#"
                INSERT INTO chai_gamification.user_progress AS up (user_id, document)
                VALUES ($1, jsonb_build_object('friendCount', 1))
                ON CONFLICT (user_id) DO UPDATE
                SET document = up.document || jsonb_build_object(
                        'friendCount', chai_gamification.counter(up.document, 'friendCount') + 1
                    ),
                    updated_at = now()
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn leaderboard(&self, limit: u32) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT
                user_id,
                chai_gamification.counter(document, 'totalScore')::bigint AS total_score,
                CASE WHEN jsonb_typeof(document -> 'badges') = 'array'
                     THEN jsonb_array_length(document -> 'badges')
                     ELSE 0 END AS badge_count,
                chai_gamification.counter(document, 'currentStreak') AS current_streak
            FROM chai_gamification.user_progress
            ORDER BY total_score DESC, user_id
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::new();
        for row in rows {
            let total_score: i64 = row.get("total_score");
            let badge_count: i32 = row.get("badge_count");
            let current_streak: i32 = row.get("current_streak");
            entries.push(LeaderboardEntry {
                user_id: row.get("user_id"),
                total_score: u64::try_from(total_score).unwrap_or(0),
                badge_count: usize::try_from(badge_count).unwrap_or(0),
                current_streak: u32::try_from(current_streak).unwrap_or(0),
            });
        }

        Ok(entries)
    }

    async fn merge_fields(&self, user_id: &str, fields: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chai_gamification.user_progress AS up (user_id, document)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET document = up.document || EXCLUDED.document, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl ProgressStore for PgStore {
    async fn record_rating(&self, rating: &NewRating) -> Result<Option<RatingEvent>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Ratings for one user are recorded one at a time, so the visit
        // check below sees every rating committed before it.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&rating.user_id)
            .execute(&mut *tx)
            .await?;

        let is_new_spot: bool = sqlx::query(
            r#"
            SELECT NOT EXISTS (
                SELECT 1 FROM chai_gamification.ratings WHERE user_id = $1 AND spot_id = $2
            ) AS is_new_spot
            "#,
        )
        .bind(&rating.user_id)
        .bind(&rating.spot_id)
        .fetch_one(&mut *tx)
        .await?
        .get("is_new_spot");

        let source_key = rating
            .source_key
            .clone()
            .unwrap_or_else(|| format!("rating-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO chai_gamification.ratings
            (id, user_id, spot_id, has_photo, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&rating.user_id)
        .bind(&rating.spot_id)
        .bind(rating.has_photo)
        .bind(rating.occurred_at)
        .bind(&source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO chai_gamification.user_progress AS up (user_id, document)
            VALUES ($1, jsonb_build_object('totalReviews', 1, 'spotsVisited', $2::int, 'photoCount', $3::int))
            ON CONFLICT (user_id) DO UPDATE
            SET document = up.document || jsonb_build_object(
                    'totalReviews', chai_gamification.counter(up.document, 'totalReviews') + 1,
                    'spotsVisited', chai_gamification.counter(up.document, 'spotsVisited') + $2::int,
                    'photoCount', chai_gamification.counter(up.document, 'photoCount') + $3::int
                ),
                updated_at = now()
            "#,
        )
        .bind(&rating.user_id)
        .bind(i32::from(is_new_spot))
        .bind(i32::from(rating.has_photo))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            user_id = %rating.user_id,
            spot_id = %rating.spot_id,
            new_spot = is_new_spot,
            "rating recorded"
        );

        Ok(Some(RatingEvent {
            user_id: rating.user_id.clone(),
            spot_id: rating.spot_id.clone(),
            has_photo: rating.has_photo,
            occurred_at: rating.occurred_at,
        }))
    }

    async fn fetch_document(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(
            "SELECT document FROM chai_gamification.user_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.get("document")))
    }

    async fn add_badge(&self, user_id: &str, badge_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chai_gamification.user_progress AS up (user_id, document)
            VALUES ($1, jsonb_build_object('badges', jsonb_build_array($2::text)))
            ON CONFLICT (user_id) DO UPDATE
            SET document = jsonb_set(
                    up.document,
                    '{badges}',
                    CASE WHEN jsonb_typeof(up.document -> 'badges') = 'array'
                         THEN up.document -> 'badges'
                         ELSE '[]'::jsonb END || jsonb_build_array($2::text)
                ),
                updated_at = now()
            WHERE jsonb_typeof(up.document -> 'badges') IS DISTINCT FROM 'array'
               OR NOT (up.document -> 'badges') ? $2
            "#,
        )
        .bind(user_id)
        .bind(badge_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_achievement(
        &self,
        user_id: &str,
        achievement_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chai_gamification.user_progress AS up (user_id, document)
            VALUES ($1, jsonb_build_object('achievements', jsonb_build_object($2::text, $3::text)))
            ON CONFLICT (user_id) DO UPDATE
            SET document = jsonb_set(
                    up.document,
                    '{achievements}',
                    CASE WHEN jsonb_typeof(up.document -> 'achievements') = 'object'
                         THEN up.document -> 'achievements'
                         ELSE '{}'::jsonb END || jsonb_build_object($2::text, $3::text)
                ),
                updated_at = now()
            WHERE jsonb_typeof(up.document -> 'achievements') IS DISTINCT FROM 'object'
               OR NOT (up.document -> 'achievements') ? $2
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_total_score(&self, user_id: &str, score: u64) -> Result<(), StoreError> {
        let mut fields = Map::new();
        fields.insert(document::TOTAL_SCORE.to_string(), json!(score));
        self.merge_fields(user_id, Value::Object(fields)).await
    }

    async fn set_streak(
        &self,
        user_id: &str,
        current: u32,
        longest: u32,
        week: WeekKey,
    ) -> Result<(), StoreError> {
        let mut fields = Map::new();
        fields.insert(document::CURRENT_STREAK.to_string(), json!(current));
        fields.insert(document::LONGEST_STREAK.to_string(), json!(longest));
        fields.insert(document::LAST_STREAK_WEEK.to_string(), json!(week.to_string()));
        self.merge_fields(user_id, Value::Object(fields)).await
    }
}

/// Demo ratings in submission order. Source keys make reseeding a no-op.
pub fn seed_ratings() -> anyhow::Result<Vec<NewRating>> {
    let ratings = vec![
        ("seed-001", "avery", "masala-corner", true, (2026, 1, 12)),
        ("seed-002", "avery", "chai-point", false, (2026, 1, 14)),
        ("seed-003", "avery", "kadak-cafe", false, (2026, 1, 15)),
        ("seed-004", "avery", "tapri-central", true, (2026, 1, 20)),
        ("seed-005", "avery", "irani-bakery", false, (2026, 1, 21)),
        ("seed-006", "jules", "chai-point", false, (2026, 7, 3)),
        ("seed-007", "jules", "masala-corner", true, (2026, 7, 9)),
        ("seed-008", "kiara", "kadak-cafe", true, (2026, 3, 2)),
    ];

    let mut seeded = Vec::new();
    for (source_key, user_id, spot_id, has_photo, (year, month, day)) in ratings {
        let occurred_at = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(18, 0, 0))
            .context("invalid date")?
            .and_utc();
        seeded.push(NewRating {
            user_id: user_id.to_string(),
            spot_id: spot_id.to_string(),
            has_photo,
            occurred_at,
            source_key: Some(source_key.to_string()),
        });
    }

    Ok(seeded)
}

/// Reads ratings from a CSV file in file order. Nothing is recorded.
pub fn read_ratings_csv(csv_path: &Path) -> anyhow::Result<Vec<NewRating>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        user_id: String,
        spot_id: String,
        #[serde(default)]
        has_photo: bool,
        occurred_at: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut ratings = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        ratings.push(NewRating {
            user_id: row.user_id,
            spot_id: row.spot_id,
            has_photo: row.has_photo,
            occurred_at: row.occurred_at,
            source_key: row.source_key,
        });
    }

    Ok(ratings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_ratings_start_with_a_photo_review() {
        let ratings = seed_ratings().unwrap();
        assert_eq!(ratings.len(), 8);
        assert_eq!(ratings[0].user_id, "avery");
        assert!(ratings[0].has_photo);
        assert!(ratings.iter().all(|rating| rating.source_key.is_some()));
    }

    #[test]
    fn csv_rows_keep_file_order() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/ratings.csv");
        let ratings = read_ratings_csv(&path).unwrap();
        assert_eq!(ratings.len(), 6);
        assert_eq!(ratings[0].source_key.as_deref(), Some("demo-001"));
        assert!(ratings[0].has_photo);
        assert_eq!(ratings[5].user_id, "theo");
    }
}
