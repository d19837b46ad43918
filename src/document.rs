//! Decoding of the schemaless user document into [`UserProgress`].
//!
//! Every field is optional. A missing field takes its default; a field with the
//! wrong shape is logged and also takes its default, so decoding never fails.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::models::{UserProgress, WeekKey};

pub const BADGES: &str = "badges";
pub const ACHIEVEMENTS: &str = "achievements";
pub const CURRENT_STREAK: &str = "currentStreak";
pub const LONGEST_STREAK: &str = "longestStreak";
pub const TOTAL_REVIEWS: &str = "totalReviews";
pub const SPOTS_VISITED: &str = "spotsVisited";
pub const PHOTO_COUNT: &str = "photoCount";
pub const FRIEND_COUNT: &str = "friendCount";
pub const TOTAL_SCORE: &str = "totalScore";
pub const LAST_STREAK_WEEK: &str = "lastStreakWeek";

pub fn decode_progress(user_id: &str, document: Option<&Value>) -> UserProgress {
    let Some(document) = document else {
        return UserProgress::default();
    };
    let Some(fields) = document.as_object() else {
        warn!(user_id, "user document is not an object, using empty progress");
        return UserProgress::default();
    };

    let field = |name: &str| fields.get(name).filter(|value| !value.is_null());

    UserProgress {
        badges: lenient::<BTreeSet<String>>(user_id, BADGES, field(BADGES)),
        achievements: lenient::<BTreeMap<String, DateTime<Utc>>>(
            user_id,
            ACHIEVEMENTS,
            field(ACHIEVEMENTS),
        ),
        current_streak: lenient(user_id, CURRENT_STREAK, field(CURRENT_STREAK)),
        longest_streak: lenient(user_id, LONGEST_STREAK, field(LONGEST_STREAK)),
        total_reviews: lenient(user_id, TOTAL_REVIEWS, field(TOTAL_REVIEWS)),
        spots_visited: lenient(user_id, SPOTS_VISITED, field(SPOTS_VISITED)),
        photo_count: lenient(user_id, PHOTO_COUNT, field(PHOTO_COUNT)),
        friend_count: lenient(user_id, FRIEND_COUNT, field(FRIEND_COUNT)),
        total_score: lenient(user_id, TOTAL_SCORE, field(TOTAL_SCORE)),
        last_streak_week: lenient::<Option<WeekKey>>(
            user_id,
            LAST_STREAK_WEEK,
            field(LAST_STREAK_WEEK),
        ),
    }
}

fn lenient<T: DeserializeOwned + Default>(user_id: &str, name: &str, value: Option<&Value>) -> T {
    let Some(value) = value else {
        return T::default();
    };
    match T::deserialize(value) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(user_id, field = name, %err, "malformed field, using default");
            T::default()
        }
    }
}
