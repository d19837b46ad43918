use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeCategory {
    FirstSteps,
    Exploration,
    Social,
    Mastery,
    Seasonal,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 5] = [
        BadgeCategory::FirstSteps,
        BadgeCategory::Exploration,
        BadgeCategory::Social,
        BadgeCategory::Mastery,
        BadgeCategory::Seasonal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BadgeCategory::FirstSteps => "First Steps",
            BadgeCategory::Exploration => "Exploration",
            BadgeCategory::Social => "Social",
            BadgeCategory::Mastery => "Mastery",
            BadgeCategory::Seasonal => "Seasonal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for BadgeRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BadgeRarity::Common => "common",
            BadgeRarity::Rare => "rare",
            BadgeRarity::Epic => "epic",
            BadgeRarity::Legendary => "legendary",
        };
        f.write_str(label)
    }
}

/// Snapshot counters a rule can threshold on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    TotalReviews,
    SpotsVisited,
    PhotoCount,
    FriendCount,
    CurrentStreak,
}

impl Counter {
    pub fn read(self, progress: &UserProgress) -> u32 {
        match self {
            Counter::TotalReviews => progress.total_reviews,
            Counter::SpotsVisited => progress.spots_visited,
            Counter::PhotoCount => progress.photo_count,
            Counter::FriendCount => progress.friend_count,
            Counter::CurrentStreak => progress.current_streak,
        }
    }
}

/// Qualification predicate attached to a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    AtLeast(Counter, u32),
    /// The triggering rating carries a photo and is the user's first review.
    FirstPhoto,
    /// The triggering rating was submitted in one of these months (1-12).
    RatedInMonths(&'static [u32]),
}

impl Rule {
    pub fn is_met(&self, progress: &UserProgress, trigger: &Trigger) -> bool {
        match *self {
            Rule::AtLeast(counter, threshold) => counter.read(progress) >= threshold,
            Rule::FirstPhoto => trigger
                .rating()
                .is_some_and(|rating| rating.has_photo && progress.total_reviews == 1),
            Rule::RatedInMonths(months) => trigger
                .rating()
                .is_some_and(|rating| months.contains(&rating.occurred_at.month())),
        }
    }

    /// Counter and threshold for progress display, if the rule has one.
    pub fn progress_target(&self) -> Option<(Counter, u32)> {
        match *self {
            Rule::AtLeast(counter, threshold) => Some((counter, threshold)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: BadgeCategory,
    pub requirement: u32,
    pub rarity: BadgeRarity,
    pub rule: Rule,
}

#[derive(Debug, Clone)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u32,
    pub rule: Rule,
}

/// ISO-8601 week, rendered as `2026-W42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum WeekKeyError {
    #[error("week key must look like 2026-W07, got {0:?}")]
    Format(String),
    #[error("week {week} does not exist in ISO year {year}")]
    OutOfRange { year: i32, week: u32 },
}

impl WeekKey {
    pub fn containing(at: DateTime<Utc>) -> Self {
        let iso = at.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }

    /// The ISO week right after this one, crossing year boundaries.
    pub fn next(&self) -> Option<WeekKey> {
        let monday = self.monday()?.checked_add_days(chrono::Days::new(7))?;
        let iso = monday.iso_week();
        Some(Self {
            year: iso.year(),
            week: iso.week(),
        })
    }

    /// Half-open UTC range `[monday, next monday)`.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.monday()?.and_hms_opt(0, 0, 0)?.and_utc();
        Some((start, start + chrono::Duration::days(7)))
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for WeekKey {
    type Err = WeekKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, week) = s
            .split_once("-W")
            .ok_or_else(|| WeekKeyError::Format(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| WeekKeyError::Format(s.to_string()))?;
        let week: u32 = week
            .parse()
            .map_err(|_| WeekKeyError::Format(s.to_string()))?;
        let key = WeekKey { year, week };
        if key.monday().is_none() {
            return Err(WeekKeyError::OutOfRange { year, week });
        }
        Ok(key)
    }
}

impl Serialize for WeekKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A user's counters and unlocked state as read from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub badges: BTreeSet<String>,
    pub achievements: BTreeMap<String, DateTime<Utc>>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_reviews: u32,
    pub spots_visited: u32,
    pub photo_count: u32,
    pub friend_count: u32,
    pub total_score: u64,
    pub last_streak_week: Option<WeekKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingEvent {
    pub user_id: String,
    pub spot_id: String,
    pub has_photo: bool,
    pub occurred_at: DateTime<Utc>,
}

/// A rating about to be recorded.
#[derive(Debug, Clone)]
pub struct NewRating {
    pub user_id: String,
    pub spot_id: String,
    pub has_photo: bool,
    pub occurred_at: DateTime<Utc>,
    pub source_key: Option<String>,
}

/// What just happened to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Rating(RatingEvent),
    FriendAdded { at: DateTime<Utc> },
    WeekClosed { at: DateTime<Utc> },
}

impl Trigger {
    pub fn rating(&self) -> Option<&RatingEvent> {
        match self {
            Trigger::Rating(rating) => Some(rating),
            _ => None,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Trigger::Rating(rating) => rating.occurred_at,
            Trigger::FriendAdded { at } | Trigger::WeekClosed { at } => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    BadgeUnlocked {
        user_id: String,
        badge_id: String,
        name: String,
    },
    AchievementUnlocked {
        user_id: String,
        achievement_id: String,
        name: String,
        points: u32,
    },
    StreakMilestone {
        user_id: String,
        weeks: u32,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BadgeUnlocked { .. } => "badge_unlocked",
            Notification::AchievementUnlocked { .. } => "achievement_unlocked",
            Notification::StreakMilestone { .. } => "streak_milestone",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Notification::BadgeUnlocked { user_id, .. }
            | Notification::AchievementUnlocked { user_id, .. }
            | Notification::StreakMilestone { user_id, .. } => user_id,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::BadgeUnlocked { name, .. } => write!(f, "Badge unlocked: {name}"),
            Notification::AchievementUnlocked { name, points, .. } => {
                write!(f, "Achievement unlocked: {name} (+{points} pts)")
            }
            Notification::StreakMilestone { weeks, .. } => {
                write!(f, "Streak milestone: {weeks} weeks in a row")
            }
        }
    }
}

/// A write or notification produced by evaluation, applied later by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    UnlockBadge(String),
    UnlockAchievement {
        id: String,
        at: DateTime<Utc>,
    },
    SetScore(u64),
    SetStreak {
        current: u32,
        longest: u32,
        week: WeekKey,
    },
    Notify(Notification),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub new_badges: Vec<String>,
    pub new_achievements: Vec<String>,
    pub score: u64,
    pub effects: Vec<Effect>,
}

impl Evaluation {
    pub fn unlocked_anything(&self) -> bool {
        !self.new_badges.is_empty() || !self.new_achievements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub total_score: u64,
    pub badge_count: usize,
    pub current_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: BadgeCategory,
    pub unlocked: usize,
    pub total: usize,
}
