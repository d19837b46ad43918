use crate::models::{Achievement, Badge, BadgeCategory, BadgeRarity, Counter, Rule};

const MONSOON: &[u32] = &[6, 7, 8, 9];
const WINTER: &[u32] = &[12, 1, 2];

pub static BADGES: [Badge; 15] = [
    Badge {
        id: "first_review",
        name: "First Sip",
        description: "Rate your first chai spot",
        icon: "cup.and.saucer",
        category: BadgeCategory::FirstSteps,
        requirement: 1,
        rarity: BadgeRarity::Common,
        rule: Rule::AtLeast(Counter::TotalReviews, 1),
    },
    Badge {
        id: "first_photo",
        name: "Snapshot",
        description: "Attach a photo to your first review",
        icon: "camera",
        category: BadgeCategory::FirstSteps,
        requirement: 1,
        rarity: BadgeRarity::Common,
        rule: Rule::FirstPhoto,
    },
    Badge {
        id: "first_friend",
        name: "Chai Buddy",
        description: "Add your first friend",
        icon: "person.2",
        category: BadgeCategory::FirstSteps,
        requirement: 1,
        rarity: BadgeRarity::Common,
        rule: Rule::AtLeast(Counter::FriendCount, 1),
    },
    Badge {
        id: "5_spots",
        name: "Wanderer",
        description: "Visit 5 different chai spots",
        icon: "map",
        category: BadgeCategory::Exploration,
        requirement: 5,
        rarity: BadgeRarity::Common,
        rule: Rule::AtLeast(Counter::SpotsVisited, 5),
    },
    Badge {
        id: "10_spots",
        name: "Explorer",
        description: "Visit 10 different chai spots",
        icon: "map.fill",
        category: BadgeCategory::Exploration,
        requirement: 10,
        rarity: BadgeRarity::Rare,
        rule: Rule::AtLeast(Counter::SpotsVisited, 10),
    },
    Badge {
        id: "25_spots",
        name: "Pathfinder",
        description: "Visit 25 different chai spots",
        icon: "globe.asia.australia",
        category: BadgeCategory::Exploration,
        requirement: 25,
        rarity: BadgeRarity::Epic,
        rule: Rule::AtLeast(Counter::SpotsVisited, 25),
    },
    Badge {
        id: "50_spots",
        name: "Chai Cartographer",
        description: "Visit 50 different chai spots",
        icon: "globe",
        category: BadgeCategory::Exploration,
        requirement: 50,
        rarity: BadgeRarity::Legendary,
        rule: Rule::AtLeast(Counter::SpotsVisited, 50),
    },
    Badge {
        id: "5_friends",
        name: "Tea Party",
        description: "Have 5 friends on Chai Finder",
        icon: "person.3",
        category: BadgeCategory::Social,
        requirement: 5,
        rarity: BadgeRarity::Rare,
        rule: Rule::AtLeast(Counter::FriendCount, 5),
    },
    Badge {
        id: "10_photos",
        name: "Shutterbug",
        description: "Share 10 photos of your chai",
        icon: "photo.stack",
        category: BadgeCategory::Mastery,
        requirement: 10,
        rarity: BadgeRarity::Rare,
        rule: Rule::AtLeast(Counter::PhotoCount, 10),
    },
    Badge {
        id: "10_reviews",
        name: "Taster",
        description: "Write 10 reviews",
        icon: "star",
        category: BadgeCategory::Mastery,
        requirement: 10,
        rarity: BadgeRarity::Common,
        rule: Rule::AtLeast(Counter::TotalReviews, 10),
    },
    Badge {
        id: "25_reviews",
        name: "Connoisseur",
        description: "Write 25 reviews",
        icon: "star.leadinghalf.filled",
        category: BadgeCategory::Mastery,
        requirement: 25,
        rarity: BadgeRarity::Rare,
        rule: Rule::AtLeast(Counter::TotalReviews, 25),
    },
    Badge {
        id: "50_reviews",
        name: "Chai Critic",
        description: "Write 50 reviews",
        icon: "star.fill",
        category: BadgeCategory::Mastery,
        requirement: 50,
        rarity: BadgeRarity::Epic,
        rule: Rule::AtLeast(Counter::TotalReviews, 50),
    },
    Badge {
        id: "streak_7",
        name: "Devoted",
        description: "Keep a 7 week rating streak",
        icon: "flame",
        category: BadgeCategory::Mastery,
        requirement: 7,
        rarity: BadgeRarity::Epic,
        rule: Rule::AtLeast(Counter::CurrentStreak, 7),
    },
    Badge {
        id: "monsoon_sipper",
        name: "Monsoon Sipper",
        description: "Rate a spot during monsoon season",
        icon: "cloud.rain",
        category: BadgeCategory::Seasonal,
        requirement: 1,
        rarity: BadgeRarity::Rare,
        rule: Rule::RatedInMonths(MONSOON),
    },
    Badge {
        id: "winter_warmer",
        name: "Winter Warmer",
        description: "Rate a spot during winter",
        icon: "snowflake",
        category: BadgeCategory::Seasonal,
        requirement: 1,
        rarity: BadgeRarity::Rare,
        rule: Rule::RatedInMonths(WINTER),
    },
];

pub static ACHIEVEMENTS: [Achievement; 14] = [
    Achievement {
        id: "first_review",
        name: "First Review",
        description: "Submitted your first rating",
        points: 10,
        rule: Rule::AtLeast(Counter::TotalReviews, 1),
    },
    Achievement {
        id: "first_photo",
        name: "Picture Perfect",
        description: "Shared a photo with your first review",
        points: 10,
        rule: Rule::FirstPhoto,
    },
    Achievement {
        id: "first_friend",
        name: "Better Together",
        description: "Made your first friend",
        points: 10,
        rule: Rule::AtLeast(Counter::FriendCount, 1),
    },
    Achievement {
        id: "explorer_5",
        name: "Neighbourhood Explorer",
        description: "Visited 5 spots",
        points: 25,
        rule: Rule::AtLeast(Counter::SpotsVisited, 5),
    },
    Achievement {
        id: "explorer_10",
        name: "City Explorer",
        description: "Visited 10 spots",
        points: 50,
        rule: Rule::AtLeast(Counter::SpotsVisited, 10),
    },
    Achievement {
        id: "explorer_25",
        name: "Grand Tour",
        description: "Visited 25 spots",
        points: 100,
        rule: Rule::AtLeast(Counter::SpotsVisited, 25),
    },
    Achievement {
        id: "critic_10",
        name: "Opinionated",
        description: "Wrote 10 reviews",
        points: 25,
        rule: Rule::AtLeast(Counter::TotalReviews, 10),
    },
    Achievement {
        id: "critic_25",
        name: "Trusted Palate",
        description: "Wrote 25 reviews",
        points: 50,
        rule: Rule::AtLeast(Counter::TotalReviews, 25),
    },
    Achievement {
        id: "critic_50",
        name: "Master Taster",
        description: "Wrote 50 reviews",
        points: 100,
        rule: Rule::AtLeast(Counter::TotalReviews, 50),
    },
    Achievement {
        id: "social_5",
        name: "Circle of Chai",
        description: "Made 5 friends",
        points: 25,
        rule: Rule::AtLeast(Counter::FriendCount, 5),
    },
    Achievement {
        id: "streak_3",
        name: "Habit Forming",
        description: "Reached a 3 week streak",
        points: 15,
        rule: Rule::AtLeast(Counter::CurrentStreak, 3),
    },
    Achievement {
        id: "streak_7",
        name: "Week After Week",
        description: "Reached a 7 week streak",
        points: 30,
        rule: Rule::AtLeast(Counter::CurrentStreak, 7),
    },
    Achievement {
        id: "streak_14",
        name: "Unbroken",
        description: "Reached a 14 week streak",
        points: 50,
        rule: Rule::AtLeast(Counter::CurrentStreak, 14),
    },
    Achievement {
        id: "streak_30",
        name: "Ritual",
        description: "Reached a 30 week streak",
        points: 100,
        rule: Rule::AtLeast(Counter::CurrentStreak, 30),
    },
];

pub fn badge(id: &str) -> Option<&'static Badge> {
    BADGES.iter().find(|badge| badge.id == id)
}

pub fn achievement(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|achievement| achievement.id == id)
}
