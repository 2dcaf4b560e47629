use chrono::{DateTime, Utc};

use crate::models::{Achievement, LevelConfig, PointsEvent, UserProgress};

pub const LEVEL_UP_POINTS: u64 = 100;
pub const FAST_QUIZ_SECONDS: u64 = 60;
pub const WEEK_STREAK_DAYS: u32 = 7;
pub const WORDS_MILESTONE: u64 = 50;

/// A one-time badge and the condition that unlocks it.
pub struct AchievementRule {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub points: u64,
    pub condition: fn(&UserProgress, &PointsEvent) -> bool,
}

impl AchievementRule {
    fn unlock(&self, now: DateTime<Utc>) -> Achievement {
        Achievement {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            points: self.points,
            unlocked_at: now,
        }
    }
}

/// Evaluated in this order.
pub static ACHIEVEMENT_RULES: &[AchievementRule] = &[
    AchievementRule {
        id: "first_quiz",
        name: "First Steps",
        description: "Completed your first quiz.",
        icon: "🎯",
        points: 50,
        condition: |progress, event| {
            matches!(event, PointsEvent::QuizCompleted(_)) && progress.total_quizzes_completed == 0
        },
    },
    AchievementRule {
        id: "perfect_score",
        name: "Perfect Score",
        description: "Scored 100% accuracy in a quiz.",
        icon: "🏆",
        points: 100,
        condition: |_, event| {
            matches!(event, PointsEvent::QuizCompleted(ctx) if ctx.accuracy == 100)
        },
    },
    AchievementRule {
        id: "week_streak",
        name: "Week Streak",
        description: "Studied seven days in a row.",
        icon: "🔥",
        points: 150,
        condition: |progress, _| progress.streak_days >= WEEK_STREAK_DAYS,
    },
    AchievementRule {
        id: "words_50",
        name: "Word Master 50",
        description: "Learned 50 words.",
        icon: "📚",
        points: 200,
        condition: |progress, _| progress.total_words_learned >= WORDS_MILESTONE,
    },
    AchievementRule {
        id: "fast_learner",
        name: "Fast Learner",
        description: "Finished a quiz in under 60 seconds.",
        icon: "⚡",
        points: 100,
        condition: |_, event| match event {
            PointsEvent::QuizCompleted(ctx) => ctx
                .completion_time
                .is_some_and(|secs| secs < FAST_QUIZ_SECONDS),
            _ => false,
        },
    },
];

/// Runs every rule against `progress` and appends the newly unlocked ones.
/// Their points are added to `total_points`.
pub fn unlock_achievements(
    progress: &mut UserProgress,
    event: &PointsEvent,
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    let mut unlocked = Vec::new();

    for rule in ACHIEVEMENT_RULES {
        if progress.has_achievement(rule.id) || !(rule.condition)(progress, event) {
            continue;
        }

        let achievement = rule.unlock(now);
        progress.total_points += achievement.points;
        progress.achievements.push(achievement.clone());
        unlocked.push(achievement);
    }

    unlocked
}

/// Badge awarded on reaching `config.level`.
pub fn level_up_achievement(config: &LevelConfig, now: DateTime<Utc>) -> Achievement {
    Achievement {
        id: format!("level_up_{}", config.level),
        name: format!("Reached level {}!", config.level),
        description: format!("You reached the {} stage.", config.name),
        icon: config.badge.clone(),
        points: LEVEL_UP_POINTS,
        unlocked_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuizCompletedContext;

    fn quiz_event(accuracy: u32, completion_time: Option<u64>) -> PointsEvent {
        PointsEvent::QuizCompleted(QuizCompletedContext {
            accuracy,
            completion_time,
            level: 1,
        })
    }

    fn ids(achievements: &[Achievement]) -> Vec<&str> {
        achievements.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_first_quiz_perfect_and_fast() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        let unlocked = unlock_achievements(&mut progress, &quiz_event(100, Some(45)), Utc::now());

        assert_eq!(ids(&unlocked), vec!["first_quiz", "perfect_score", "fast_learner"]);
        assert_eq!(progress.total_points, 250);
        assert_eq!(progress.achievements.len(), 3);
    }

    #[test]
    fn test_first_quiz_requires_no_completed_quizzes() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        progress.total_quizzes_completed = 1;

        let unlocked = unlock_achievements(&mut progress, &quiz_event(80, Some(120)), Utc::now());
        assert!(unlocked.is_empty());
    }

    #[test]
    fn test_quiz_rules_ignore_other_events() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        let event = PointsEvent::Bonus {
            reason: "daily login".to_string(),
        };

        let unlocked = unlock_achievements(&mut progress, &event, Utc::now());
        assert!(unlocked.is_empty());
        assert_eq!(progress.total_points, 0);
    }

    #[test]
    fn test_progress_rules_fire_for_any_event() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        progress.streak_days = 7;
        progress.total_words_learned = 50;
        let event = PointsEvent::WordReviewed {
            word_id: "cat_n_01".to_string(),
        };

        let unlocked = unlock_achievements(&mut progress, &event, Utc::now());
        assert_eq!(ids(&unlocked), vec!["week_streak", "words_50"]);
        assert_eq!(progress.total_points, 350);
    }

    #[test]
    fn test_achievements_unlock_once() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        let event = quiz_event(100, Some(30));

        unlock_achievements(&mut progress, &event, Utc::now());
        let points_after_first = progress.total_points;
        let again = unlock_achievements(&mut progress, &event, Utc::now());

        assert!(again.is_empty());
        assert_eq!(progress.total_points, points_after_first);
        assert_eq!(progress.achievements.len(), 3);
    }

    #[test]
    fn test_slow_quiz_is_not_fast() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        progress.total_quizzes_completed = 3;

        assert!(unlock_achievements(&mut progress, &quiz_event(50, Some(60)), Utc::now()).is_empty());
        assert!(unlock_achievements(&mut progress, &quiz_event(50, None), Utc::now()).is_empty());
    }
}
