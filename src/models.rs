use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Gamification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    pub current_level: u32,
    pub total_points: u64,
    pub total_words_learned: u64,
    pub total_quizzes_completed: u64,
    pub streak_days: u32,
    pub last_active_date: Option<NaiveDate>, // None until the first recorded activity
    pub achievements: Vec<Achievement>,
    pub statistics: Statistics,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_level: 1,
            total_points: 0,
            total_words_learned: 0,
            total_quizzes_completed: 0,
            streak_days: 0,
            last_active_date: None,
            achievements: Vec::new(),
            statistics: Statistics::default(),
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn has_achievement(&self, achievement_id: &str) -> bool {
        self.achievements.iter().any(|a| a.id == achievement_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub points: u64,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_correct_answers: u64,
    pub total_incorrect_answers: u64,
    pub average_accuracy: u32,
    pub total_time_spent: u64, // seconds
    pub average_time_per_question: u64,
    pub fastest_quiz_time: Option<u64>,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level: u32,
    pub name: String,
    pub badge: String,
    pub required_points: u64,
    pub required_words: u64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub current_level: u32,
    pub next_level: Option<u32>,
    pub points_needed: u64,
    pub words_needed: u64,
    pub progress_percentage: u32,
}

/// Context of a point award. Achievement rules match on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PointsEvent {
    QuizCompleted(QuizCompletedContext),
    WordReviewed { word_id: String },
    ReadingCompleted { title: String },
    Bonus { reason: String },
}

impl PointsEvent {
    pub fn source_tag(&self) -> &'static str {
        match self {
            PointsEvent::QuizCompleted(_) => "quiz_completed",
            PointsEvent::WordReviewed { .. } => "word_reviewed",
            PointsEvent::ReadingCompleted { .. } => "reading_completed",
            PointsEvent::Bonus { .. } => "bonus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizCompletedContext {
    pub accuracy: u32,
    pub completion_time: Option<u64>, // seconds
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsAward {
    pub new_points: u64,
    pub total_points: u64,
    pub leveled_up: bool,
    pub new_level: Option<u32>,
    pub unlocked_achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsUpdate {
    pub correct_answers: u64,
    pub total_questions: u64,
    pub completion_time: u64, // seconds
    pub words_learned: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRewards {
    pub award: PointsAward,
    pub progress: UserProgress,
}

// ============================================================================
// Quiz
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    WordToMeaning,
    MeaningToWord,
    ImageToWord,
}

impl QuestionType {
    pub const ROTATION: [QuestionType; 3] = [
        QuestionType::WordToMeaning,
        QuestionType::MeaningToWord,
        QuestionType::ImageToWord,
    ];

    pub fn for_index(index: usize) -> Self {
        Self::ROTATION[index % Self::ROTATION.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub word_id: String,
    pub question_type: QuestionType,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    pub question_id: Uuid,
    pub answer: String,
    pub is_correct: bool,
    pub attempts: u32,
    pub points: u64,
    pub time_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: Uuid,
    pub user_id: String,
    pub level: u32,
    pub questions: Vec<QuizQuestion>,
    pub answers: HashMap<Uuid, RecordedAnswer>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub total_score: u64,
    pub max_score: u64,
    // Held from completion until the outcome is persisted, so a failed hand-off can be retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<QuizResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<QuizRewards>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub is_correct: bool,
    pub points: u64,
    pub attempts: u32,
    pub attempts_remaining: u32,
    pub feedback: String,
    pub correct_answer: Option<String>, // revealed once correct or out of attempts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub session_id: Uuid,
    pub user_id: String,
    pub level: u32,
    pub total_questions: u64,
    pub correct_answers: u64,
    pub incorrect_answers: u64,
    pub accuracy: u32,
    pub total_points: u64,
    pub max_points: u64,
    pub time_spent: u64,
    pub new_words_learned: Vec<String>,
    pub words_to_review: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizConfig {
    pub questions_per_session: usize,
    pub max_attempts: u32,
    pub points_per_correct_answer: u64,
    pub points_per_first_attempt: u64,
    pub points_per_second_attempt: u64,
    pub time_limit: Option<u64>, // seconds
    pub session_ttl: u64,        // seconds before an unsettled session is dropped
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            questions_per_session: 5,
            max_attempts: 2,
            points_per_correct_answer: 15,
            points_per_first_attempt: 15,
            points_per_second_attempt: 10,
            time_limit: None,
            session_ttl: 3600,
        }
    }
}

/// Partial override applied by `QuizService::update_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizConfigUpdate {
    pub questions_per_session: Option<usize>,
    pub max_attempts: Option<u32>,
    pub points_per_correct_answer: Option<u64>,
    pub points_per_first_attempt: Option<u64>,
    pub points_per_second_attempt: Option<u64>,
    pub time_limit: Option<Option<u64>>,
    pub session_ttl: Option<u64>,
}

// ============================================================================
// Words
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub word: String,
    pub meaning: String,
    pub example_sentence: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWordRequest {
    pub id: String,
    pub word: String,
    pub meaning: String,
    pub example_sentence: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordStatus {
    pub user_id: String,
    pub word_id: String,
    pub times_correct: u32,
    pub times_incorrect: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Read-while-listening
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RwlSegment {
    pub id: String,
    pub timestamp: u64, // seconds from start
    pub text: String,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RwlContent {
    pub title: String,
    pub segments: Vec<RwlSegment>,
    pub total_duration: u64,
}
