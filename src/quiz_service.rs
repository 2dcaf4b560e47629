use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::QuizError;
use crate::models::*;
use crate::question_generator::QuestionGenerator;
use crate::{log_service_start, log_service_success, log_service_warn};

type Result<T> = std::result::Result<T, QuizError>;

/// Quiz session lifecycle: `generate_quiz` → `submit_answer`* → `complete_quiz`
/// → `store_rewards` → `settle`.
///
/// Sessions are held in memory until they are settled or outlive the
/// configured `session_ttl`.
#[derive(Clone)]
pub struct QuizService {
    db: Database,
    generator: QuestionGenerator,
    config: Arc<RwLock<QuizConfig>>,
    sessions: Arc<RwLock<HashMap<Uuid, QuizSession>>>,
}

impl QuizService {
    pub fn new(db: Database) -> Self {
        Self::with_config(db, QuizConfig::default())
    }

    pub fn with_config(db: Database, config: QuizConfig) -> Self {
        Self {
            db,
            generator: QuestionGenerator::new(),
            config: Arc::new(RwLock::new(config)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn config(&self) -> QuizConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, update: QuizConfigUpdate) -> QuizConfig {
        let mut config = self.config.write().await;

        if let Some(value) = update.questions_per_session {
            config.questions_per_session = value;
        }
        if let Some(value) = update.max_attempts {
            config.max_attempts = value;
        }
        if let Some(value) = update.points_per_correct_answer {
            config.points_per_correct_answer = value;
        }
        if let Some(value) = update.points_per_first_attempt {
            config.points_per_first_attempt = value;
        }
        if let Some(value) = update.points_per_second_attempt {
            config.points_per_second_attempt = value;
        }
        if let Some(value) = update.time_limit {
            config.time_limit = value;
        }
        if let Some(value) = update.session_ttl {
            config.session_ttl = value;
        }

        info!(config = ?*config, "Quiz configuration updated");
        config.clone()
    }

    pub async fn generate_quiz(&self, level: u32, user_id: &str) -> Result<QuizSession> {
        log_service_start!("quiz", "generate_quiz", user_id = user_id);

        let config = self.config().await;
        let pool = self.db.get_words_by_level(level).await?;
        if pool.is_empty() {
            return Err(QuizError::NoWordsAvailable(level));
        }
        if pool.len() < config.questions_per_session + 3 {
            log_service_warn!(
                "quiz",
                "generate_quiz",
                format!("level {} has only {} words, options will be reduced", level, pool.len())
            );
        }

        let questions = self
            .generator
            .generate_questions(level, &pool, config.questions_per_session);

        let session = QuizSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            level,
            max_score: questions.len() as u64 * config.points_per_correct_answer,
            questions,
            answers: HashMap::new(),
            start_time: Utc::now(),
            end_time: None,
            is_completed: false,
            total_score: 0,
            result: None,
            rewards: None,
        };

        let mut sessions = self.sessions.write().await;
        prune_expired(&mut sessions, session.start_time, config.session_ttl);
        sessions.insert(session.id, session.clone());
        drop(sessions);

        info!(
            session_id = %session.id,
            user_id = %user_id,
            level,
            question_count = session.questions.len(),
            "Quiz session created"
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<QuizSession> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(QuizError::SessionNotFound(session_id))
    }

    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        answer: &str,
        time_spent: u64,
    ) -> Result<QuizAnswer> {
        let config = self.config().await;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(QuizError::SessionNotFound(session_id))?;

        if session.is_completed {
            return Err(QuizError::SessionCompleted(session_id));
        }

        if let Some(limit_secs) = config.time_limit {
            let elapsed = (Utc::now() - session.start_time).num_seconds().max(0) as u64;
            if elapsed > limit_secs {
                return Err(QuizError::TimeLimitExceeded {
                    session_id,
                    limit_secs,
                });
            }
        }

        let correct_answer = session
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.correct_answer.clone())
            .ok_or(QuizError::QuestionNotFound {
                session_id,
                question_id,
            })?;

        let previous = session.answers.get(&question_id);
        if previous.is_some_and(|a| a.is_correct) {
            return Err(QuizError::AlreadyAnswered(question_id));
        }

        let attempts = previous.map_or(0, |a| a.attempts) + 1;
        if attempts > config.max_attempts {
            return Err(QuizError::AttemptsExceeded {
                question_id,
                max_attempts: config.max_attempts,
            });
        }

        let is_correct = answer == correct_answer;
        let points = match (is_correct, attempts) {
            (false, _) => 0,
            (true, 1) => config.points_per_first_attempt,
            (true, _) => config.points_per_second_attempt,
        };
        let attempts_remaining = if is_correct {
            0
        } else {
            config.max_attempts - attempts
        };

        let feedback = match (is_correct, attempts, attempts_remaining) {
            (true, 1, _) => "Correct! Perfect!".to_string(),
            (true, _, _) => "Correct! Well done!".to_string(),
            (false, _, 0) => format!("Not quite. The correct answer is \"{}\".", correct_answer),
            (false, _, _) => "Not quite. Try again!".to_string(),
        };

        session.answers.insert(
            question_id,
            RecordedAnswer {
                question_id,
                answer: answer.to_string(),
                is_correct,
                attempts,
                points,
                time_spent,
            },
        );
        if is_correct {
            session.total_score += points;
        }

        debug!(
            session_id = %session_id,
            question_id = %question_id,
            attempts,
            is_correct,
            points,
            "Answer recorded"
        );

        Ok(QuizAnswer {
            is_correct,
            points,
            attempts,
            attempts_remaining,
            feedback,
            correct_answer: (is_correct || attempts_remaining == 0).then_some(correct_answer),
        })
    }

    /// Completes the session and returns its result. Until the session is
    /// settled, repeating the call returns the same result.
    pub async fn complete_quiz(&self, session_id: Uuid) -> Result<QuizResult> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(QuizError::SessionNotFound(session_id))?;

        if session.is_completed {
            return session
                .result
                .clone()
                .ok_or(QuizError::SessionCompleted(session_id));
        }

        let now = Utc::now();
        let total_questions = session.questions.len() as u64;
        let correct_answers = session.answers.values().filter(|a| a.is_correct).count() as u64;
        let accuracy = if total_questions == 0 {
            0
        } else {
            (correct_answers as f64 / total_questions as f64 * 100.0).round() as u32
        };
        let time_spent = (now - session.start_time).num_seconds().max(0) as u64;

        let (learned, to_review): (Vec<&QuizQuestion>, Vec<&QuizQuestion>) =
            session.questions.iter().partition(|q| {
                session
                    .answers
                    .get(&q.id)
                    .is_some_and(|a| a.is_correct)
            });

        let result = QuizResult {
            session_id,
            user_id: session.user_id.clone(),
            level: session.level,
            total_questions,
            correct_answers,
            incorrect_answers: total_questions - correct_answers,
            accuracy,
            total_points: session.total_score,
            max_points: session.max_score,
            time_spent,
            new_words_learned: learned.iter().map(|q| q.word_id.clone()).collect(),
            words_to_review: to_review.iter().map(|q| q.word_id.clone()).collect(),
            completed_at: now,
        };

        session.is_completed = true;
        session.end_time = Some(now);
        session.result = Some(result.clone());

        log_service_success!(
            "quiz",
            "complete_quiz",
            session_id = session_id,
            format!("{}/{} correct", correct_answers, total_questions)
        );
        Ok(result)
    }

    /// Rewards already persisted for a completed session, if any.
    pub async fn recorded_rewards(&self, session_id: Uuid) -> Result<Option<QuizRewards>> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|session| session.rewards.clone())
            .ok_or(QuizError::SessionNotFound(session_id))
    }

    pub async fn store_rewards(&self, session_id: Uuid, rewards: QuizRewards) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(QuizError::SessionNotFound(session_id))?;

        session.rewards = Some(rewards);
        Ok(())
    }

    /// Drops a completed session once everything it produced is persisted.
    pub async fn settle(&self, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&session_id) {
            None => Err(QuizError::SessionNotFound(session_id)),
            Some(session) if !session.is_completed => Err(QuizError::SessionNotCompleted(session_id)),
            Some(_) => {
                sessions.remove(&session_id);
                debug!(session_id = %session_id, remaining = sessions.len(), "Quiz session settled");
                Ok(())
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn prune_expired(sessions: &mut HashMap<Uuid, QuizSession>, now: DateTime<Utc>, ttl_secs: u64) {
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    let before = sessions.len();
    sessions.retain(|_, session| (now - session.start_time).num_seconds() < ttl);

    let dropped = before - sessions.len();
    if dropped > 0 {
        info!(dropped, remaining = sessions.len(), "Dropped expired quiz sessions");
    }
}
