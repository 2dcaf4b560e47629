use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::achievements::{level_up_achievement, unlock_achievements};
use crate::errors::ProgressError;
use crate::levels::LevelTable;
use crate::models::*;
use crate::progress_store::{progress_key, ProgressStore};
use crate::{log_service_start, log_service_success};

pub const DEFAULT_PROGRESS_NAMESPACE: &str = "vocab_quest_progress";

type Result<T> = std::result::Result<T, ProgressError>;

/// Points, levels, achievements and streaks for one user's progress record.
///
/// Every operation is a read-modify-write of the whole record, so callers
/// must not run two operations for the same user at the same time.
#[derive(Clone)]
pub struct GamificationService {
    store: Arc<dyn ProgressStore>,
    levels: LevelTable,
    namespace: String,
}

impl GamificationService {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self::with_options(store, LevelTable::default(), DEFAULT_PROGRESS_NAMESPACE)
    }

    pub fn with_options(store: Arc<dyn ProgressStore>, levels: LevelTable, namespace: &str) -> Self {
        Self {
            store,
            levels,
            namespace: namespace.to_string(),
        }
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    pub fn level_config(&self, level: u32) -> Option<&LevelConfig> {
        self.levels.level_config(level)
    }

    pub fn all_level_configs(&self) -> &[LevelConfig] {
        self.levels.all_levels()
    }

    /// Create a fresh record for `user_id`, replacing any existing one.
    pub async fn initialize_user_progress(&self, user_id: &str) -> Result<UserProgress> {
        let mut progress = UserProgress::new(user_id, Utc::now());
        self.save_user_progress(&mut progress).await?;

        info!(user_id = %user_id, "Initialized user progress");
        Ok(progress)
    }

    pub async fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let key = progress_key(&self.namespace, user_id);
        match self.store.get(&key).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    // A missing record starts fresh in memory and is written with the first save.
    async fn load_or_new(&self, user_id: &str) -> Result<UserProgress> {
        match self.get_user_progress(user_id).await? {
            Some(progress) => Ok(progress),
            None => {
                debug!(user_id = %user_id, "No progress record yet, starting one");
                Ok(UserProgress::new(user_id, Utc::now()))
            }
        }
    }

    async fn save_user_progress(&self, progress: &mut UserProgress) -> Result<()> {
        progress.last_updated_at = Utc::now();
        let data = serde_json::to_string(progress)?;
        let key = progress_key(&self.namespace, &progress.user_id);
        self.store.put(&key, &data).await?;
        Ok(())
    }

    pub async fn add_points(&self, user_id: &str, points: u64, event: &PointsEvent) -> Result<PointsAward> {
        log_service_start!("gamification", "add_points", user_id = user_id);

        let mut progress = self.load_or_new(user_id).await?;
        let award = self.apply_points(&mut progress, points, event);
        self.save_user_progress(&mut progress).await?;

        info!(
            user_id = %user_id,
            source = event.source_tag(),
            points,
            total_points = award.total_points,
            leveled_up = award.leveled_up,
            unlocked = award.unlocked_achievements.len(),
            "Points added"
        );
        Ok(award)
    }

    pub async fn update_statistics(&self, user_id: &str, update: &StatisticsUpdate) -> Result<()> {
        self.update_statistics_on(user_id, update, Utc::now().date_naive())
            .await
    }

    /// Same as `update_statistics` with an explicit calendar day for the
    /// streak bookkeeping.
    pub async fn update_statistics_on(
        &self,
        user_id: &str,
        update: &StatisticsUpdate,
        today: NaiveDate,
    ) -> Result<()> {
        log_service_start!("gamification", "update_statistics", user_id = user_id);

        let mut progress = self.load_or_new(user_id).await?;
        self.apply_statistics_update(&mut progress, update, today);
        self.save_user_progress(&mut progress).await?;

        debug!(
            user_id = %user_id,
            streak_days = progress.streak_days,
            average_accuracy = progress.statistics.average_accuracy,
            "Statistics updated"
        );
        Ok(())
    }

    /// Hand a finished quiz to the engine: points and achievements first,
    /// then statistics, persisted together in one write.
    pub async fn record_quiz_result(&self, result: &QuizResult) -> Result<QuizRewards> {
        let event = PointsEvent::QuizCompleted(QuizCompletedContext {
            accuracy: result.accuracy,
            completion_time: Some(result.time_spent),
            level: result.level,
        });
        let update = StatisticsUpdate {
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
            completion_time: result.time_spent,
            words_learned: result.new_words_learned.len() as u64,
        };

        let mut progress = self.load_or_new(&result.user_id).await?;
        let award = self.apply_points(&mut progress, result.total_points, &event);
        self.apply_statistics_update(&mut progress, &update, Utc::now().date_naive());
        self.save_user_progress(&mut progress).await?;

        log_service_success!(
            "gamification",
            "record_quiz_result",
            user_id = result.user_id,
            "quiz result recorded"
        );
        Ok(QuizRewards { award, progress })
    }

    pub async fn get_progress_to_next_level(&self, user_id: &str) -> Result<LevelProgress> {
        let progress = self
            .get_user_progress(user_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(user_id.to_string()))?;

        Ok(self.levels.progress_to_next_level(&progress))
    }

    fn apply_points(&self, progress: &mut UserProgress, points: u64, event: &PointsEvent) -> PointsAward {
        let old_level = progress.current_level;
        progress.total_points += points;

        // Rules see the record before any statistics update for this event.
        let mut unlocked_achievements = unlock_achievements(progress, event, Utc::now());

        if let Some(level_up) = self.check_level_up(progress) {
            unlocked_achievements.push(level_up);
        }

        let leveled_up = progress.current_level > old_level;
        PointsAward {
            new_points: points,
            total_points: progress.total_points,
            leveled_up,
            new_level: leveled_up.then_some(progress.current_level),
            unlocked_achievements,
        }
    }

    fn apply_statistics_update(&self, progress: &mut UserProgress, update: &StatisticsUpdate, today: NaiveDate) {
        apply_statistics(progress, update);
        update_streak(progress, today);

        if self.check_level_up(progress).is_some() {
            info!(user_id = %progress.user_id, level = progress.current_level, "Level up after statistics update");
        }
    }

    /// Advances at most one level per call.
    fn check_level_up(&self, progress: &mut UserProgress) -> Option<Achievement> {
        let next = self.levels.next_level(progress.current_level)?;

        if progress.total_points < next.required_points
            || progress.total_words_learned < next.required_words
        {
            return None;
        }

        progress.current_level = next.level;
        let achievement = level_up_achievement(next, Utc::now());
        if progress.has_achievement(&achievement.id) {
            return None;
        }

        progress.total_points += achievement.points;
        progress.achievements.push(achievement.clone());
        Some(achievement)
    }
}

fn apply_statistics(progress: &mut UserProgress, update: &StatisticsUpdate) {
    let stats = &mut progress.statistics;

    stats.total_correct_answers += update.correct_answers;
    stats.total_incorrect_answers += update
        .total_questions
        .saturating_sub(update.correct_answers);
    stats.total_time_spent += update.completion_time;

    let answered = stats.total_correct_answers + stats.total_incorrect_answers;
    if answered > 0 {
        stats.average_accuracy =
            (stats.total_correct_answers as f64 / answered as f64 * 100.0).round() as u32;
        stats.average_time_per_question =
            (stats.total_time_spent as f64 / answered as f64).round() as u64;
    }

    if stats
        .fastest_quiz_time
        .is_none_or(|fastest| update.completion_time < fastest)
    {
        stats.fastest_quiz_time = Some(update.completion_time);
    }

    progress.total_words_learned += update.words_learned;
    progress.total_quizzes_completed += 1;
}

fn update_streak(progress: &mut UserProgress, today: NaiveDate) {
    let yesterday = today.checked_sub_days(Days::new(1));

    match progress.last_active_date {
        Some(last) if last == today => {}
        Some(last) if Some(last) == yesterday => progress.streak_days += 1,
        _ => progress.streak_days = 1,
    }

    if progress.streak_days > progress.statistics.longest_streak {
        progress.statistics.longest_streak = progress.streak_days;
    }
    progress.last_active_date = Some(today);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_streak_transitions() {
        let mut progress = UserProgress::new("kid-1", Utc::now());

        update_streak(&mut progress, day("2024-01-01"));
        assert_eq!(progress.streak_days, 1);

        update_streak(&mut progress, day("2024-01-02"));
        assert_eq!(progress.streak_days, 2);

        update_streak(&mut progress, day("2024-01-02"));
        assert_eq!(progress.streak_days, 2);

        update_streak(&mut progress, day("2024-01-10"));
        assert_eq!(progress.streak_days, 1);
        assert_eq!(progress.statistics.longest_streak, 2);
        assert_eq!(progress.last_active_date, Some(day("2024-01-10")));
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        progress.streak_days = 4;
        progress.last_active_date = Some(day("2024-02-29"));

        update_streak(&mut progress, day("2024-03-01"));
        assert_eq!(progress.streak_days, 5);
    }

    #[test]
    fn test_apply_statistics_accumulates() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        let update = StatisticsUpdate {
            correct_answers: 3,
            total_questions: 4,
            completion_time: 50,
            words_learned: 3,
        };

        apply_statistics(&mut progress, &update);
        apply_statistics(&mut progress, &update);

        let stats = &progress.statistics;
        assert_eq!(stats.total_correct_answers, 6);
        assert_eq!(stats.total_incorrect_answers, 2);
        assert_eq!(stats.average_accuracy, 75);
        assert_eq!(stats.total_time_spent, 100);
        assert_eq!(stats.average_time_per_question, 13);
        assert_eq!(stats.fastest_quiz_time, Some(50));
        assert_eq!(progress.total_words_learned, 6);
        assert_eq!(progress.total_quizzes_completed, 2);
    }

    #[test]
    fn test_fastest_time_only_improves() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        let mut update = StatisticsUpdate {
            correct_answers: 1,
            total_questions: 1,
            completion_time: 40,
            words_learned: 1,
        };

        apply_statistics(&mut progress, &update);
        update.completion_time = 90;
        apply_statistics(&mut progress, &update);
        assert_eq!(progress.statistics.fastest_quiz_time, Some(40));

        update.completion_time = 20;
        apply_statistics(&mut progress, &update);
        assert_eq!(progress.statistics.fastest_quiz_time, Some(20));
    }

    #[test]
    fn test_empty_update_keeps_averages() {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        let update = StatisticsUpdate {
            correct_answers: 0,
            total_questions: 0,
            completion_time: 10,
            words_learned: 0,
        };

        apply_statistics(&mut progress, &update);
        assert_eq!(progress.statistics.average_accuracy, 0);
        assert_eq!(progress.statistics.average_time_per_question, 0);
    }
}
