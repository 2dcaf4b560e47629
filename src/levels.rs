use anyhow::{anyhow, Result};

use crate::models::{LevelConfig, LevelProgress, UserProgress};

/// Ordered, read-only level thresholds. Level N's requirements are what it
/// takes to move from level N-1 to N.
#[derive(Debug, Clone)]
pub struct LevelTable {
    levels: Vec<LevelConfig>,
}

impl Default for LevelTable {
    fn default() -> Self {
        let level = |level, name: &str, badge: &str, points, words, description: &str| LevelConfig {
            level,
            name: name.to_string(),
            badge: badge.to_string(),
            required_points: points,
            required_words: words,
            description: description.to_string(),
        };

        Self {
            levels: vec![
                level(1, "Seedling", "🌱", 0, 0, "Just started learning English words."),
                level(2, "Blossom", "🌸", 500, 50, "Getting to know the basic words."),
                level(3, "Tree", "🌳", 1500, 150, "Growing into intermediate words."),
                level(4, "Forest", "🏞️", 3000, 300, "Exploring advanced words."),
            ],
        }
    }
}

impl LevelTable {
    /// Build a custom table. Levels must start at 1 and be contiguous.
    pub fn new(levels: Vec<LevelConfig>) -> Result<Self> {
        if levels.is_empty() {
            return Err(anyhow!("Level table must contain at least one level"));
        }

        for (index, config) in levels.iter().enumerate() {
            let expected = index as u32 + 1;
            if config.level != expected {
                return Err(anyhow!(
                    "Level table entry {} has level {}, expected {}",
                    index,
                    config.level,
                    expected
                ));
            }
        }

        Ok(Self { levels })
    }

    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn level_config(&self, level: u32) -> Option<&LevelConfig> {
        level
            .checked_sub(1)
            .and_then(|index| self.levels.get(index as usize))
    }

    pub fn all_levels(&self) -> &[LevelConfig] {
        &self.levels
    }

    /// Thresholds for the level after `current_level`, if there is one.
    pub fn next_level(&self, current_level: u32) -> Option<&LevelConfig> {
        self.level_config(current_level.saturating_add(1))
    }

    pub fn progress_to_next_level(&self, progress: &UserProgress) -> LevelProgress {
        let current_level = progress.current_level;

        let Some(next) = self.next_level(current_level) else {
            return LevelProgress {
                current_level,
                next_level: None,
                points_needed: 0,
                words_needed: 0,
                progress_percentage: 100,
            };
        };

        let points_needed = next.required_points.saturating_sub(progress.total_points);
        let words_needed = next.required_words.saturating_sub(progress.total_words_learned);

        let points_progress = dimension_percentage(progress.total_points, next.required_points);
        let words_progress = dimension_percentage(progress.total_words_learned, next.required_words);
        let progress_percentage = ((points_progress + words_progress) / 2.0).round() as u32;

        LevelProgress {
            current_level,
            next_level: Some(next.level),
            points_needed,
            words_needed,
            progress_percentage,
        }
    }
}

// A zero threshold is already met.
fn dimension_percentage(value: u64, threshold: u64) -> f64 {
    if threshold == 0 {
        return 100.0;
    }
    (value as f64 / threshold as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn progress_with(level: u32, points: u64, words: u64) -> UserProgress {
        let mut progress = UserProgress::new("kid-1", Utc::now());
        progress.current_level = level;
        progress.total_points = points;
        progress.total_words_learned = words;
        progress
    }

    #[test]
    fn test_level_config_lookup() {
        let table = LevelTable::default();

        assert_eq!(table.max_level(), 4);
        assert_eq!(table.level_config(1).unwrap().name, "Seedling");
        assert_eq!(table.level_config(4).unwrap().required_points, 3000);
        assert!(table.level_config(0).is_none());
        assert!(table.level_config(5).is_none());
    }

    #[test]
    fn test_progress_halfway_to_level_two() {
        let table = LevelTable::default();
        let progress = table.progress_to_next_level(&progress_with(1, 250, 25));

        assert_eq!(progress.next_level, Some(2));
        assert_eq!(progress.points_needed, 250);
        assert_eq!(progress.words_needed, 25);
        assert_eq!(progress.progress_percentage, 50);
    }

    #[test]
    fn test_progress_caps_each_dimension() {
        let table = LevelTable::default();
        // Points far past the threshold cannot make up for missing words.
        let progress = table.progress_to_next_level(&progress_with(1, 5000, 0));

        assert_eq!(progress.points_needed, 0);
        assert_eq!(progress.words_needed, 50);
        assert_eq!(progress.progress_percentage, 50);
    }

    #[test]
    fn test_progress_at_max_level() {
        let table = LevelTable::default();

        for points in [0, 3000, 1_000_000] {
            let progress = table.progress_to_next_level(&progress_with(4, points, 0));
            assert_eq!(progress.next_level, None);
            assert_eq!(progress.progress_percentage, 100);
            assert_eq!(progress.points_needed, 0);
            assert_eq!(progress.words_needed, 0);
        }
    }

    #[test]
    fn test_zero_threshold_counts_as_complete() {
        let mut levels = LevelTable::default().all_levels().to_vec();
        levels[1].required_words = 0;
        let table = LevelTable::new(levels).unwrap();

        let progress = table.progress_to_next_level(&progress_with(1, 0, 0));
        assert_eq!(progress.progress_percentage, 50);
    }

    #[test]
    fn test_custom_table_validation() {
        assert!(LevelTable::new(vec![]).is_err());

        let mut levels = LevelTable::default().all_levels().to_vec();
        levels.remove(1);
        assert!(LevelTable::new(levels).is_err());
    }
}
