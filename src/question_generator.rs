use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::models::{QuestionType, QuizQuestion, Word};

/// Most distractors offered next to the correct option.
pub const MAX_DISTRACTORS: usize = 3;

/// Builds multiple-choice questions from a word pool.
///
/// Pools too small to fill every option produce questions with fewer
/// options rather than failing.
#[derive(Debug, Clone, Default)]
pub struct QuestionGenerator;

impl QuestionGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_questions(&self, level: u32, pool: &[Word], count: usize) -> Vec<QuizQuestion> {
        self.generate_questions_with_rng(level, pool, count, &mut rand::rng())
    }

    pub fn generate_questions_with_rng<R: Rng + ?Sized>(
        &self,
        level: u32,
        pool: &[Word],
        count: usize,
        rng: &mut R,
    ) -> Vec<QuizQuestion> {
        let level_words: Vec<&Word> = pool.iter().filter(|w| w.level == level).collect();

        let mut selected = level_words.clone();
        selected.shuffle(rng);
        selected.truncate(count);

        selected
            .iter()
            .enumerate()
            .map(|(index, word)| {
                let question_type = effective_type(QuestionType::for_index(index), word);
                build_question(word, question_type, &level_words, rng)
            })
            .collect()
    }
}

// Image questions need an image.
fn effective_type(question_type: QuestionType, word: &Word) -> QuestionType {
    match question_type {
        QuestionType::ImageToWord if word.image_url.is_none() => QuestionType::WordToMeaning,
        other => other,
    }
}

fn build_question<R: Rng + ?Sized>(
    word: &Word,
    question_type: QuestionType,
    level_words: &[&Word],
    rng: &mut R,
) -> QuizQuestion {
    let answer_of = |w: &Word| match question_type {
        QuestionType::WordToMeaning => w.meaning.clone(),
        QuestionType::MeaningToWord | QuestionType::ImageToWord => w.word.clone(),
    };

    let correct_answer = answer_of(word);

    let mut others: Vec<&Word> = level_words
        .iter()
        .copied()
        .filter(|w| w.id != word.id)
        .collect();
    others.shuffle(rng);

    let mut options = vec![correct_answer.clone()];
    for other in others {
        if options.len() > MAX_DISTRACTORS {
            break;
        }
        let option = answer_of(other);
        if !options.contains(&option) {
            options.push(option);
        }
    }
    options.shuffle(rng);

    let question = match question_type {
        QuestionType::WordToMeaning => format!("What does \"{}\" mean?", word.word),
        QuestionType::MeaningToWord => format!("What is \"{}\" in English?", word.meaning),
        QuestionType::ImageToWord => "Which English word matches this picture?".to_string(),
    };

    QuizQuestion {
        id: Uuid::new_v4(),
        word_id: word.id.clone(),
        question_type,
        question,
        options,
        correct_answer,
        image_url: match question_type {
            QuestionType::ImageToWord => word.image_url.clone(),
            _ => None,
        },
    }
}
