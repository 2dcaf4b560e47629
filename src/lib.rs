pub mod achievements;
pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod gamification;
pub mod levels;
pub mod logging;
pub mod models;
pub mod progress_store;
pub mod question_generator;
pub mod quiz_service;
pub mod rwl_parser;

pub use database::Database;
pub use errors::*;
pub use gamification::GamificationService;
pub use levels::LevelTable;
pub use models::*;
pub use progress_store::ProgressStore;
pub use question_generator::QuestionGenerator;
pub use quiz_service::QuizService;
pub use rwl_parser::RwlParser;
