use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;
use tracing::{info, warn};

use crate::gamification::DEFAULT_PROGRESS_NAMESPACE;
use crate::models::QuizConfig;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub quiz: QuizConfig,
    pub progress: ProgressConfig,
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub seed_sample_words: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

/// Where progress records live in the key-value store
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub namespace: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            quiz: quiz_config_from_env()?,
            progress: ProgressConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            seed_sample_words = self.database.seed_sample_words,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            questions_per_session = self.quiz.questions_per_session,
            max_attempts = self.quiz.max_attempts,
            time_limit = ?self.quiz.time_limit,
            session_ttl = self.quiz.session_ttl,
            progress_namespace = %self.progress.namespace,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.quiz.questions_per_session == 0 {
            return Err(anyhow!("QUIZ_QUESTIONS_PER_SESSION must be greater than 0"));
        }

        if self.quiz.max_attempts == 0 {
            return Err(anyhow!("QUIZ_MAX_ATTEMPTS must be greater than 0"));
        }

        if self.quiz.session_ttl == 0 {
            return Err(anyhow!("QUIZ_SESSION_TTL_SECS must be greater than 0"));
        }

        if self.progress.namespace.trim().is_empty() {
            return Err(anyhow!("PROGRESS_NAMESPACE must not be empty"));
        }

        if self.quiz.points_per_second_attempt > self.quiz.points_per_first_attempt {
            warn!("Second attempts are worth more points than first attempts");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unusual log level '{}', filter may fall back to 'info'", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:vocab_quest.db?mode=rwc".to_string());

        let seed_sample_words = env_or("SEED_SAMPLE_WORDS", true)?;

        Ok(DatabaseConfig {
            url,
            seed_sample_words,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,vocab_quest=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY")
            .unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

impl ProgressConfig {
    fn from_env() -> Result<Self> {
        let namespace = env::var("PROGRESS_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_PROGRESS_NAMESPACE.to_string());

        Ok(ProgressConfig { namespace })
    }
}

fn quiz_config_from_env() -> Result<QuizConfig> {
    let defaults = QuizConfig::default();

    let time_limit = match env::var("QUIZ_TIME_LIMIT_SECS") {
        Ok(value) if !value.trim().is_empty() => Some(
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("Invalid QUIZ_TIME_LIMIT_SECS value: '{}'", value))?,
        ),
        _ => defaults.time_limit,
    };

    Ok(QuizConfig {
        questions_per_session: env_or("QUIZ_QUESTIONS_PER_SESSION", defaults.questions_per_session)?,
        max_attempts: env_or("QUIZ_MAX_ATTEMPTS", defaults.max_attempts)?,
        points_per_correct_answer: env_or("QUIZ_POINTS_PER_CORRECT", defaults.points_per_correct_answer)?,
        points_per_first_attempt: env_or("QUIZ_POINTS_FIRST_ATTEMPT", defaults.points_per_first_attempt)?,
        points_per_second_attempt: env_or("QUIZ_POINTS_SECOND_ATTEMPT", defaults.points_per_second_attempt)?,
        time_limit,
        session_ttl: env_or("QUIZ_SESSION_TTL_SECS", defaults.session_ttl)?,
    })
}

/// Parse `name` if set, otherwise fall back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
