use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    database::Database,
    errors::{classify_database_error, ApiError, ErrorContext},
    gamification::GamificationService,
    models::*,
    quiz_service::QuizService,
    rwl_parser::{RwlParseError, RwlParser},
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub gamification: GamificationService,
    pub quiz_service: QuizService,
    pub rwl_parser: RwlParser,
}

#[derive(Deserialize)]
pub struct StartQuizRequest {
    pub user_id: String,
    pub level: u32,
}

#[derive(Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    pub answer: String,
    #[serde(default)]
    pub time_spent: u64,
}

#[derive(Deserialize)]
pub struct AddPointsRequest {
    pub points: u64,
    pub event: PointsEvent,
}

#[derive(Deserialize)]
pub struct ParseTranscriptRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct WordQuery {
    pub level: Option<u32>,
}

#[derive(Serialize)]
pub struct QuizCompletion {
    pub result: QuizResult,
    pub rewards: QuizRewards,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

// Level endpoints
pub async fn get_levels(State(state): State<AppState>) -> Json<ApiResponse<Vec<LevelConfig>>> {
    Json(ApiResponse::success(state.gamification.all_level_configs().to_vec()))
}

pub async fn get_level(
    State(state): State<AppState>,
    Path(level): Path<u32>,
) -> ApiResult<LevelConfig> {
    match state.gamification.level_config(level) {
        Some(config) => Ok(Json(ApiResponse::success(config.clone()))),
        None => {
            let error = ApiError::NotFound(format!("Level {} does not exist", level));
            let context = ErrorContext::new("get_level", "level").with_id(&level.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// Progress endpoints
pub async fn initialize_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserProgress> {
    log_api_start!("initialize_progress", user_id = user_id);

    match state.gamification.initialize_user_progress(&user_id).await {
        Ok(progress) => {
            log_api_success!("initialize_progress", user_id = user_id, "progress created");
            Ok(Json(ApiResponse::success(progress)))
        }
        Err(e) => {
            log_api_error!("initialize_progress", user_id = user_id, error = e, "could not create progress");
            let context = ErrorContext::new("initialize_progress", "progress").with_id(&user_id);
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserProgress> {
    log_api_start!("get_progress", user_id = user_id);

    match state.gamification.get_user_progress(&user_id).await {
        Ok(Some(progress)) => Ok(Json(ApiResponse::success(progress))),
        Ok(None) => {
            log_api_warn!("get_progress", user_id = user_id, "no progress recorded");
            let error = ApiError::NotFound(format!("Progress for user '{}' not found", user_id));
            let context = ErrorContext::new("get_progress", "progress")
                .with_id(&user_id)
                .with_user_message("No progress recorded yet");
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("get_progress", "progress").with_id(&user_id);
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn get_next_level_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<LevelProgress> {
    state
        .gamification
        .get_progress_to_next_level(&user_id)
        .await
        .map(|progress| Json(ApiResponse::success(progress)))
        .map_err(|e| {
            let context = ErrorContext::new("get_next_level_progress", "progress").with_id(&user_id);
            ApiError::from(e).to_response_with_context(context)
        })
}

pub async fn add_points(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AddPointsRequest>,
) -> ApiResult<PointsAward> {
    info!(
        user_id = %user_id,
        points = request.points,
        source = request.event.source_tag(),
        "Adding points"
    );

    match state
        .gamification
        .add_points(&user_id, request.points, &request.event)
        .await
    {
        Ok(award) => Ok(Json(ApiResponse::success(award))),
        Err(e) => {
            log_api_error!("add_points", user_id = user_id, error = e, "points not saved");
            let context = ErrorContext::new("add_points", "progress").with_id(&user_id);
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn get_word_statuses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<WordStatus>> {
    match state.db.get_word_statuses_for_user(&user_id).await {
        Ok(statuses) => Ok(Json(ApiResponse::success(statuses))),
        Err(e) => {
            let context = ErrorContext::new("get_word_statuses", "word_status").with_id(&user_id);
            Err(ApiError::StorageError(e).to_response_with_context(context))
        }
    }
}

// Word endpoints
pub async fn create_word(
    State(state): State<AppState>,
    Json(request): Json<CreateWordRequest>,
) -> ApiResult<Word> {
    if request.id.trim().is_empty() || request.word.trim().is_empty() || request.meaning.trim().is_empty() {
        let error = ApiError::ValidationError("id, word and meaning are required".to_string());
        return Err(error.to_response_with_context(ErrorContext::new("create_word", "word")));
    }
    if request.level == 0 {
        let error = ApiError::ValidationError("level must be at least 1".to_string());
        return Err(error.to_response_with_context(ErrorContext::new("create_word", "word")));
    }

    let word_id = request.id.clone();
    match state.db.create_word(request).await {
        Ok(word) => {
            info!(word_id = %word.id, level = word.level, "Word created");
            Ok(Json(ApiResponse::success(word)))
        }
        Err(e) => {
            let context = ErrorContext::new("create_word", "word").with_id(&word_id);
            Err(classify_database_error(&e).to_response_with_context(context))
        }
    }
}

pub async fn get_words(
    State(state): State<AppState>,
    Query(params): Query<WordQuery>,
) -> ApiResult<Vec<Word>> {
    let words = match params.level {
        Some(level) => state.db.get_words_by_level(level).await,
        None => state.db.get_all_words().await,
    };

    match words {
        Ok(words) => {
            debug!(word_count = words.len(), level = ?params.level, "Words retrieved");
            Ok(Json(ApiResponse::success(words)))
        }
        Err(e) => {
            let context = ErrorContext::new("get_words", "word");
            Err(ApiError::StorageError(e).to_response_with_context(context))
        }
    }
}

// Quiz endpoints
pub async fn get_quiz_config(State(state): State<AppState>) -> Json<ApiResponse<QuizConfig>> {
    Json(ApiResponse::success(state.quiz_service.config().await))
}

pub async fn update_quiz_config(
    State(state): State<AppState>,
    Json(update): Json<QuizConfigUpdate>,
) -> ApiResult<QuizConfig> {
    if update.questions_per_session == Some(0) || update.max_attempts == Some(0) {
        let error = ApiError::ValidationError(
            "questions_per_session and max_attempts must be greater than 0".to_string(),
        );
        return Err(error.to_response_with_context(ErrorContext::new("update_quiz_config", "quiz_config")));
    }

    let config = state.quiz_service.update_config(update).await;
    info!(
        questions_per_session = config.questions_per_session,
        max_attempts = config.max_attempts,
        time_limit = ?config.time_limit,
        "Quiz configuration updated"
    );
    Ok(Json(ApiResponse::success(config)))
}

pub async fn start_quiz(
    State(state): State<AppState>,
    Json(request): Json<StartQuizRequest>,
) -> ApiResult<QuizSession> {
    log_api_start!("start_quiz", user_id = request.user_id);

    if request.user_id.trim().is_empty() {
        let error = ApiError::ValidationError("user_id is required".to_string());
        return Err(error.to_response_with_context(ErrorContext::new("start_quiz", "quiz_session")));
    }

    match state.quiz_service.generate_quiz(request.level, &request.user_id).await {
        Ok(session) => {
            log_api_success!("start_quiz", session_id = session.id, "quiz started");
            Ok(Json(ApiResponse::success(session)))
        }
        Err(e) => {
            let context = ErrorContext::new("start_quiz", "quiz_session").with_id(&request.user_id);
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn get_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<QuizSession> {
    match state.quiz_service.get_session(session_id).await {
        Ok(session) => Ok(Json(ApiResponse::success(session))),
        Err(e) => {
            let context = ErrorContext::new("get_quiz", "quiz_session").with_id(&session_id.to_string());
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SubmitAnswerRequest>,
) -> ApiResult<QuizAnswer> {
    log_api_start!("submit_answer", session_id = session_id);

    match state
        .quiz_service
        .submit_answer(session_id, request.question_id, &request.answer, request.time_spent)
        .await
    {
        Ok(answer) => Ok(Json(ApiResponse::success(answer))),
        Err(e) => {
            let context = ErrorContext::new("submit_answer", "quiz_session")
                .with_id(&session_id.to_string());
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

/// Completion is retryable: the session keeps its result until progress and
/// word results are both persisted, and progress is recorded only once.
pub async fn complete_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<QuizCompletion> {
    log_api_start!("complete_quiz", session_id = session_id);
    let context = || ErrorContext::new("complete_quiz", "quiz_session").with_id(&session_id.to_string());

    let result = state
        .quiz_service
        .complete_quiz(session_id)
        .await
        .map_err(|e| ApiError::from(e).to_response_with_context(context()))?;

    let recorded = state
        .quiz_service
        .recorded_rewards(session_id)
        .await
        .map_err(|e| ApiError::from(e).to_response_with_context(context()))?;

    let rewards = match recorded {
        Some(rewards) => rewards,
        None => {
            let rewards = state
                .gamification
                .record_quiz_result(&result)
                .await
                .map_err(|e| {
                    log_api_error!("complete_quiz", session_id = session_id, error = e, "progress not saved");
                    ApiError::from(e).to_response_with_context(context())
                })?;

            state
                .quiz_service
                .store_rewards(session_id, rewards.clone())
                .await
                .map_err(|e| ApiError::from(e).to_response_with_context(context()))?;
            rewards
        }
    };

    if let Err(e) = state
        .db
        .record_word_results(&result.user_id, &result.new_words_learned, &result.words_to_review)
        .await
    {
        log_api_error!("complete_quiz", session_id = session_id, error = e, "word results not saved");
        return Err(ApiError::StorageError(e).to_response_with_context(context()));
    }

    state
        .quiz_service
        .settle(session_id)
        .await
        .map_err(|e| ApiError::from(e).to_response_with_context(context()))?;

    log_api_success!("complete_quiz", session_id = session_id, "quiz completed");
    Ok(Json(ApiResponse::success(QuizCompletion { result, rewards })))
}

// Read-while-listening endpoints
pub async fn get_sample_transcript(State(state): State<AppState>) -> ApiResult<RwlContent> {
    state
        .rwl_parser
        .sample_content()
        .map(|content| Json(ApiResponse::success(content)))
        .map_err(|e| {
            let error = ApiError::InternalError(e.to_string());
            error.to_response_with_context(ErrorContext::new("get_sample_transcript", "transcript"))
        })
}

pub async fn parse_transcript(
    State(state): State<AppState>,
    Json(request): Json<ParseTranscriptRequest>,
) -> ApiResult<RwlContent> {
    match state.rwl_parser.parse(&request.content) {
        Ok(content) => {
            debug!(title = %content.title, segments = content.segments.len(), "Transcript parsed");
            Ok(Json(ApiResponse::success(content)))
        }
        Err(e @ (RwlParseError::EmptyContent | RwlParseError::InvalidTimestamp(_))) => {
            let error = ApiError::ValidationError(e.to_string());
            Err(error.to_response_with_context(ErrorContext::new("parse_transcript", "transcript")))
        }
        Err(e) => {
            let error = ApiError::InternalError(e.to_string());
            Err(error.to_response_with_context(ErrorContext::new("parse_transcript", "transcript")))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))

        // Level routes
        .route("/api/levels", get(get_levels))
        .route("/api/levels/:level", get(get_level))

        // Progress routes
        .route("/api/users/:user_id/progress", post(initialize_progress).get(get_progress))
        .route("/api/users/:user_id/progress/next-level", get(get_next_level_progress))
        .route("/api/users/:user_id/points", post(add_points))
        .route("/api/users/:user_id/words/status", get(get_word_statuses))

        // Word routes
        .route("/api/words", post(create_word).get(get_words))

        // Quiz routes
        .route("/api/quiz/start", post(start_quiz))
        .route("/api/quiz/config", get(get_quiz_config).put(update_quiz_config))
        .route("/api/quiz/:session_id", get(get_quiz))
        .route("/api/quiz/:session_id/answer", post(submit_answer))
        .route("/api/quiz/:session_id/complete", post(complete_quiz))

        // Read-while-listening routes
        .route("/api/rwl/sample", get(get_sample_transcript))
        .route("/api/rwl/parse", post(parse_transcript))

        .with_state(state)
}
