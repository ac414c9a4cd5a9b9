//! HTTP REST API using axum.
//!
//! Read queries go straight to the query engine; session requests go
//! through the session registry. Everything answers with the same JSON
//! envelope.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{season_for_start_year, GameCategory, PlayerId, TeamToken};
use linemate_query::engine::{PlayerInfo, QueryEngine};
use linemate_query::filter::EdgeFilter;

use crate::session::{SessionMode, SessionRegistry, StartInfo, StartRequest, TurnResult};
use crate::ws::RoomHub;

// ─── Application state ──────────────────────────────────────────────────────

/// Shared handles every request sees.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub sessions: Arc<SessionRegistry>,
    pub rooms: Arc<RoomHub>,
}

// ─── JSON request / response types ──────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn ok_empty() -> ApiResponse<()> {
        ApiResponse {
            success: true,
            data: None,
            error: None,
        }
    }

    fn err(msg: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct InfoResponse {
    players: usize,
    named_players: usize,
    games: usize,
    teammate_pairs: usize,
    latest_season_start_year: Option<u32>,
    active_sessions: usize,
    open_rooms: usize,
}

#[derive(Deserialize)]
struct SearchQuery {
    name: Option<String>,
}

/// Comma-separated list params plus season bounds, shared by the filtered
/// read endpoints and session start options.
#[derive(Default, Deserialize)]
struct FilterQuery {
    teams: Option<String>,
    start_year: Option<u32>,
    end_year: Option<u32>,
    game_types: Option<String>,
}

impl FilterQuery {
    fn to_filter(&self) -> LinemateResult<EdgeFilter> {
        build_filter(
            self.teams.as_deref(),
            self.start_year,
            self.end_year,
            self.game_types.as_deref(),
        )
    }
}

#[derive(Deserialize)]
struct PairQuery {
    player1: PlayerId,
    player2: PlayerId,
    teams: Option<String>,
    start_year: Option<u32>,
    end_year: Option<u32>,
    game_types: Option<String>,
}

#[derive(Deserialize)]
struct PathQuery {
    player1: PlayerId,
    player2: PlayerId,
    teams: Option<String>,
    start_year: Option<u32>,
    end_year: Option<u32>,
    game_types: Option<String>,
    include_players: Option<String>,
    exclude_players: Option<String>,
}

#[derive(Deserialize)]
struct StartSessionRequest {
    participants: Vec<String>,
    mode: SessionMode,
    #[serde(default)]
    options: FilterQuery,
}

#[derive(Deserialize)]
struct GuessRequest {
    participant: String,
    candidate: PlayerId,
}

#[derive(Deserialize)]
struct PlayAgainRequest {
    again: bool,
}

#[derive(Serialize)]
struct ResponseStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<TurnResult>,
}

#[derive(Serialize)]
struct PlayAgainResponse {
    restarted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<StartInfo>,
}

// ─── Router construction ────────────────────────────────────────────────────

/// Build the axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/info", get(info))
        // Player routes.
        .route("/v1/players", get(list_players))
        .route("/v1/players/search", get(search_players))
        .route("/v1/players/random", get(random_player))
        .route("/v1/players/{id}", get(get_player))
        .route("/v1/players/{id}/teammates", get(player_teammates))
        .route("/v1/players/{id}/teams", get(player_teams))
        // Team and game listings.
        .route("/v1/teams", get(list_teams))
        .route("/v1/teams/common", get(common_teams))
        .route("/v1/games", get(list_games))
        // Path search.
        .route("/v1/path", get(find_path))
        // Session routes.
        .route("/v1/sessions/{id}/start", post(start_session))
        .route("/v1/sessions/{id}/guess", post(submit_guess))
        .route("/v1/sessions/{id}/response", get(session_response))
        .route("/v1/sessions/{id}/play-again", post(play_again))
        .route("/v1/sessions/{id}/ws", get(crate::ws::room_handler))
        .with_state(state)
}

// ─── Helper to map LinemateError to HTTP responses ──────────────────────────

fn linemate_error_response(err: LinemateError) -> impl IntoResponse {
    let status = match &err {
        LinemateError::PlayerNotFound(_)
        | LinemateError::PathNotFound(_, _)
        | LinemateError::NoPlayersMatch
        | LinemateError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        LinemateError::InvalidFilter(_) | LinemateError::InvalidSession(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::err(err.to_string())))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
    }))
}

async fn info(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.stats().await {
        Ok(stats) => Json(ApiResponse::ok(InfoResponse {
            players: stats.players,
            named_players: stats.named_players,
            games: stats.games,
            teammate_pairs: stats.teammate_pairs,
            latest_season_start_year: state.engine.latest_season_start_year(),
            active_sessions: state.sessions.active_sessions(),
            open_rooms: state.rooms.room_count(),
        }))
        .into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn list_players(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.engine.all_players()))
}

async fn search_players(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    match query.name {
        Some(name) if !name.trim().is_empty() => {
            Json(ApiResponse::ok(state.engine.players_by_name(&name))).into_response()
        }
        _ => linemate_error_response(LinemateError::InvalidFilter(
            "the 'name' query parameter is required".into(),
        ))
        .into_response(),
    }
}

async fn random_player(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> impl IntoResponse {
    let picked = query
        .to_filter()
        .and_then(|filter| state.engine.random_player(&filter));
    match picked {
        Ok(player) => Json(ApiResponse::ok(player)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn get_player(State(state): State<AppState>, Path(id): Path<PlayerId>) -> impl IntoResponse {
    match state.engine.player_by_id(id) {
        Ok(player) => Json(ApiResponse::ok(player)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn player_teammates(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
    Query(query): Query<FilterQuery>,
) -> impl IntoResponse {
    let rows = query
        .to_filter()
        .and_then(|filter| state.engine.teammates_of(id, &filter));
    match rows {
        Ok(rows) => Json(ApiResponse::ok(rows)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn player_teams(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
    Query(query): Query<FilterQuery>,
) -> impl IntoResponse {
    let teams = query
        .to_filter()
        .and_then(|filter| state.engine.teams_of_player(id, &filter));
    match teams {
        Ok(teams) => Json(ApiResponse::ok(teams)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn list_teams(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.engine.all_teams()))
}

async fn common_teams(
    State(state): State<AppState>,
    Query(query): Query<PairQuery>,
) -> impl IntoResponse {
    let teams = build_filter(
        query.teams.as_deref(),
        query.start_year,
        query.end_year,
        query.game_types.as_deref(),
    )
    .and_then(|filter| {
        state
            .engine
            .common_teams(query.player1, query.player2, &filter)
    });
    match teams {
        Ok(teams) => Json(ApiResponse::ok(teams)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn list_games(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.engine.all_games()))
}

async fn find_path(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    let path: LinemateResult<Vec<PlayerInfo>> = async {
        let filter = build_filter(
            query.teams.as_deref(),
            query.start_year,
            query.end_year,
            query.game_types.as_deref(),
        )?;
        let include = parse_id_list(query.include_players.as_deref())?;
        let exclude = parse_id_list(query.exclude_players.as_deref())?;
        state
            .engine
            .shortest_path(query.player1, query.player2, &filter, &include, &exclude)
            .await
    }
    .await;
    match path {
        Ok(path) => Json(ApiResponse::ok(path)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let filter = match body.options.to_filter() {
        Ok(filter) => filter,
        Err(err) => return linemate_error_response(err).into_response(),
    };
    let request = StartRequest {
        participants: body.participants,
        mode: body.mode,
        filter,
    };
    match state.sessions.start(&session_id, request).await {
        Ok(info) => Json(ApiResponse::ok(info)).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn submit_guess(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<GuessRequest>,
) -> impl IntoResponse {
    match state
        .sessions
        .guess(&session_id, body.participant, body.candidate)
        .await
    {
        Ok(()) => Json(ApiResponse::<()>::ok_empty()).into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn session_response(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.check_response(&session_id).await {
        Ok(Some(result)) => Json(ApiResponse::ok(ResponseStatus {
            status: "ready",
            result: Some(result),
        }))
        .into_response(),
        Ok(None) => Json(ApiResponse::ok(ResponseStatus {
            status: "waiting",
            result: None,
        }))
        .into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

async fn play_again(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<PlayAgainRequest>,
) -> impl IntoResponse {
    match state.sessions.play_again(&session_id, body.again).await {
        Ok(start) => Json(ApiResponse::ok(PlayAgainResponse {
            restarted: start.is_some(),
            start,
        }))
        .into_response(),
        Err(err) => linemate_error_response(err).into_response(),
    }
}

// ─── Filter parsing ─────────────────────────────────────────────────────────

fn build_filter(
    teams: Option<&str>,
    start_year: Option<u32>,
    end_year: Option<u32>,
    game_types: Option<&str>,
) -> LinemateResult<EdgeFilter> {
    let mut filter = EdgeFilter::none();
    if let Some(raw) = teams {
        let tokens: HashSet<TeamToken> = split_list(raw).map(TeamToken::from_raw).collect();
        if !tokens.is_empty() {
            filter.teams = Some(tokens);
        }
    }
    filter.season_start = start_year.map(season_for_start_year);
    filter.season_end = end_year.map(season_for_start_year);
    if let Some(raw) = game_types {
        let mut categories = HashSet::new();
        for token in split_list(raw) {
            categories.insert(GameCategory::parse_token(token)?);
        }
        if !categories.is_empty() {
            filter.categories = Some(categories);
        }
    }
    Ok(filter)
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn parse_id_list(raw: Option<&str>) -> LinemateResult<Vec<PlayerId>> {
    let mut ids = Vec::new();
    if let Some(raw) = raw {
        for token in split_list(raw) {
            let id = token.parse::<PlayerId>().map_err(|_| {
                LinemateError::InvalidFilter(format!("invalid player id '{token}'"))
            })?;
            ids.push(id);
        }
    }
    Ok(ids)
}
