//! HTTP API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use seal_game_core::{
    error::{ErrorKind, GameError, ServiceError},
    game::{CardIndex, CardValue, GameRoom, PlayCard, RoomStatus},
    leaderboard::{Leaderboard, PlayerStats},
    protocol::{hex_serde, Address, RoomId},
    store::Versioned,
    RoomConfig,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Rooms
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_room).delete(cleanup_room))
        .route("/rooms/:id/join", post(join_room))
        .route("/rooms/:id/leave", post(leave_room))
        .route("/rooms/:id/deck", post(submit_deck))
        .route("/rooms/:id/new-game", post(start_new_game))
        // Turns
        .route("/rooms/:id/play", post(play_turn))
        .route("/rooms/:id/respond/:kind", post(respond))
        .route("/rooms/:id/chancellor", post(resolve_chancellor))
        .route("/rooms/:id/public-card", post(reveal_public_card))
        .route("/rooms/:id/showdown", post(reveal_hand))
        .route("/rooms/:id/timeout", post(claim_timeout))
        // Decryption service
        .route("/rooms/:id/seal-approve", post(seal_approve))
        // Results
        .route("/leaderboard", get(leaderboard))
        // System
        .route("/system/tick", post(tick))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Errors ============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        AppError::Service(e.into())
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ProtocolViolation | ErrorKind::CapacityError => StatusCode::CONFLICT,
        ErrorKind::CryptographicMismatch => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvariantViolation => StatusCode::BAD_REQUEST,
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::Service(e) => (status_for(e.kind()), Some(e.kind())),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
        };
        let body = serde_json::json!({"error": self.to_string(), "kind": kind});
        (status, Json(body)).into_response()
    }
}

// ============ Request/Response types ============

#[derive(Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub max_players: Option<usize>,
    pub tokens_to_win: Option<u32>,
    pub entry_fee: Option<u64>,
    pub turn_timeout_ms: Option<u64>,
}

/// Optimistic concurrency guard, `?expected_version=N`
#[derive(Deserialize, Default)]
pub struct VersionQuery {
    pub expected_version: Option<u64>,
}

#[derive(Serialize, Deserialize)]
pub struct DeckRequest {
    #[serde(with = "hex_serde::bytes_vec")]
    pub ciphertexts: Vec<Vec<u8>>,
    #[serde(with = "hex_serde::bytes32_vec")]
    pub hashes: Vec<[u8; 32]>,
    #[serde(with = "hex_serde::bytes32_vec")]
    pub nonces: Vec<[u8; 32]>,
}

/// A card index with the plaintext proving its value
#[derive(Serialize, Deserialize)]
pub struct RevealRequest {
    pub card_index: CardIndex,
    #[serde(with = "hex_serde::bytes")]
    pub plaintext: Vec<u8>,
}

#[derive(Deserialize)]
pub struct ChancellorRequest {
    pub keep_card_index: CardIndex,
    pub return_indices: Vec<CardIndex>,
}

#[derive(Deserialize)]
pub struct SealApproveRequest {
    #[serde(with = "hex_serde::bytes")]
    pub seal_id: Vec<u8>,
}

#[derive(Serialize)]
pub struct SealApproveResponse {
    pub card_index: CardIndex,
}

#[derive(Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub players: usize,
    pub max_players: usize,
    pub round_number: u32,
}

impl From<&GameRoom> for RoomSummary {
    fn from(room: &GameRoom) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            status: room.status,
            players: room.players.len(),
            max_players: room.max_players,
            round_number: room.round_number,
        }
    }
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LeaderboardEntry {
    pub address: Address,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

#[derive(Deserialize)]
pub struct TickRequest {
    pub seconds: i64,
}

// ============ Helpers ============

fn caller(headers: &HeaderMap) -> Result<Address, AppError> {
    headers
        .get("X-Address")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing X-Address header".to_string()))?
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid X-Address header: {}", e)))
}

/// Run one room transition and return its result with the new version
fn apply<T, F>(
    state: &AppState,
    id: &RoomId,
    query: VersionQuery,
    f: F,
) -> Result<Json<Versioned<T>>, AppError>
where
    F: FnOnce(&mut GameRoom, &mut dyn Leaderboard) -> Result<T, GameError>,
{
    Ok(Json(state.service().transact(id, query.expected_version, f)?))
}

// ============ Room handlers ============

pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let service = state.service();
    let rooms = service
        .active_rooms()
        .iter()
        .filter_map(|id| service.room(id).ok())
        .map(|room| RoomSummary::from(&room.value))
        .collect();
    Json(rooms)
}

pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<Versioned<GameRoom>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    let defaults = RoomConfig::default();
    let config = RoomConfig {
        max_players: req.max_players.unwrap_or(defaults.max_players),
        tokens_to_win: req.tokens_to_win,
        entry_fee: req.entry_fee.unwrap_or(defaults.entry_fee),
        turn_timeout_ms: req
            .turn_timeout_ms
            .unwrap_or(state.config().default_turn_timeout_ms),
    };

    let room = state.service().create_room(&ctx, req.name, &config)?;
    info!("Created room {} via HTTP", room.value.id);
    Ok(Json(room))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
) -> Result<Json<Versioned<GameRoom>>, AppError> {
    Ok(Json(state.service().room(&id)?))
}

pub async fn cleanup_room(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
) -> Result<StatusCode, AppError> {
    state.service().cleanup_finished_room(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, _| room.join(&ctx))
}

pub async fn leave_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, _| room.leave(&ctx))
}

pub async fn submit_deck(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
    Json(req): Json<DeckRequest>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, _| {
        room.submit_encrypted_deck(&ctx, req.ciphertexts, req.hashes, req.nonces)
    })
}

pub async fn start_new_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, _| room.start_new_game(&ctx))
}

// ============ Turn handlers ============

pub async fn play_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
    Json(play): Json<PlayCard>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, lb| room.play_turn(&ctx, lb, play))
}

pub async fn respond(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, kind)): Path<(RoomId, String)>,
    Query(query): Query<VersionQuery>,
    Json(req): Json<RevealRequest>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    let RevealRequest {
        card_index,
        plaintext,
    } = req;
    match kind.as_str() {
        "guard" => apply(&state, &id, query, |room, lb| {
            room.respond_guard(&ctx, lb, card_index, plaintext)
        }),
        "baron" => apply(&state, &id, query, |room, lb| {
            room.respond_baron(&ctx, lb, card_index, plaintext)
        }),
        "prince" => apply(&state, &id, query, |room, lb| {
            room.respond_prince(&ctx, lb, card_index, plaintext)
        }),
        other => Err(AppError::BadRequest(format!(
            "Unknown response kind: {}",
            other
        ))),
    }
}

pub async fn resolve_chancellor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
    Json(req): Json<ChancellorRequest>,
) -> Result<Json<Versioned<()>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, lb| {
        room.resolve_chancellor(&ctx, lb, req.keep_card_index, req.return_indices)
    })
}

pub async fn reveal_public_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
    Json(req): Json<RevealRequest>,
) -> Result<Json<Versioned<CardValue>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, _| {
        room.reveal_public_card(&ctx, req.card_index, req.plaintext)
    })
}

pub async fn reveal_hand(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
    Json(req): Json<RevealRequest>,
) -> Result<Json<Versioned<CardValue>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, lb| {
        room.reveal_hand(&ctx, lb, req.card_index, req.plaintext)
    })
}

pub async fn claim_timeout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<Versioned<Vec<usize>>>, AppError> {
    let ctx = state.tx(caller(&headers)?);
    apply(&state, &id, query, |room, lb| room.claim_timeout(&ctx, lb))
}

pub async fn seal_approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RoomId>,
    Json(req): Json<SealApproveRequest>,
) -> Result<Json<SealApproveResponse>, AppError> {
    let sender = caller(&headers)?;
    let card_index = state.service().seal_approve(&id, &sender, &req.seal_id)?;
    Ok(Json(SealApproveResponse { card_index }))
}

// ============ Results ============

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    let entries = state
        .service()
        .leaderboard()
        .top(query.limit.unwrap_or(10))
        .into_iter()
        .map(|(address, stats)| LeaderboardEntry { address, stats })
        .collect();
    Json(entries)
}

// ============ System ============

/// Advance the simulated clock, for exercising turn timeouts
pub async fn tick(State(state): State<AppState>, Json(req): Json<TickRequest>) -> StatusCode {
    state.advance_time(req.seconds);
    info!("Clock advanced by {}s", req.seconds);
    StatusCode::NO_CONTENT
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::Request;
    use seal_game_core::seal::MockSealService;
    use serde_json::Value;
    use tower::ServiceExt;

    fn hex_addr(b: u8) -> String {
        Address::from_bytes([b; 32]).to_hex()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        who: Option<u8>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(b) = who {
            builder = builder.header("X-Address", hex_addr(b));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn app() -> (Router, AppState) {
        let state = AppState::new(ServerConfig::default());
        (router(state.clone()), state)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_join_room() {
        let (app, _) = app();
        let (status, created) = send(
            &app,
            "POST",
            "/rooms",
            Some(1),
            Some(serde_json::json!({"name": "table", "max_players": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["version"], 1);
        assert_eq!(created["value"]["turn_timeout_ms"], 300_000);
        let id = created["value"]["id"].as_str().unwrap().to_string();

        let (status, joined) =
            send(&app, "POST", &format!("/rooms/{}/join", id), Some(2), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(joined["version"], 2);

        let (status, err) =
            send(&app, "POST", &format!("/rooms/{}/join", id), Some(2), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["kind"], "ProtocolViolation");

        let (_, rooms) = send(&app, "GET", "/rooms", None, None).await;
        assert_eq!(rooms[0]["players"], 2);
    }

    #[tokio::test]
    async fn test_errors_map_to_status() {
        let (app, _) = app();
        let (status, _) = send(
            &app,
            "POST",
            "/rooms",
            None,
            Some(serde_json::json!({"name": "table"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/rooms/{}", RoomId::new()),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "NotFound");

        let (_, created) = send(
            &app,
            "POST",
            "/rooms",
            Some(1),
            Some(serde_json::json!({"name": "table"})),
        )
        .await;
        let id = created["value"]["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/rooms/{}/join?expected_version=7", id),
            Some(2),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_timeout_after_clock_tick() {
        let (app, state) = app();
        let (_, created) = send(
            &app,
            "POST",
            "/rooms",
            Some(1),
            Some(serde_json::json!({"name": "table", "max_players": 2, "turn_timeout_ms": 1000})),
        )
        .await;
        let id: RoomId = created["value"]["id"].as_str().unwrap().parse().unwrap();
        send(&app, "POST", &format!("/rooms/{}/join", id), Some(2), None).await;

        let sealed = MockSealService::new().seal_shuffled(id, &mut rand::thread_rng());
        let deck = DeckRequest {
            ciphertexts: sealed.ciphertexts,
            hashes: sealed.hashes,
            nonces: sealed.nonces,
        };
        let (status, _) = send(
            &app,
            "POST",
            &format!("/rooms/{}/deck", id),
            Some(1),
            Some(serde_json::to_value(&deck).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) =
            send(&app, "POST", &format!("/rooms/{}/timeout", id), Some(2), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        state.advance_time(2);
        let (status, body) =
            send(&app, "POST", &format!("/rooms/{}/timeout", id), Some(2), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], serde_json::json!([0]));

        let room = state.service().room(&id).unwrap().value;
        assert_eq!(room.status, RoomStatus::RoundOver);
        assert_eq!(room.winners, vec![Address::from_bytes([2; 32])]);
    }
}
