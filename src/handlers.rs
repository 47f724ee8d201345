// region:    --- Imports
use crate::admission::PriceCache;
use crate::bidding::commands::{handle_place_bid as command_handle_place_bid, PlaceBidCommand};
use crate::broadcast::{BroadcastHub, RedisBroadcaster};
use crate::config::Config;
use crate::database::DatabaseManager;
use crate::query;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::info;

// endregion: --- Imports

// region:    --- App State
#[derive(Clone)]
pub struct AppState {
    pub db_manager: Arc<DatabaseManager>,
    pub cfg: Config,
    pub cache: Arc<dyn PriceCache>,
    pub broadcaster: RedisBroadcaster,
    pub hub: Arc<BroadcastHub>,
}
// endregion: --- App State

// region:    --- Command Handlers

/// 입찰 요청 본문: 금액만 받는다
/// 입찰자는 세션 계층이 심어주는 x-bidder-id 헤더, 시각은 서버 할당.
#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub amount: i64,
}

/// 입찰 요청 처리
pub async fn handle_place_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PlaceBidRequest>,
) -> impl IntoResponse {
    let Some(bidder_id) = bidder_id_from_session(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "세션 정보가 없습니다.",
                "code": "NO_SESSION"
            })),
        )
            .into_response();
    };

    let cmd = PlaceBidCommand {
        auction_id,
        bidder_id,
        amount: req.amount,
    };

    match command_handle_place_bid(
        cmd,
        state.db_manager.pool(),
        &state.cfg,
        state.cache.as_ref(),
        &state.broadcaster,
    )
    .await
    {
        // 성공 응답은 본문 없음
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// 세션 계층이 검증해 심어준 입찰자 id (클라이언트가 임의로 줄 수 없음)
fn bidder_id_from_session(headers: &HeaderMap) -> Option<i64> {
    headers
        .get("x-bidder-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 진행 중 경매 조회
pub async fn handle_get_ongoing_auction(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 진행 중 경매 조회", "HandlerQuery");
    match query::handlers::get_ongoing_auction(&state.db_manager).await {
        Ok(Some(auction)) => Json(auction).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "진행 중인 경매가 없습니다.",
                "code": "NO_ONGOING_AUCTION"
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 예정된 경매 목록 조회
pub async fn handle_get_scheduled_auctions(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 예정된 경매 목록 조회", "HandlerQuery");
    match query::handlers::get_scheduled_auctions(&state.db_manager).await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_bid_history(&state.db_manager, auction_id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// endregion: --- Query Handlers

// region:    --- Stream Handler

/// 경매 실시간 스트림 (SSE)
/// 열린 연결은 상태 변화마다 이벤트 하나를 받고, 연결 종료/오류/유휴
/// 타임아웃 시 닫힌다. 구독자 등록은 이 프로세스의 메모리에만 남는다.
pub async fn handle_auction_stream(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, impl IntoResponse> {
    match query::handlers::get_auction(&state.db_manager, auction_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": "경매를 찾을 수 없습니다.",
                    "code": "AUCTION_NOT_FOUND"
                })),
            )
                .into_response())
        }
        Err(e) => {
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())
        }
    }

    info!(
        "{:<12} --> 스트림 구독 시작: auction={}",
        "Stream", auction_id
    );

    let rx = state.hub.subscribe(auction_id);
    let idle = Duration::from_secs(state.cfg.stream_idle_timeout_secs);

    // 유휴 타임아웃이 지나면 스트림을 끝내 연결을 내린다.
    // 수신 지연으로 밀린(Lagged) 항목은 건너뛴다.
    let stream = BroadcastStream::new(rx)
        .timeout(idle)
        .take_while(|item| item.is_ok())
        .filter_map(|item| match item {
            Ok(Ok(update)) => Event::default()
                .event("auction_update")
                .json_data(&update)
                .ok()
                .map(Ok::<_, Infallible>),
            _ => None,
        });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

// endregion: --- Stream Handler
