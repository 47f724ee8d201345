// region:    --- Imports
use crate::admission::{PriceCache, RedisPriceCache};
use crate::broadcast::{BroadcastHub, RedisBroadcaster};
use crate::config::Config;
use crate::database::DatabaseManager;
use crate::handlers::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod admission;
mod auction;
mod bidding;
mod broadcast;
mod config;
mod database;
mod handlers;
mod query;
mod scheduler;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드
    let cfg = Config::load();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new(&cfg).await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // 선행 필터용 가격 캐시 접속
    let cache: Arc<dyn PriceCache> = match RedisPriceCache::connect(&cfg.redis_url, cfg.price_cache_ttl_secs).await
    {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            error!("{:<12} --> Redis 초기화 실패: {:?}", "Main", e);
            return Err(e.into());
        }
    };
    info!("{:<12} --> Redis 초기화 성공", "Main");

    // 방송 발행자 + 프로세스 로컬 구독자 허브
    let broadcaster = RedisBroadcaster::connect(&cfg.redis_url).await?;
    let hub = Arc::new(BroadcastHub::new());

    // 프로세스당 하나의 pub/sub 수신 루프: 모든 프로세스의 커밋을 중계받는다
    tokio::spawn(broadcast::run_listener(
        cfg.redis_url.clone(),
        Arc::clone(&hub),
    ));

    // 경매 수명주기 스케줄러
    let auction_scheduler = scheduler::AuctionScheduler::new(
        db_manager.get_pool(),
        cfg.clone(),
        cache.clone(),
        broadcaster.clone(),
    );
    auction_scheduler.start().await;

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        db_manager,
        cfg: cfg.clone(),
        cache,
        broadcaster,
        hub,
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/auctions/ongoing", get(handlers::handle_get_ongoing_auction))
        .route(
            "/auctions/scheduled",
            get(handlers::handle_get_scheduled_auctions),
        )
        .route(
            "/auctions/:id/bids",
            post(handlers::handle_place_bid).get(handlers::handle_get_bid_history),
        )
        .route("/auctions/:id/stream", get(handlers::handle_auction_stream))
        .layer(cors)
        .with_state(state);

    // 리스너 생성
    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
