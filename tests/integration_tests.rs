//! 실행 중인 인스턴스(Postgres, Redis, 서버)를 상대로 하는 종단 테스트.
//! `cargo test -- --ignored` 로 실행한다.

use bidding_service::auction::model::{status, Auction, Bid};
use bidding_service::config::Config;
use bidding_service::database::DatabaseManager;
use bidding_service::query;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const BASE_URL: &str = "http://localhost:3000";

/// 트레이싱 초기화
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    let cfg = Config::load();
    Arc::new(DatabaseManager::new(&cfg).await)
}

/// 입찰 전송 (세션 계층을 흉내 내 x-bidder-id 헤더 사용)
async fn send_bid(client: &Client, auction_id: i64, bidder_id: i64, amount: i64) -> (StatusCode, String) {
    let response = client
        .post(format!("{}/auctions/{}/bids", BASE_URL, auction_id))
        .header("x-bidder-id", bidder_id.to_string())
        .json(&serde_json::json!({ "amount": amount }))
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

/// 시나리오: 100에서 시작, A 150 승인, B 140 거절, B 200 승인, 이력 [200/B, 150/A]
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다"]
async fn test_bid_scenario() {
    let db_manager = setup().await;
    let client = Client::new();

    let bidder_a = create_test_user(&db_manager, "입찰자 A").await;
    let bidder_b = create_test_user(&db_manager, "입찰자 B").await;
    let auction_id = create_test_auction(
        &db_manager,
        status::ACTIVE,
        100,
        Utc::now(),
        Utc::now() + Duration::hours(2),
    )
    .await;

    let (status_a, _) = send_bid(&client, auction_id, bidder_a, 150).await;
    assert_eq!(status_a, StatusCode::OK);

    let (status_b_low, body) = send_bid(&client, auction_id, bidder_b, 140).await;
    assert_eq!(status_b_low, StatusCode::CONFLICT);
    let error_info: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error_info["code"], "LOW_BID");

    let (status_b, _) = send_bid(&client, auction_id, bidder_b, 200).await;
    assert_eq!(status_b, StatusCode::OK);

    // 최종 상태: 가격 200, 낙찰 예정자 B
    let auction = get_auction_row(&db_manager, auction_id).await;
    assert_eq!(auction.current_price, 200);
    assert_eq!(auction.winner_id, Some(bidder_b));

    // 이력은 높은 가격 우선
    let history = query::handlers::get_bid_history(&db_manager, auction_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, 200);
    assert_eq!(history[0].bidder_id, bidder_b);
    assert_eq!(history[1].amount, 150);
    assert_eq!(history[1].bidder_id, bidder_a);
}

/// 엄격 초과 규칙 경계값: 현재가 동일 거절, +1 승인
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다"]
async fn test_equal_amount_rejected() {
    let db_manager = setup().await;
    let client = Client::new();

    let bidder = create_test_user(&db_manager, "경계값 입찰자").await;
    let auction_id = create_test_auction(
        &db_manager,
        status::ACTIVE,
        100,
        Utc::now(),
        Utc::now() + Duration::hours(2),
    )
    .await;

    let (status_eq, body) = send_bid(&client, auction_id, bidder, 100).await;
    assert_eq!(status_eq, StatusCode::CONFLICT);
    let error_info: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error_info["code"], "LOW_BID");

    let (status_above, _) = send_bid(&client, auction_id, bidder, 101).await;
    assert_eq!(status_above, StatusCode::OK);
}

/// SCHEDULED 경매: 모든 입찰 거절, 기록/가격 불변
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다"]
async fn test_scheduled_auction_rejects_bids() {
    let db_manager = setup().await;
    let client = Client::new();

    let bidder = create_test_user(&db_manager, "성급한 입찰자").await;
    let auction_id = create_test_auction(
        &db_manager,
        status::SCHEDULED,
        100,
        Utc::now() + Duration::hours(1),
        Utc::now() + Duration::hours(3),
    )
    .await;

    let (status_code, body) = send_bid(&client, auction_id, bidder, 500).await;
    assert_eq!(status_code, StatusCode::CONFLICT);
    let error_info: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error_info["code"], "NOT_ACTIVE");

    // 부수 효과 없음
    let auction = get_auction_row(&db_manager, auction_id).await;
    assert_eq!(auction.current_price, 100);
    assert_eq!(auction.winner_id, None);
    let history = query::handlers::get_bid_history(&db_manager, auction_id)
        .await
        .unwrap();
    assert!(history.is_empty());
}

/// 마감 직전 입찰만 연장을 시작한다
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다 (OVERTIME_WINDOW_SECS=60 기준)"]
async fn test_overtime_extension() {
    let db_manager = setup().await;
    let client = Client::new();

    let bidder = create_test_user(&db_manager, "막판 입찰자").await;

    // 마감까지 충분히 남은 경매: 연장 없음
    let calm_auction = create_test_auction(
        &db_manager,
        status::ACTIVE,
        100,
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    )
    .await;
    let (calm_status, _) = send_bid(&client, calm_auction, bidder, 150).await;
    assert_eq!(calm_status, StatusCode::OK);
    assert!(!get_auction_row(&db_manager, calm_auction).await.overtime_started);

    // 마감 30초 전 경매: 연장 시작
    let closing_auction = create_test_auction(
        &db_manager,
        status::ACTIVE,
        100,
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::seconds(30),
    )
    .await;
    let (closing_status, _) = send_bid(&client, closing_auction, bidder, 150).await;
    assert_eq!(closing_status, StatusCode::OK);
    assert!(get_auction_row(&db_manager, closing_auction).await.overtime_started);
}

/// 경매 수명주기: 스케줄러가 마감 후 CLOSED로 전이
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다"]
async fn test_auction_lifecycle() {
    let db_manager = setup().await;
    let client = Client::new();

    let bidder = create_test_user(&db_manager, "수명주기 입찰자").await;
    let auction_id = create_test_auction(
        &db_manager,
        status::ACTIVE,
        100,
        Utc::now(),
        Utc::now() + Duration::seconds(5),
    )
    .await;

    let (status_code, _) = send_bid(&client, auction_id, bidder, 150).await;
    assert_eq!(status_code, StatusCode::OK);

    // 스케줄러 전이 대기
    tokio::time::sleep(tokio::time::Duration::from_secs(8)).await;

    let auction = get_auction_row(&db_manager, auction_id).await;
    assert_eq!(auction.status, status::CLOSED);

    // 종료 후 입찰은 거절
    let (late_status, body) = send_bid(&client, auction_id, bidder, 300).await;
    assert_eq!(late_status, StatusCode::CONFLICT);
    let error_info: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error_info["code"], "NOT_ACTIVE");
}

/// 동시성 입찰: 최종 가격은 유효 입찰 중 최대, 커밋 순서상 가격은 오르기만 한다
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다"]
async fn test_concurrent_bidding() {
    init_tracing();
    let db_manager = setup().await;

    let mut bidders = Vec::new();
    for i in 1..=50 {
        bidders.push(create_test_user(&db_manager, &format!("동시 입찰자 {}", i)).await);
    }
    let auction_id = create_test_auction(
        &db_manager,
        status::ACTIVE,
        10_000,
        Utc::now(),
        Utc::now() + Duration::hours(2),
    )
    .await;

    // 50개의 동시 입찰 생성
    let mut handles = vec![];
    for (i, bidder_id) in bidders.iter().enumerate() {
        let client = Client::new();
        let amount = 10_000 + (i as i64 + 1) * 1_000;
        let bidder_id = *bidder_id;
        handles.push(tokio::spawn(async move {
            send_bid(&client, auction_id, bidder_id, amount).await
        }));
    }

    let mut successful_bids = 0;
    let mut rejected_bids = 0;
    for handle in handles {
        let (status_code, body) = handle.await.unwrap();
        match status_code {
            StatusCode::OK => successful_bids += 1,
            StatusCode::CONFLICT => {
                let error_info: Value = serde_json::from_str(&body).unwrap();
                assert_eq!(error_info["code"], "LOW_BID");
                rejected_bids += 1;
            }
            other => panic!("예상 밖 응답: {} {}", other, body),
        }
    }
    info!("성공한 입찰 수: {}, 거절된 입찰 수: {}", successful_bids, rejected_bids);
    assert!(successful_bids >= 1);
    assert_eq!(successful_bids + rejected_bids, 50);

    // 최대 금액 입찰은 어떤 경합 순서에서도 반드시 승자다
    let auction = get_auction_row(&db_manager, auction_id).await;
    assert_eq!(auction.current_price, 60_000);
    assert_eq!(auction.winner_id, Some(bidders[49]));

    // "가격은 오르기만 한다": 커밋 순서로 금액이 엄격 증가.
    // 같은 경매의 INSERT는 행 잠금으로 직렬화되므로 id 순서가 커밋 순서다.
    // (placed_at은 잠금 획득 전에 할당되어 커밋 순서와 다를 수 있다)
    let mut history: Vec<Bid> = query::handlers::get_bid_history(&db_manager, auction_id)
        .await
        .unwrap();
    history.sort_by_key(|b| b.id);
    for pair in history.windows(2) {
        assert!(
            pair[1].amount > pair[0].amount,
            "뒤에 커밋된 입찰({})이 앞선 입찰({}) 이하",
            pair[1].amount,
            pair[0].amount
        );
    }
}

/// 구독자는 입찰 커밋 후 정확히 한 건의 업데이트를 받는다
#[tokio::test]
#[ignore = "실행 중인 Postgres/Redis/서버가 필요합니다"]
async fn test_stream_receives_update() {
    let db_manager = setup().await;
    let client = Client::new();

    let bidder = create_test_user(&db_manager, "관전 입찰자").await;
    let auction_id = create_test_auction(
        &db_manager,
        status::ACTIVE,
        100,
        Utc::now(),
        Utc::now() + Duration::hours(2),
    )
    .await;

    // 입찰 전에 스트림을 연다
    let response = client
        .get(format!("{}/auctions/{}/stream", BASE_URL, auction_id))
        .send()
        .await
        .expect("Failed to open stream");
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = response.bytes_stream();

    // 구독 등록이 끝나길 잠시 기다린 뒤 입찰
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
    let (status_code, _) = send_bid(&client, auction_id, bidder, 150).await;
    assert_eq!(status_code, StatusCode::OK);

    // 새 가격과 낙찰 예정자가 담긴 이벤트가 와야 한다
    let mut received = String::new();
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(5);
    loop {
        let chunk = tokio::time::timeout_at(deadline, stream.next())
            .await
            .expect("업데이트 이벤트 수신 시간 초과")
            .expect("스트림이 먼저 닫힘")
            .expect("스트림 오류");
        received.push_str(&String::from_utf8_lossy(&chunk));
        if received.contains("auction_update") && received.contains("data:") {
            break;
        }
    }
    assert!(received.contains("\"current_price\":150"));
    assert!(received.contains(&format!("\"winner_id\":{}", bidder)));
}

// region:    --- Fixtures

/// 테스트용 사용자 생성
async fn create_test_user(db_manager: &DatabaseManager, name: &str) -> i64 {
    let name = name.to_string();
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO users (name) VALUES ($1) RETURNING id",
                )
                .bind(&name)
                .fetch_one(&mut **tx)
                .await
            })
        })
        .await
        .unwrap()
}

/// 테스트용 경매 + 상품 생성
async fn create_test_auction(
    db_manager: &DatabaseManager,
    auction_status: &str,
    starting_price: i64,
    start_time: DateTime<Utc>,
    regular_end_time: DateTime<Utc>,
) -> i64 {
    let auction_status = auction_status.to_string();
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let auction_id = sqlx::query_scalar::<_, i64>(
                    "INSERT INTO auctions (status, current_price, start_time, regular_end_time)
                     VALUES ($1, $2, $3, $4)
                     RETURNING id",
                )
                .bind(&auction_status)
                .bind(starting_price)
                .bind(start_time)
                .bind(regular_end_time)
                .fetch_one(&mut **tx)
                .await?;

                sqlx::query(
                    "INSERT INTO auction_items (auction_id, name, description) VALUES ($1, $2, $3)",
                )
                .bind(auction_id)
                .bind("테스트 상품")
                .bind("입찰 엔진 테스트용 상품입니다.")
                .execute(&mut **tx)
                .await?;

                Ok::<_, sqlx::Error>(auction_id)
            })
        })
        .await
        .unwrap()
}

/// 경매 행 직접 조회
async fn get_auction_row(db_manager: &DatabaseManager, auction_id: i64) -> Auction {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(
                    "SELECT id, status, current_price, winner_id, start_time, regular_end_time,
                            overtime_started, created_at
                     FROM auctions WHERE id = $1",
                )
                .bind(auction_id)
                .fetch_one(&mut **tx)
                .await
            })
        })
        .await
        .unwrap()
}

// endregion: --- Fixtures
