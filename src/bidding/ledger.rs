/// 원장(ledger): 입찰과 상태 전이의 유일한 진실 공급원
/// 모든 변경은 대상 경매 행의 배타 잠금(SELECT ... FOR UPDATE) 아래 단일
/// 트랜잭션으로 수행한다. 잠금은 경매 단위라서 서로 다른 경매의 입찰은
/// 완전히 병렬로 처리된다. 선행 필터(admission)가 무엇을 통과시켰든
/// 여기서 전부 다시 검증한다.
// region:    --- Imports
use crate::auction::events::AuctionUpdate;
use crate::auction::model::{status, Auction};
use crate::bidding::error::BidError;
use crate::config::Config;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

// endregion: --- Imports

// region:    --- Queries
const SELECT_AUCTION_FOR_UPDATE: &str = "SELECT id, status, current_price, winner_id, start_time, regular_end_time, overtime_started, created_at FROM auctions WHERE id = $1 FOR UPDATE";

const BIDDER_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)";

const APPLY_BID: &str = "UPDATE auctions SET current_price = $1, winner_id = $2, overtime_started = $3 WHERE id = $4";

const INSERT_BID: &str =
    "INSERT INTO bids (auction_id, bidder_id, amount, placed_at) VALUES ($1, $2, $3, $4)";

const APPLY_STATUS: &str = "UPDATE auctions SET status = $1 WHERE id = $2";
// endregion: --- Queries

// region:    --- Place Bid
/// 입찰 처리
/// 검증 순서: 경매 존재 -> 입찰자 존재 -> 상태 -> 시간 구간 -> 가격.
/// 성공 시 현재가/낙찰 예정자 갱신, 입찰 기록 추가, 마감 직전이면 연장 시작.
/// 반환된 스냅샷의 캐시 반영과 방송은 커밋 이후 호출 측 책임이다.
pub async fn place_bid(
    pool: &PgPool,
    cfg: &Config,
    auction_id: i64,
    bidder_id: i64,
    amount: i64,
    at_time: DateTime<Utc>,
) -> Result<AuctionUpdate, BidError> {
    let mut tx = pool.begin().await?;

    // 행 잠금 대기 상한: 초과 시 55P03 -> LockTimeout
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", cfg.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    // 잠금 획득 후 재조회: 이 시점의 값만 신뢰한다
    let auction = sqlx::query_as::<_, Auction>(SELECT_AUCTION_FOR_UPDATE)
        .bind(auction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BidError::AuctionNotFound)?;

    let bidder_exists: bool = sqlx::query_scalar(BIDDER_EXISTS)
        .bind(bidder_id)
        .fetch_one(&mut *tx)
        .await?;
    if !bidder_exists {
        return Err(BidError::BidderNotFound);
    }

    if auction.status != status::ACTIVE {
        return Err(BidError::AuctionNotActive);
    }

    if !auction.in_bidding_window(at_time, cfg.overtime_extension_secs) {
        return Err(BidError::OutsideBiddingWindow);
    }

    // 엄격 초과 규칙: 동일 금액은 거절
    if amount <= auction.current_price {
        return Err(BidError::BidTooLow {
            current_price: auction.current_price,
        });
    }

    let overtime_started = auction.overtime_started
        || auction.triggers_overtime(at_time, cfg.overtime_window_secs, cfg.overtime_extension_secs);

    sqlx::query(APPLY_BID)
        .bind(amount)
        .bind(bidder_id)
        .bind(overtime_started)
        .bind(auction_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(INSERT_BID)
        .bind(auction_id)
        .bind(bidder_id)
        .bind(amount)
        .bind(at_time)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "{:<12} --> 입찰 커밋: auction={}, bidder={}, amount={}, overtime={}",
        "Ledger", auction_id, bidder_id, amount, overtime_started
    );

    let committed = Auction {
        current_price: amount,
        winner_id: Some(bidder_id),
        overtime_started,
        ..auction
    };

    Ok(snapshot_of(&committed, cfg, at_time))
}
// endregion: --- Place Bid

// region:    --- Status Transitions
/// SCHEDULED -> ACTIVE 전이
/// 잠금 아래에서 자격을 재확인하므로 중복 틱이 와도 한 번만 전이된다.
/// 전이가 실제로 일어났을 때만 스냅샷을 반환한다.
pub async fn activate_auction(
    pool: &PgPool,
    cfg: &Config,
    auction_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<AuctionUpdate>, BidError> {
    transition(pool, cfg, auction_id, now, |auction, now| {
        (auction.status == status::SCHEDULED && now >= auction.start_time)
            .then(|| status::ACTIVE)
    })
    .await
}

/// ACTIVE -> CLOSED 전이
/// 실효 마감(연장 반영)이 지나면 더 이상 연장이 시작될 수 없으므로 닫는다.
pub async fn close_auction(
    pool: &PgPool,
    cfg: &Config,
    auction_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<AuctionUpdate>, BidError> {
    let extension = cfg.overtime_extension_secs;
    transition(pool, cfg, auction_id, now, move |auction, now| {
        (auction.status == status::ACTIVE && now >= auction.effective_end_time(extension))
            .then(|| status::CLOSED)
    })
    .await
}

/// 공통 전이 경로: 입찰과 같은 잠금 규율을 따른다
async fn transition<F>(
    pool: &PgPool,
    cfg: &Config,
    auction_id: i64,
    now: DateTime<Utc>,
    decide: F,
) -> Result<Option<AuctionUpdate>, BidError>
where
    F: Fn(&Auction, DateTime<Utc>) -> Option<&'static str>,
{
    let mut tx = pool.begin().await?;

    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", cfg.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    let auction = sqlx::query_as::<_, Auction>(SELECT_AUCTION_FOR_UPDATE)
        .bind(auction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BidError::AuctionNotFound)?;

    let Some(next_status) = decide(&auction, now) else {
        // 다른 틱이 먼저 전이시켰거나 아직 자격이 없음
        return Ok(None);
    };

    sqlx::query(APPLY_STATUS)
        .bind(next_status)
        .bind(auction_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "{:<12} --> 상태 전이 커밋: auction={}, {} -> {}",
        "Ledger", auction_id, auction.status, next_status
    );

    let committed = Auction {
        status: next_status.to_string(),
        ..auction
    };

    Ok(Some(snapshot_of(&committed, cfg, now)))
}
// endregion: --- Status Transitions

/// 커밋된 행으로부터 방송용 스냅샷 구성
fn snapshot_of(auction: &Auction, cfg: &Config, at: DateTime<Utc>) -> AuctionUpdate {
    AuctionUpdate {
        auction_id: auction.id,
        status: auction.status.clone(),
        current_price: auction.current_price,
        winner_id: auction.winner_id,
        effective_end_time: auction.effective_end_time(cfg.overtime_extension_secs),
        updated_at: at,
    }
}
