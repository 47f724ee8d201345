// region:    --- Imports
use super::queries;
use crate::auction::model::{AuctionWithItem, Bid};
use crate::database::DatabaseManager;
use sqlx::Error as SqlxError;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 진행 중 경매 조회
pub async fn get_ongoing_auction(
    db_manager: &DatabaseManager,
) -> Result<Option<AuctionWithItem>, SqlxError> {
    info!("{:<12} --> 진행 중 경매 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, AuctionWithItem>(queries::GET_ONGOING_AUCTION)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 예정된 경매 목록 조회
pub async fn get_scheduled_auctions(
    db_manager: &DatabaseManager,
) -> Result<Vec<AuctionWithItem>, SqlxError> {
    info!("{:<12} --> 예정된 경매 목록 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, AuctionWithItem>(queries::GET_SCHEDULED_AUCTIONS)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매 단건 조회
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<AuctionWithItem>, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, AuctionWithItem>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰 이력 조회
pub async fn get_bid_history(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_BID_HISTORY)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

// endregion: --- Query Handlers
