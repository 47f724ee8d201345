use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 경매 상태 스냅샷: 커밋된 입찰/상태 전이마다 하나씩 발행된다
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuctionUpdate {
    pub auction_id: i64,
    pub status: String,
    pub current_price: i64,
    pub winner_id: Option<i64>,
    pub effective_end_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
