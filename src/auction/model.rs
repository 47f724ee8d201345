use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// region:    --- Status
/// 경매 상태: SCHEDULED -> ACTIVE -> CLOSED 단방향 전이만 허용
pub mod status {
    pub const SCHEDULED: &str = "SCHEDULED";
    pub const ACTIVE: &str = "ACTIVE";
    pub const CLOSED: &str = "CLOSED";
}
// endregion: --- Status

// region:    --- Models
// 경매 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Auction {
    pub id: i64,
    pub status: String,
    pub current_price: i64,
    pub winner_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub regular_end_time: DateTime<Utc>,
    pub overtime_started: bool,
    pub created_at: DateTime<Utc>,
}

// 경매 + 상품 조회 모델 (auction_items 조인 결과)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuctionWithItem {
    pub id: i64,
    pub status: String,
    pub current_price: i64,
    pub winner_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub regular_end_time: DateTime<Utc>,
    pub overtime_started: bool,
    pub created_at: DateTime<Utc>,
    pub item_name: String,
    pub item_description: String,
}

// 입찰 모델 (append-only, 수정/삭제 없음)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
}
// endregion: --- Models

// region:    --- Window
impl Auction {
    /// 실효 마감 시각: 연장이 시작됐으면 정규 마감 + 연장분
    pub fn effective_end_time(&self, extension_secs: i64) -> DateTime<Utc> {
        if self.overtime_started {
            self.regular_end_time + Duration::seconds(extension_secs)
        } else {
            self.regular_end_time
        }
    }

    /// 입찰 허용 구간 [start_time, effective_end_time) 판정
    pub fn in_bidding_window(&self, at: DateTime<Utc>, extension_secs: i64) -> bool {
        at >= self.start_time && at < self.effective_end_time(extension_secs)
    }

    /// 마감 직전 구간 판정: 연장은 경매당 한 번만 시작된다
    pub fn triggers_overtime(
        &self,
        at: DateTime<Utc>,
        window_secs: i64,
        extension_secs: i64,
    ) -> bool {
        if self.overtime_started {
            return false;
        }
        let end = self.effective_end_time(extension_secs);
        at >= end - Duration::seconds(window_secs) && at < end
    }
}
// endregion: --- Window

// endregion: --- Tests
