// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

// endregion: --- Imports

// region:    --- BidError
/// 입찰 처리 실패 분류
/// 비즈니스 거절(NOT_ACTIVE, OUT_OF_WINDOW, LOW_BID)은 시스템 장애가 아니다.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("경매를 찾을 수 없습니다.")]
    AuctionNotFound,

    #[error("입찰자를 찾을 수 없습니다.")]
    BidderNotFound,

    #[error("경매가 진행 중이 아닙니다.")]
    AuctionNotActive,

    #[error("입찰 가능 시간이 아닙니다.")]
    OutsideBiddingWindow,

    #[error("입찰 금액이 현재 가격보다 높아야 합니다.")]
    BidTooLow { current_price: i64 },

    #[error("행 잠금 대기 시간 초과")]
    LockTimeout,

    #[error("데이터베이스 오류: {0}")]
    Database(sqlx::Error),
}

impl BidError {
    /// 클라이언트 응답용 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            BidError::AuctionNotFound => "AUCTION_NOT_FOUND",
            BidError::BidderNotFound => "BIDDER_NOT_FOUND",
            BidError::AuctionNotActive => "NOT_ACTIVE",
            BidError::OutsideBiddingWindow => "OUT_OF_WINDOW",
            BidError::BidTooLow { .. } => "LOW_BID",
            BidError::LockTimeout => "LOCK_TIMEOUT",
            BidError::Database(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BidError::AuctionNotFound | BidError::BidderNotFound => StatusCode::NOT_FOUND,
            BidError::AuctionNotActive
            | BidError::OutsideBiddingWindow
            | BidError::BidTooLow { .. } => StatusCode::CONFLICT,
            // 경합 과다: 호출 측 재시도 대상
            BidError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
            BidError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 잠금 대기 초과(55P03)는 별도 분류, 나머지는 데이터베이스 오류
impl From<sqlx::Error> for BidError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().as_deref() == Some("55P03") {
                return BidError::LockTimeout;
            }
        }
        BidError::Database(e)
    }
}

impl IntoResponse for BidError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let BidError::BidTooLow { current_price } = &self {
            body["current_price"] = serde_json::json!(current_price);
        }
        (self.status_code(), Json(body)).into_response()
    }
}
// endregion: --- BidError

// endregion: --- Tests
