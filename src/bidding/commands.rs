/// 입찰 커맨드 처리
/// 경로: 선행 필터 -> 원장 -> (커밋 후) 캐시 확정 반영 + 방송.
/// 캐시와 방송 오류는 기록하고 삼킨다: 이미 커밋된 입찰이 그 때문에
/// 실패로 보고되거나 롤백되는 일은 없어야 한다.
// region:    --- Imports
use crate::admission::{Admission, PriceCache};
use crate::bidding::error::BidError;
use crate::bidding::ledger;
use crate::broadcast::RedisBroadcaster;
use crate::config::Config;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령
/// amount만 요청 본문에서 오고, bidder_id는 세션 계층이, 시각은 서버가 정한다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
}

/// 입찰 처리
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    pool: &PgPool,
    cfg: &Config,
    cache: &dyn PriceCache,
    broadcaster: &RedisBroadcaster,
) -> Result<(), BidError> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    // 입찰 시각은 항상 서버가 할당한다
    let at_time = Utc::now();

    // 1. 선행 필터: 명백히 질 입찰은 원장에 닿기 전에 거절.
    //    캐시 장애 시에는 필터를 건너뛰고 원장 직행 (정확성이 처리량에 우선).
    let admitted = match cache.compare_and_raise(cmd.auction_id, cmd.amount).await {
        Ok(Admission::Rejected { cached_price }) => {
            return Err(BidError::BidTooLow {
                current_price: cached_price,
            });
        }
        Ok(Admission::Accepted) => true,
        Err(e) => {
            warn!(
                "{:<12} --> 캐시 접근 실패, 필터 생략하고 원장 직행: {:?}",
                "Command", e
            );
            false
        }
    };

    // 2. 원장: 잠금 아래 전체 재검증 후 커밋. 유일한 진실 공급원.
    match ledger::place_bid(pool, cfg, cmd.auction_id, cmd.bidder_id, cmd.amount, at_time).await {
        Ok(update) => {
            // 3. 커밋 이후에만 캐시 반영과 방송을 수행한다.
            //    커밋 전 방송은 롤백된 상태를 노출할 수 있어 금지.
            if let Err(e) = cache.write_back(cmd.auction_id, update.current_price).await {
                warn!(
                    "{:<12} --> 캐시 확정 반영 실패 (TTL로 자연 복구): {:?}",
                    "Command", e
                );
            }
            if let Err(e) = broadcaster.publish(&update).await {
                error!(
                    "{:<12} --> 방송 실패 (입찰 커밋에는 영향 없음): {:?}",
                    "Command", e
                );
            }
            Ok(())
        }
        Err(e) => {
            // 필터는 통과했지만 원장이 거절한 경우, 낙관적으로 올려둔 캐시가
            // 유효한 입찰을 막지 않도록 비운다 (다음 판정은 원장 기준 재적재)
            if admitted {
                if let Err(cache_err) = cache.invalidate(cmd.auction_id).await {
                    warn!(
                        "{:<12} --> 캐시 정리 실패 (TTL로 자연 복구): {:?}",
                        "Command", cache_err
                    );
                }
            }
            Err(e)
        }
    }
}
// endregion: --- Commands
