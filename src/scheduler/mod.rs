/// 경매 수명주기 스케줄러
/// 고정 주기 틱으로 시계 기준 전이를 수행한다: 시작 시각이 지난 SCHEDULED는
/// ACTIVE로, 실효 마감(연장 반영)이 지난 ACTIVE는 CLOSED로. 전이는 입찰과
/// 같은 잠금 경로를 타므로 프로세스 여러 개가 중복 틱을 돌려도 무해하다.
/// 입찰 없이 경매를 ACTIVE 밖으로 옮길 수 있는 유일한 구성요소.
// region:    --- Imports
use crate::admission::PriceCache;
use crate::bidding::ledger;
use crate::broadcast::RedisBroadcaster;
use crate::config::Config;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Queries
/// 시작 시각이 지난 SCHEDULED 경매
const DUE_TO_ACTIVATE: &str =
    "SELECT id FROM auctions WHERE status = 'SCHEDULED' AND start_time <= $1";

/// 실효 마감이 지난 ACTIVE 경매
/// 연장이 시작된 경매는 정규 마감 + 연장분까지 기다린다. 마감이 지나면
/// 더 이상 연장 조건이 성립할 수 없으므로 닫아도 안전하다.
const DUE_TO_CLOSE: &str = "SELECT id FROM auctions WHERE status = 'ACTIVE' \
     AND ((overtime_started AND regular_end_time <= $1) \
       OR (NOT overtime_started AND regular_end_time <= $2))";
// endregion: --- Queries

// region:    --- Auction Scheduler
pub struct AuctionScheduler {
    pool: Arc<PgPool>,
    cfg: Config,
    cache: Arc<dyn PriceCache>,
    broadcaster: RedisBroadcaster,
}

impl AuctionScheduler {
    pub fn new(
        pool: Arc<PgPool>,
        cfg: Config,
        cache: Arc<dyn PriceCache>,
        broadcaster: RedisBroadcaster,
    ) -> Self {
        Self {
            pool,
            cfg,
            cache,
            broadcaster,
        }
    }

    /// 스케줄러 시작
    pub async fn start(self) {
        let tick_secs = self.cfg.scheduler_interval_secs;
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(tick_secs));
            loop {
                interval.tick().await;
                if let Err(e) = self.advance_auctions(Utc::now()).await {
                    error!(
                        "{:<12} --> 경매 상태 전이 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 한 틱: 전이 대상 선별 후 건별로 잠금 경로를 통해 전이
    async fn advance_auctions(&self, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        // SCHEDULED -> ACTIVE
        let to_activate: Vec<(i64,)> = sqlx::query_as(DUE_TO_ACTIVATE)
            .bind(now)
            .fetch_all(&*self.pool)
            .await?;

        for (auction_id,) in to_activate {
            match ledger::activate_auction(&self.pool, &self.cfg, auction_id, now).await {
                Ok(Some(update)) => {
                    info!("{:<12} --> 경매 시작: auction={}", "Scheduler", auction_id);
                    if let Err(e) = self.broadcaster.publish(&update).await {
                        error!("{:<12} --> 시작 방송 실패: {:?}", "Scheduler", e);
                    }
                }
                // 다른 틱이 먼저 처리함
                Ok(None) => {}
                Err(e) => error!(
                    "{:<12} --> 경매 시작 전이 실패: auction={}, {:?}",
                    "Scheduler", auction_id, e
                ),
            }
        }

        // ACTIVE -> CLOSED
        // 후보 질의 단계에서는 연장 마감을 넉넉히 계산하고, 확정 판정은
        // 전이 트랜잭션이 잠금 아래에서 다시 한다.
        let overtime_deadline = now - ChronoDuration::seconds(self.cfg.overtime_extension_secs);
        let to_close: Vec<(i64,)> = sqlx::query_as(DUE_TO_CLOSE)
            .bind(overtime_deadline)
            .bind(now)
            .fetch_all(&*self.pool)
            .await?;

        for (auction_id,) in to_close {
            match ledger::close_auction(&self.pool, &self.cfg, auction_id, now).await {
                Ok(Some(update)) => {
                    info!("{:<12} --> 경매 종료: auction={}", "Scheduler", auction_id);
                    // 종료된 경매의 가격 캐시는 더 이상 필요 없다
                    if let Err(e) = self.cache.invalidate(auction_id).await {
                        error!("{:<12} --> 캐시 정리 실패: {:?}", "Scheduler", e);
                    }
                    if let Err(e) = self.broadcaster.publish(&update).await {
                        error!("{:<12} --> 종료 방송 실패: {:?}", "Scheduler", e);
                    }
                }
                Ok(None) => {}
                Err(e) => error!(
                    "{:<12} --> 경매 종료 전이 실패: auction={}, {:?}",
                    "Scheduler", auction_id, e
                ),
            }
        }

        debug!("{:<12} --> 틱 완료", "Scheduler");
        Ok(())
    }
}
// endregion: --- Auction Scheduler
