/// 입찰 선행 필터
/// 과열 경매에서 명백히 질 입찰을 원장(데이터베이스)에 닿기 전에 걸러낸다.
/// 캐시는 진실 공급원이 아니라 처리량 최적화일 뿐이다: 여기서 통과한 입찰도
/// 원장이 전부 재검증하고, 캐시 장애 시에는 필터 없이 원장 직행으로 동작한다.
// region:    --- Imports
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

// endregion: --- Imports

// region:    --- Price Cache Trait
/// 선행 필터 판정 결과
/// 거절은 비즈니스 결과지 오류가 아니다. 거절 시 캐시에 있던 가격을 함께
/// 돌려줘 호출 측이 응답에 실어줄 수 있게 한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected { cached_price: i64 },
}

/// 경매별 현재가 캐시
#[async_trait]
pub trait PriceCache: Send + Sync {
    /// 원자적 비교-설정: 캐시된 가격보다 엄격히 크면 갱신하고 승인.
    /// 두 동시 호출이 서로 증가하지 않는 가격으로 둘 다 승인될 수는 없다.
    async fn compare_and_raise(&self, auction_id: i64, amount: i64)
        -> redis::RedisResult<Admission>;

    /// 원장 커밋 후 확정 가격 반영: 필터의 낙관적 기록을 항상 덮어쓴다
    async fn write_back(&self, auction_id: i64, price: i64) -> redis::RedisResult<()>;

    /// 캐시 항목 제거 (경매 종료 시)
    async fn invalidate(&self, auction_id: i64) -> redis::RedisResult<()>;
}

/// 승인 판정 규칙: 캐시 미존재 시 통과(원장이 재검증), 존재 시 엄격 초과만 통과.
/// 아래 Lua 스크립트와 같은 규칙이다.
pub fn admit_decision(cached_price: Option<i64>, amount: i64) -> bool {
    match cached_price {
        Some(price) => amount > price,
        None => true,
    }
}
// endregion: --- Price Cache Trait

// region:    --- Redis Price Cache
/// GET -> 비교 -> SET(EX)을 서버에서 원자적으로 평가한다.
/// 반환: {1, 금액} 승인 / {0, 캐시 가격} 거절
const COMPARE_AND_RAISE_SCRIPT: &str = r#"
local cur = redis.call('GET', KEYS[1])
if cur and tonumber(ARGV[1]) <= tonumber(cur) then
    return {0, tonumber(cur)}
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
return {1, tonumber(ARGV[1])}
"#;

pub struct RedisPriceCache {
    conn: ConnectionManager,
    script: Script,
    ttl_secs: u64,
}

impl RedisPriceCache {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self {
            conn,
            script: Script::new(COMPARE_AND_RAISE_SCRIPT),
            ttl_secs,
        }
    }

    /// Redis 접속 초기화
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn, ttl_secs))
    }

    fn price_key(auction_id: i64) -> String {
        format!("auction:{}:price", auction_id)
    }
}

#[async_trait]
impl PriceCache for RedisPriceCache {
    async fn compare_and_raise(
        &self,
        auction_id: i64,
        amount: i64,
    ) -> redis::RedisResult<Admission> {
        let mut conn = self.conn.clone();
        let (accepted, price): (i64, i64) = self
            .script
            .key(Self::price_key(auction_id))
            .arg(amount)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        if accepted == 1 {
            Ok(Admission::Accepted)
        } else {
            info!(
                "{:<12} --> 선행 거절: auction={}, amount={}, cached={}",
                "Admission", auction_id, amount, price
            );
            Ok(Admission::Rejected {
                cached_price: price,
            })
        }
    }

    async fn write_back(&self, auction_id: i64, price: i64) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        // TTL 덕에 반영이 한 번 누락돼도 스스로 복구된다
        conn.set_ex(Self::price_key(auction_id), price, self.ttl_secs)
            .await
    }

    async fn invalidate(&self, auction_id: i64) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.del(Self::price_key(auction_id)).await
    }
}
// endregion: --- Redis Price Cache

// endregion: --- Tests
