/// 환경 변수 기반 설정
/// 연장(overtime) 관련 값은 도메인 상수가 아니라 운영 설정이므로 전부 환경 변수로 노출한다.
// region:    --- Imports
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Config
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres 접속 URL (필수)
    pub database_url: String,
    /// Redis 접속 URL
    pub redis_url: String,
    /// 웹 서버 바인드 주소
    pub bind_addr: String,
    /// 마감 직전 입찰로 연장이 시작되는 구간(초)
    pub overtime_window_secs: i64,
    /// 연장 시 늘어나는 시간(초)
    pub overtime_extension_secs: i64,
    /// 경매 상태 스케줄러 주기(초)
    pub scheduler_interval_secs: u64,
    /// 가격 캐시 TTL(초)
    pub price_cache_ttl_secs: u64,
    /// 행 잠금 대기 제한(밀리초)
    pub lock_timeout_ms: u64,
    /// 실시간 스트림 유휴 타임아웃(초)
    pub stream_idle_timeout_secs: u64,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn load() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:3000"),
            overtime_window_secs: try_load("OVERTIME_WINDOW_SECS", "60"),
            overtime_extension_secs: try_load("OVERTIME_EXTENSION_SECS", "120"),
            scheduler_interval_secs: try_load("SCHEDULER_INTERVAL_SECS", "2"),
            price_cache_ttl_secs: try_load("PRICE_CACHE_TTL_SECS", "600"),
            lock_timeout_ms: try_load("LOCK_TIMEOUT_MS", "3000"),
            stream_idle_timeout_secs: try_load("STREAM_IDLE_TIMEOUT_SECS", "1800"),
        }
    }
}

/// 환경 변수 조회, 없으면 기본값 사용
fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{:<12} --> {} 미설정, 기본값 사용: {}", "Config", key, default);
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("{:<12} --> {} 값이 올바르지 않음: {}", "Config", key, e);
        })
        .expect("환경 변수 설정 오류")
}
// endregion: --- Config

// endregion: --- Tests
