/// 실시간 방송 서비스
/// 프로세스가 로드밸런서 뒤에 여러 개 떠 있어도, A 프로세스에서 열린 구독
/// 연결이 B 프로세스에서 커밋된 입찰을 받아야 한다. 프로세스 간 신호 경로는
/// Redis pub/sub 채널 하나뿐이고, 연결 레지스트리는 프로세스별 메모리에만
/// 존재하며 절대 공유하지 않는다.
// region:    --- Imports
use crate::auction::events::AuctionUpdate;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

// endregion: --- Imports

/// 공유 pub/sub 채널 이름
pub const UPDATES_CHANNEL: &str = "auction:updates";

/// 구독자별 수신 버퍼 크기
const CHANNEL_CAPACITY: usize = 256;

// region:    --- Broadcast Hub
/// 프로세스 로컬 구독자 레지스트리: 경매 id -> broadcast 채널
pub struct BroadcastHub {
    channels: RwLock<HashMap<i64, broadcast::Sender<AuctionUpdate>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// 경매 하나에 대한 구독 등록
    pub fn subscribe(&self, auction_id: i64) -> broadcast::Receiver<AuctionUpdate> {
        let mut channels = self.channels.write().unwrap();
        let sender = channels
            .entry(auction_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// 로컬 구독자 전원에게 전달
    /// 느리거나 끊긴 구독자는 자기 수신측에서만 실패한다(broadcast 채널 의미론).
    pub fn deliver(&self, update: &AuctionUpdate) {
        let mut channels = self.channels.write().unwrap();
        if let Some(sender) = channels.get(&update.auction_id) {
            if sender.send(update.clone()).is_err() {
                // 남은 구독자가 없는 채널은 레지스트리에서 제거
                channels.remove(&update.auction_id);
            }
        }
    }

    /// 경매별 로컬 구독자 수
    pub fn subscriber_count(&self, auction_id: i64) -> usize {
        let channels = self.channels.read().unwrap();
        channels
            .get(&auction_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
// endregion: --- Broadcast Hub

// region:    --- Publisher
/// 상태 스냅샷을 공유 채널로 발행한다
#[derive(Clone)]
pub struct RedisBroadcaster {
    conn: ConnectionManager,
}

impl RedisBroadcaster {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    /// 커밋된 스냅샷 발행: 자기 프로세스를 포함한 모든 프로세스의
    /// 리스너가 수신해 로컬 구독자에게 전달한다
    pub async fn publish(&self, update: &AuctionUpdate) -> redis::RedisResult<()> {
        let payload = serde_json::to_string(update)
            .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "직렬화 실패", e.to_string())))?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(UPDATES_CHANNEL, payload).await?;
        debug!(
            "{:<12} --> 발행: auction={}, 수신 프로세스 {}",
            "Broadcast", update.auction_id, receivers
        );
        Ok(())
    }
}
// endregion: --- Publisher

// region:    --- Message Decoding
/// 채널 페이로드 해석
/// 중간 홉이 JSON 문자열을 한 겹 더 감싸는 경우가 있어, 문자열 래핑을
/// 벗겨가며 파싱한다. 끝내 해석에 실패하면 None (로그 후 폐기, 패닉 금지).
pub fn decode_update(payload: &str) -> Option<AuctionUpdate> {
    let mut current = payload.to_string();
    // 래핑 깊이 상한
    for _ in 0..4 {
        if let Ok(update) = serde_json::from_str::<AuctionUpdate>(&current) {
            return Some(update);
        }
        match serde_json::from_str::<String>(&current) {
            Ok(inner) => current = inner,
            Err(_) => return None,
        }
    }
    None
}
// endregion: --- Message Decoding

// region:    --- Listener
/// 프로세스당 하나 뜨는 수신 루프
/// 공유 채널을 구독해 도착한 메시지를 로컬 허브로 중계한다.
/// 접속이 끊기면 잠시 대기 후 재구독한다.
pub async fn run_listener(redis_url: String, hub: Arc<BroadcastHub>) {
    loop {
        match listen_once(&redis_url, &hub).await {
            Ok(()) => warn!("{:<12} --> pub/sub 스트림 종료, 재접속", "Broadcast"),
            Err(e) => error!("{:<12} --> pub/sub 수신 오류: {:?}", "Broadcast", e),
        }
        sleep(Duration::from_secs(1)).await;
    }
}

async fn listen_once(redis_url: &str, hub: &BroadcastHub) -> redis::RedisResult<()> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(UPDATES_CHANNEL).await?;
    info!(
        "{:<12} --> pub/sub 구독 시작: channel={}",
        "Broadcast", UPDATES_CHANNEL
    );

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let payload: String = match message.get_payload() {
            Ok(p) => p,
            Err(e) => {
                error!("{:<12} --> 페이로드 읽기 실패: {:?}", "Broadcast", e);
                continue;
            }
        };

        match decode_update(&payload) {
            Some(update) => {
                debug!(
                    "{:<12} --> 수신: auction={}, price={}",
                    "Broadcast", update.auction_id, update.current_price
                );
                hub.deliver(&update);
            }
            None => warn!(
                "{:<12} --> 해석 불가 페이로드 폐기: {}",
                "Broadcast", payload
            ),
        }
    }
    Ok(())
}
// endregion: --- Listener

// endregion: --- Tests
