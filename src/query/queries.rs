/// 진행 중 경매 조회 (상품 포함)
pub const GET_ONGOING_AUCTION: &str = r#"
    SELECT a.id, a.status, a.current_price, a.winner_id, a.start_time, a.regular_end_time,
           a.overtime_started, a.created_at, i.name AS item_name, i.description AS item_description
    FROM auctions a
    JOIN auction_items i ON i.auction_id = a.id
    WHERE a.status = 'ACTIVE'
    ORDER BY a.start_time ASC
    LIMIT 1
"#;

/// 예정된 경매 목록 조회 (상품 포함)
pub const GET_SCHEDULED_AUCTIONS: &str = r#"
    SELECT a.id, a.status, a.current_price, a.winner_id, a.start_time, a.regular_end_time,
           a.overtime_started, a.created_at, i.name AS item_name, i.description AS item_description
    FROM auctions a
    JOIN auction_items i ON i.auction_id = a.id
    WHERE a.status = 'SCHEDULED'
    ORDER BY a.start_time ASC
"#;

/// 경매 단건 조회 (상품 포함)
pub const GET_AUCTION: &str = r#"
    SELECT a.id, a.status, a.current_price, a.winner_id, a.start_time, a.regular_end_time,
           a.overtime_started, a.created_at, i.name AS item_name, i.description AS item_description
    FROM auctions a
    JOIN auction_items i ON i.auction_id = a.id
    WHERE a.id = $1
"#;

/// 입찰 이력 조회: 높은 가격 우선, 동가는 먼저 넣은 쪽 우선
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, auction_id, bidder_id, amount, placed_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY amount DESC, placed_at ASC
"#;
