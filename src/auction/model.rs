// region:    --- Imports
use crate::format::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

// endregion: --- Imports

// region:    --- Product Document
/// 패치 값이 null이어도 덮어쓰지 않는 필드
const GUARDED_FIELDS: [&str; 2] = ["id", "name"];

/// 서버에서 받은 상품 JSON 원본
/// 초기 조회 결과에 실시간 패치를 얕게 병합해 유지한다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductDocument(pub Map<String, Value>);

impl ProductDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// JSON 값이 객체일 때만 문서로 변환
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// 문서에 담긴 상품 id (숫자 문자열 허용)
    pub fn product_id(&self) -> Option<i64> {
        self.get("id").and_then(number).map(|id| id as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 얕은 병합: 패치에 있는 필드만 교체하고 나머지는 유지
    pub fn merge_patch(&mut self, patch: &ProductDocument) {
        for (key, value) in &patch.0 {
            if value.is_null() && GUARDED_FIELDS.contains(&key.as_str()) {
                debug!("{:<12} --> 보호 필드 null 패치 무시: {}", "Merge", key);
                continue;
            }
            self.0.insert(key.clone(), value.clone());
        }
    }
}

// endregion: --- Product Document

// region:    --- Auction Model
/// 입찰 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub user_name: String,
    pub bid_amount: f64,
    pub bid_time: Option<DateTime<Utc>>,
}

/// 경매 상품
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub name: String,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub starting_price: f64,
    pub retail_value: Option<f64>,
    pub quantity: Option<i64>,
    pub auction_start: Option<DateTime<Utc>>,
    pub auction_end: Option<DateTime<Utc>>,
    pub buy_now_price: Option<f64>,
    pub live_url: Option<String>,
    pub bids: Vec<Bid>,
}

impl Auction {
    /// 문서에서 경매 상품 구성, id가 없으면 None
    pub fn from_document(doc: &ProductDocument) -> Option<Self> {
        let id = doc.product_id()?;

        let images = doc
            .get("image_path")
            .map(|v| match v {
                Value::Array(items) => items.iter().filter_map(text).collect(),
                other => text(other)
                    .map(|paths| split_paths(&paths))
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let buy_now_price = if doc.get("buy_option").map(truthy).unwrap_or(false) {
            doc.get("sale_price").and_then(number)
        } else {
            None
        };

        let bids = match doc.get("bids") {
            Some(Value::Array(items)) => items.iter().filter_map(parse_bid).collect(),
            _ => Vec::new(),
        };

        Some(Self {
            id,
            name: doc.get("name").and_then(text).unwrap_or_default(),
            images,
            category: doc.get("category").and_then(text),
            condition: doc.get("condition").and_then(text),
            location: doc.get("location").and_then(text),
            starting_price: doc.get("starting_price").and_then(number).unwrap_or(0.0),
            retail_value: doc.get("retail_value").and_then(number),
            quantity: doc.get("quantity").and_then(number).map(|q| q as i64),
            auction_start: doc.get("auction_start").and_then(timestamp),
            auction_end: doc.get("auction_end").and_then(timestamp),
            buy_now_price,
            live_url: doc.get("product_live_url").and_then(text),
            bids,
        })
    }

    /// 현재 최고 입찰가, 입찰이 없으면 시작가
    pub fn highest_bid(&self) -> f64 {
        self.bids
            .iter()
            .map(|b| b.bid_amount)
            .fold(None, |max: Option<f64>, amount| match max {
                Some(m) if m >= amount => Some(m),
                _ => Some(amount),
            })
            .unwrap_or(self.starting_price)
    }

    /// 경매 종료 여부 (종료 시각이 없으면 진행 중으로 본다)
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.auction_end.map(|end| now >= end).unwrap_or(false)
    }

    /// 최신순 입찰 기록
    pub fn recent_bids(&self) -> Vec<&Bid> {
        let mut bids: Vec<&Bid> = self.bids.iter().collect();
        bids.sort_by(|a, b| b.bid_time.cmp(&a.bid_time));
        bids
    }
}

fn parse_bid(value: &Value) -> Option<Bid> {
    let fields = value.as_object()?;
    Some(Bid {
        user_name: fields
            .get("user_name")
            .and_then(text)
            .unwrap_or_else(|| "Anonymous".to_string()),
        bid_amount: fields.get("bid_amount").and_then(number)?,
        bid_time: fields.get("bid_time").and_then(timestamp),
    })
}

fn split_paths(paths: &str) -> Vec<String> {
    paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// 숫자 또는 숫자 문자열
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

// endregion: --- Auction Model

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn doc(value: Value) -> ProductDocument {
        ProductDocument::from_value(value).unwrap()
    }

    #[test]
    fn patch_keeps_fields_it_does_not_carry() {
        let mut state = doc(json!({"id": 1, "name": "X", "bid": 10}));
        state.merge_patch(&doc(json!({"bid": 20})));
        assert_eq!(state, doc(json!({"id": 1, "name": "X", "bid": 20})));
    }

    #[test]
    fn patch_never_nulls_id_or_name() {
        let mut state = doc(json!({"id": 1, "name": "X", "bid": 10}));
        state.merge_patch(&doc(json!({"id": null, "name": null, "bid": 20})));
        assert_eq!(state, doc(json!({"id": 1, "name": "X", "bid": 20})));
    }

    #[test]
    fn auction_from_rest_record() {
        let auction = Auction::from_document(&doc(json!({
            "id": "7",
            "name": "Vintage Camera",
            "image_path": "a.jpg, b.jpg,,c.jpg",
            "starting_price": "1000",
            "retail_value": 4500,
            "quantity": 1,
            "auction_end": "2026-10-17T12:00:00Z",
            "buy_option": 1,
            "sale_price": "3000",
            "product_live_url": "https://live.example/7",
            "bids": [
                {"user_name": "asha", "bid_amount": 1200, "bid_time": "2026-10-16T10:00:00Z"},
                {"user_name": "ravi", "bid_amount": "1500", "bid_time": "2026-10-16T11:00:00Z"}
            ]
        })))
        .unwrap();

        assert_eq!(auction.id, 7);
        assert_eq!(auction.images, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(auction.buy_now_price, Some(3000.0));
        assert_eq!(auction.highest_bid(), 1500.0);
        assert_eq!(auction.recent_bids()[0].user_name, "ravi");
        assert_eq!(
            auction.auction_end,
            Some(Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn highest_bid_falls_back_to_starting_price() {
        let auction =
            Auction::from_document(&doc(json!({"id": 1, "starting_price": 800, "bids": []}))).unwrap();
        assert_eq!(auction.highest_bid(), 800.0);
        assert_eq!(auction.buy_now_price, None);
        assert!(!auction.is_ended(Utc::now()));
    }

    #[test]
    fn document_without_id_is_not_an_auction() {
        assert!(Auction::from_document(&doc(json!({"name": "X"}))).is_none());
    }
}
