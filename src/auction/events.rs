use super::model::ProductDocument;
use serde::Deserialize;
use serde_json::Value;

pub const PRODUCT_UPDATE: &str = "product_update";

/// 실시간 피드 메시지 봉투 { type, data? }
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    // 상품 상태 부분 갱신
    ProductUpdate(ProductDocument),
    // 그 외 메시지 (화면에서는 무시)
    Other { kind: String },
}

impl FeedMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if envelope.kind != PRODUCT_UPDATE {
            return Ok(Self::Other {
                kind: envelope.kind,
            });
        }
        // data가 객체가 아니면 빈 패치로 취급
        let patch = envelope
            .data
            .and_then(ProductDocument::from_value)
            .unwrap_or_default();
        Ok(Self::ProductUpdate(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_update_carries_patch() {
        let msg = FeedMessage::parse(r#"{"type":"product_update","data":{"bid_count":3}}"#).unwrap();
        let expected = ProductDocument::from_value(json!({"bid_count": 3})).unwrap();
        assert_eq!(msg, FeedMessage::ProductUpdate(expected));
    }

    #[test]
    fn other_kinds_are_tagged() {
        let msg = FeedMessage::parse(r#"{"type":"viewer_count","data":{"n":4}}"#).unwrap();
        assert_eq!(
            msg,
            FeedMessage::Other {
                kind: "viewer_count".to_string()
            }
        );
        assert!(FeedMessage::parse("not json").is_err());
    }
}
