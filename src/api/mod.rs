/// 백엔드 REST 서비스 래퍼
/// 1. 상품 조회
/// 2. 입찰
/// 3. 위시리스트
// region:    --- Imports
use crate::auction::ProductDocument;
use crate::config::ClientConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Requests
/// 입찰 요청
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    pub product_id: i64,
    pub bid_amount: f64,
}

/// 입찰 응답
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BidReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WishlistStatus {
    wishlisted: bool,
}

// endregion: --- Requests

// region:    --- Marketplace Api Trait
/// 마켓플레이스 백엔드 트레이트
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// 상품 조회, 없으면 None
    async fn fetch_product(&self, product_id: i64) -> Result<Option<ProductDocument>, ClientError>;
    async fn list_products(&self) -> Result<Vec<ProductDocument>, ClientError>;
    async fn place_bid(&self, request: &BidRequest, token: &str) -> Result<BidReceipt, ClientError>;
    async fn wishlist_contains(&self, product_id: i64, user_id: &str) -> Result<bool, ClientError>;
    async fn wishlist_add(&self, product_id: i64, token: &str) -> Result<(), ClientError>;
    async fn wishlist_remove(&self, product_id: i64, token: &str) -> Result<(), ClientError>;
}

// endregion: --- Marketplace Api Trait

// region:    --- Http Marketplace Api
/// reqwest 기반 구현체
#[derive(Clone)]
pub struct HttpMarketplaceApi {
    client: Client,
    base_url: String,
}

impl HttpMarketplaceApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceApi {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<ProductDocument>, ClientError> {
        info!("{:<12} --> 상품 조회 id: {}", "Api", product_id);
        let response = self
            .client
            .get(self.url(&format!("/products/{product_id}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = ensure_success(response).await?.json().await?;
        // 일부 응답은 { data: {...} } 형태로 감싸져 온다
        let body = match body {
            Value::Object(mut fields) if fields.contains_key("data") && !fields.contains_key("id") => {
                fields.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(ProductDocument::from_value(body).filter(|doc| !doc.is_empty()))
    }

    async fn list_products(&self) -> Result<Vec<ProductDocument>, ClientError> {
        info!("{:<12} --> 상품 목록 조회", "Api");
        let response = self.client.get(self.url("/products")).send().await?;
        let body: Value = ensure_success(response).await?.json().await?;
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut fields) => match fields.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(items.into_iter().filter_map(ProductDocument::from_value).collect())
    }

    async fn place_bid(&self, request: &BidRequest, token: &str) -> Result<BidReceipt, ClientError> {
        info!("{:<12} --> 입찰 요청: {:?}", "Api", request);
        let response = self
            .client
            .post(self.url("/bids"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthenticationRequired);
        }
        let receipt = ensure_success(response).await?.json::<BidReceipt>().await?;
        Ok(receipt)
    }

    async fn wishlist_contains(&self, product_id: i64, user_id: &str) -> Result<bool, ClientError> {
        info!("{:<12} --> 위시리스트 확인 id: {}", "Api", product_id);
        let response = self
            .client
            .get(self.url("/wishlist/check"))
            .query(&[("product_id", product_id.to_string()), ("user_id", user_id.to_string())])
            .send()
            .await?;
        let status: WishlistStatus = ensure_success(response).await?.json().await?;
        Ok(status.wishlisted)
    }

    async fn wishlist_add(&self, product_id: i64, token: &str) -> Result<(), ClientError> {
        info!("{:<12} --> 위시리스트 추가 id: {}", "Api", product_id);
        let response = self
            .client
            .post(self.url("/wishlist"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "product_id": product_id }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn wishlist_remove(&self, product_id: i64, token: &str) -> Result<(), ClientError> {
        info!("{:<12} --> 위시리스트 삭제 id: {}", "Api", product_id);
        let response = self
            .client
            .delete(self.url(&format!("/wishlist/{product_id}")))
            .bearer_auth(token)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// 2xx가 아니면 서버 메시지를 담아 오류로 변환
async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("server responded with {status}"));

    warn!("{:<12} --> 요청 실패: status={}, message={}", "Api", status, message);
    Err(ClientError::NetworkOrServer(message))
}

// endregion: --- Http Marketplace Api
