/// 위시리스트
/// 로그인하지 않은 경우 요청을 보내지 않고 로그인 안내만 표시한다.
// region:    --- Imports
use crate::api::MarketplaceApi;
use crate::auth::{Session, TokenProvider};
use crate::error::ClientError;
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Wishlist Service
pub struct WishlistService {
    api: Arc<dyn MarketplaceApi>,
    tokens: Arc<dyn TokenProvider>,
}

impl WishlistService {
    pub fn new(api: Arc<dyn MarketplaceApi>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { api, tokens }
    }

    /// 위시리스트 포함 여부
    pub async fn check(&self, product_id: i64) -> Result<bool, ClientError> {
        let session = Session::from_provider(self.tokens.as_ref())?;
        self.api.wishlist_contains(product_id, &session.user_id).await
    }

    /// 추가/삭제 토글, 변경 후 상태 반환
    pub async fn toggle(&self, product_id: i64, currently: bool) -> Result<bool, ClientError> {
        let session = Session::from_provider(self.tokens.as_ref())?;
        if currently {
            info!("{:<12} --> 위시리스트 삭제 id: {}", "Wishlist", product_id);
            self.api.wishlist_remove(product_id, &session.token).await?;
            Ok(false)
        } else {
            info!("{:<12} --> 위시리스트 추가 id: {}", "Wishlist", product_id);
            self.api.wishlist_add(product_id, &session.token).await?;
            Ok(true)
        }
    }
}

// endregion: --- Wishlist Service

// region:    --- Wishlist Card
/// 상품 카드의 위시리스트 표시 상태
#[derive(Debug, Clone, PartialEq)]
pub struct WishlistCard {
    pub product_id: i64,
    pub is_wishlisted: bool,
    pub message: Option<String>,
}

impl WishlistCard {
    pub fn new(product_id: i64) -> Self {
        Self {
            product_id,
            is_wishlisted: false,
            message: None,
        }
    }

    /// 로그인 상태일 때만 서버 값으로 갱신 (비로그인은 조용히 false 유지)
    pub async fn refresh(&mut self, service: &WishlistService) {
        match service.check(self.product_id).await {
            Ok(flag) => self.is_wishlisted = flag,
            Err(ClientError::AuthenticationRequired) => self.is_wishlisted = false,
            Err(e) => warn!("{:<12} --> 위시리스트 확인 실패: {}", "Wishlist", e),
        }
    }

    pub async fn toggle(&mut self, service: &WishlistService) {
        match service.toggle(self.product_id, self.is_wishlisted).await {
            Ok(flag) => {
                self.is_wishlisted = flag;
                self.message = Some(if flag {
                    "Added to wishlist".to_string()
                } else {
                    "Removed from wishlist".to_string()
                });
            }
            Err(e) => {
                warn!("{:<12} --> 위시리스트 변경 실패: {}", "Wishlist", e);
                self.message = Some(e.user_message());
            }
        }
    }

    pub fn dismiss(&mut self) {
        self.message = None;
    }
}

// endregion: --- Wishlist Card
