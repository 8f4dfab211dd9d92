/// 입찰 제출 흐름
/// 1. 입력 검증 (네트워크 호출 없음)
/// 2. 로그인 확인
/// 3. 입찰 요청 (동시에 하나만)
// region:    --- Imports
use super::model::{input_amount, quick_bid_amounts, validate_bid, BidForm, BidPhase};
use crate::api::{BidReceipt, BidRequest, MarketplaceApi};
use crate::auth::{Session, TokenProvider};
use crate::error::{ClientError, ValidationError};
use crate::format::format_currency;
use crate::lock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Commands
/// 입찰 시점의 경매 정보
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidContext {
    pub product_id: i64,
    pub highest_bid: f64,
    pub ended: bool,
}

/// 입찰 성공 알림
#[derive(Debug, Clone, PartialEq)]
pub struct BidPlaced {
    pub product_id: i64,
    pub amount: f64,
    pub receipt: BidReceipt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Placed(BidPlaced),
    // 이전 요청이 진행 중이라 무시됨
    AlreadySubmitting,
}

type SuccessCallback = Box<dyn Fn(&BidPlaced) + Send + Sync>;

/// 진행 중 플래그, drop 시 해제
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 입찰 모달과 제출 처리
pub struct BidSubmitter {
    api: Arc<dyn MarketplaceApi>,
    tokens: Arc<dyn TokenProvider>,
    min_increment: f64,
    ladder: Vec<f64>,
    form: Mutex<BidForm>,
    submitting: AtomicBool,
    on_success: Mutex<Option<SuccessCallback>>,
}

impl BidSubmitter {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        tokens: Arc<dyn TokenProvider>,
        min_increment: f64,
        ladder: Vec<f64>,
    ) -> Self {
        Self {
            api,
            tokens,
            min_increment,
            ladder,
            form: Mutex::new(BidForm::default()),
            submitting: AtomicBool::new(false),
            on_success: Mutex::new(None),
        }
    }

    /// 입찰 성공 시 호출할 콜백 등록
    pub fn set_on_success<F>(&self, callback: F)
    where
        F: Fn(&BidPlaced) + Send + Sync + 'static,
    {
        *lock(&self.on_success) = Some(Box::new(callback));
    }

    pub fn min_increment(&self) -> f64 {
        self.min_increment
    }

    pub fn form(&self) -> BidForm {
        lock(&self.form).clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn quick_bids(&self, highest: f64) -> Vec<f64> {
        quick_bid_amounts(highest, &self.ladder)
    }

    pub fn open_modal(&self) {
        let mut form = lock(&self.form);
        form.settle();
        form.open = true;
    }

    pub fn close_modal(&self) {
        let mut form = lock(&self.form);
        form.settle();
        form.open = false;
        form.error = None;
    }

    pub fn set_input(&self, input: impl Into<String>) {
        let mut form = lock(&self.form);
        form.settle();
        form.input = input.into();
    }

    pub fn dismiss_error(&self) {
        let mut form = lock(&self.form);
        form.settle();
        form.error = None;
    }

    /// 모달 초기화 (다른 경매로 이동 시)
    pub fn reset(&self) {
        lock(&self.form).reset();
    }

    /// 빠른 입찰: 입력값만 채우고 제출하지 않는다
    /// 종료된 경매에서는 동작하지 않는다.
    pub fn quick_bid(&self, step: usize, highest: f64, ended: bool) -> Option<f64> {
        if ended || self.is_submitting() {
            return None;
        }
        let amount = *self.quick_bids(highest).get(step)?;
        let mut form = lock(&self.form);
        form.settle();
        form.open = true;
        form.input = input_amount(amount);
        form.error = None;
        Some(amount)
    }

    /// 현재 입력값으로 입찰 제출
    pub async fn submit(&self, ctx: BidContext) -> Result<SubmitOutcome, ClientError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("{:<12} --> 진행 중인 입찰이 있어 무시", "Bid");
            return Ok(SubmitOutcome::AlreadySubmitting);
        }
        let _in_flight = InFlight(&self.submitting);

        let input = {
            let mut form = lock(&self.form);
            form.settle();
            form.phase = BidPhase::Validating;
            form.input.clone()
        };

        let amount = match self.validate(&input, ctx) {
            Ok(amount) => amount,
            Err(e) => {
                info!("{:<12} --> 입찰 검증 실패: {}", "Bid", e);
                self.fail(&ClientError::Validation(e.clone()));
                return Err(e.into());
            }
        };

        let session = match Session::from_provider(self.tokens.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        lock(&self.form).phase = BidPhase::Submitting;
        let request = BidRequest {
            product_id: ctx.product_id,
            bid_amount: amount,
        };
        info!(
            "{:<12} --> 입찰 제출: product={}, amount={}, user={}",
            "Bid", ctx.product_id, amount, session.user_id
        );

        match self.api.place_bid(&request, &session.token).await {
            Ok(receipt) => {
                {
                    let mut form = lock(&self.form);
                    form.input.clear();
                    form.open = false;
                    form.error = None;
                    form.phase = BidPhase::Succeeded;
                    form.notice = Some(
                        receipt
                            .message
                            .clone()
                            .unwrap_or_else(|| format!("Bid of {} placed", format_currency(amount))),
                    );
                }
                let placed = BidPlaced {
                    product_id: ctx.product_id,
                    amount,
                    receipt,
                };
                if let Some(callback) = lock(&self.on_success).as_ref() {
                    callback(&placed);
                }
                Ok(SubmitOutcome::Placed(placed))
            }
            Err(e) => {
                warn!("{:<12} --> 입찰 실패: {}", "Bid", e);
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn validate(&self, input: &str, ctx: BidContext) -> Result<f64, ValidationError> {
        if ctx.ended {
            return Err(ValidationError::AuctionEnded);
        }
        validate_bid(input, ctx.highest_bid, self.min_increment)
    }

    /// 실패 시 입력과 모달은 유지하고 메시지만 기록
    fn fail(&self, error: &ClientError) {
        let mut form = lock(&self.form);
        form.error = Some(error.user_message());
        form.notice = None;
        form.phase = BidPhase::Failed;
    }
}

// endregion: --- Commands

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::ProductDocument;
    use crate::auth::StaticTokenProvider;
    use async_trait::async_trait;
    use jsonwebtoken::{EncodingKey, Header};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// 입찰 호출 횟수를 세는 가짜 백엔드
    #[derive(Default)]
    struct CountingApi {
        bids: AtomicUsize,
        release: Option<Arc<Notify>>,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl MarketplaceApi for CountingApi {
        async fn fetch_product(&self, _id: i64) -> Result<Option<ProductDocument>, ClientError> {
            Ok(None)
        }
        async fn list_products(&self) -> Result<Vec<ProductDocument>, ClientError> {
            Ok(Vec::new())
        }
        async fn place_bid(&self, request: &BidRequest, _token: &str) -> Result<BidReceipt, ClientError> {
            self.bids.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.release {
                release.notified().await;
            }
            match &self.reject_with {
                Some(message) => Err(ClientError::NetworkOrServer(message.clone())),
                None => Ok(BidReceipt {
                    message: None,
                    current_price: Some(request.bid_amount),
                }),
            }
        }
        async fn wishlist_contains(&self, _id: i64, _user: &str) -> Result<bool, ClientError> {
            Ok(false)
        }
        async fn wishlist_add(&self, _id: i64, _token: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn wishlist_remove(&self, _id: i64, _token: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn signed_in() -> Arc<StaticTokenProvider> {
        let token = jsonwebtoken::encode(
            &Header::default(),
            &serde_json::json!({"id": 7}),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        Arc::new(StaticTokenProvider::new(Some(token)))
    }

    fn ctx(highest: f64) -> BidContext {
        BidContext {
            product_id: 1,
            highest_bid: highest,
            ended: false,
        }
    }

    fn submitter(api: Arc<CountingApi>, tokens: Arc<StaticTokenProvider>) -> BidSubmitter {
        BidSubmitter::new(api, tokens, 50.0, vec![50.0, 100.0])
    }

    #[tokio::test]
    async fn invalid_amounts_make_no_request() {
        let api = Arc::new(CountingApi::default());
        let bids = submitter(api.clone(), signed_in());
        bids.open_modal();

        for input in ["", "twelve", "1049"] {
            bids.set_input(input);
            let err = bids.submit(ctx(1000.0)).await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)));
        }

        assert_eq!(api.bids.load(Ordering::SeqCst), 0);
        let form = bids.form();
        assert!(form.open);
        assert_eq!(form.input, "1049");
        assert!(form.error.is_some());
        assert_eq!(form.phase, BidPhase::Failed);
    }

    #[tokio::test]
    async fn paise_quick_bid_passes_validation() {
        let api = Arc::new(CountingApi::default());
        let bids = submitter(api.clone(), signed_in());

        assert_eq!(bids.quick_bid(0, 4.23, false), Some(54.23));
        assert_eq!(bids.form().input, "54.23");

        let outcome = bids.submit(ctx(4.23)).await.unwrap();
        let SubmitOutcome::Placed(placed) = outcome else {
            panic!("expected placed bid, got {outcome:?}");
        };
        assert_eq!(placed.amount, 54.23);
        assert_eq!(api.bids.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exact_minimum_is_placed_and_clears_form() {
        let api = Arc::new(CountingApi::default());
        let bids = submitter(api.clone(), signed_in());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        bids.set_on_success(move |placed| {
            assert_eq!(placed.amount, 1050.0);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bids.open_modal();
        bids.set_input("1050");
        let outcome = bids.submit(ctx(1000.0)).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Placed(_)));
        assert_eq!(api.bids.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let form = bids.form();
        assert!(!form.open);
        assert!(form.input.is_empty());
        assert_eq!(form.phase, BidPhase::Succeeded);
    }

    #[tokio::test]
    async fn signed_out_user_is_asked_to_sign_in() {
        let api = Arc::new(CountingApi::default());
        let bids = submitter(api.clone(), Arc::new(StaticTokenProvider::signed_out()));
        bids.set_input("2000");

        let err = bids.submit(ctx(1000.0)).await.unwrap_err();
        assert_eq!(err, ClientError::AuthenticationRequired);
        assert_eq!(api.bids.load(Ordering::SeqCst), 0);
        assert_eq!(bids.form().error.as_deref(), Some("Sign in required"));
    }

    #[tokio::test]
    async fn server_rejection_keeps_input_for_retry() {
        let api = Arc::new(CountingApi {
            reject_with: Some("Auction closed".to_string()),
            ..Default::default()
        });
        let bids = submitter(api.clone(), signed_in());
        bids.open_modal();
        bids.set_input("1500");

        assert!(bids.submit(ctx(1000.0)).await.is_err());
        let form = bids.form();
        assert!(form.open);
        assert_eq!(form.input, "1500");
        assert_eq!(form.phase, BidPhase::Failed);

        bids.dismiss_error();
        let form = bids.form();
        assert_eq!(form.error, None);
        assert_eq!(form.phase, BidPhase::Idle);
    }

    #[tokio::test]
    async fn overlapping_submit_is_single_flight() {
        let release = Arc::new(Notify::new());
        let api = Arc::new(CountingApi {
            release: Some(Arc::clone(&release)),
            ..Default::default()
        });
        let bids = Arc::new(submitter(api.clone(), signed_in()));
        bids.set_input("1100");

        let first = {
            let bids = Arc::clone(&bids);
            tokio::spawn(async move { bids.submit(ctx(1000.0)).await })
        };
        while api.bids.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(bids.is_submitting());

        let second = bids.submit(ctx(1000.0)).await.unwrap();
        assert_eq!(second, SubmitOutcome::AlreadySubmitting);
        assert_eq!(bids.quick_bid(0, 1000.0, false), None);

        release.notify_one();
        assert!(matches!(first.await.unwrap(), Ok(SubmitOutcome::Placed(_))));
        assert_eq!(api.bids.load(Ordering::SeqCst), 1);
        assert!(!bids.is_submitting());
    }

    #[tokio::test]
    async fn quick_bid_fills_input_without_submitting() {
        let api = Arc::new(CountingApi::default());
        let bids = submitter(api.clone(), signed_in());

        assert_eq!(bids.quick_bid(1, 1000.0, false), Some(1100.0));
        assert_eq!(bids.form().input, "1100");
        assert_eq!(api.bids.load(Ordering::SeqCst), 0);

        assert_eq!(bids.quick_bid(0, 1000.0, true), None);
        assert_eq!(bids.quick_bid(9, 1000.0, false), None);

        let err = bids
            .submit(BidContext {
                ended: true,
                ..ctx(1000.0)
            })
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Validation(ValidationError::AuctionEnded));
        assert_eq!(api.bids.load(Ordering::SeqCst), 0);
    }
}
