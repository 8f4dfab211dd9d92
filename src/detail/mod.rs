/// 경매 상세 화면 세션
/// 초기 조회, 실시간 피드, 카운트다운, 입찰 모달을 하나로 묶는다.
/// 모든 비동기 완료는 시작 시점의 세대(generation) 번호를 들고 오며,
/// 다른 상품으로 이동했거나 세션이 닫힌 뒤 도착한 결과는 버린다.
// region:    --- Imports
use crate::api::MarketplaceApi;
use crate::auction::{Auction, ProductDocument};
use crate::auth::TokenProvider;
use crate::bidding::model::{minimum_bid, to_paise};
use crate::bidding::{BidContext, BidForm, BidPlaced, BidSubmitter, SubmitOutcome};
use crate::config::ClientConfig;
use crate::countdown::{Clock, Countdown, CountdownSnapshot, CountdownTimer};
use crate::error::ClientError;
use crate::feed::{FeedEvent, FeedStatus, FeedTransport, LiveFeedClient};
use crate::format::{format_currency, format_timestamp};
use crate::lock;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- View Model
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailState {
    #[default]
    Loading,
    Loaded,
    NotFound,
    Failed(String),
}

/// 입찰 직후 서버 확인 전까지 표시하는 임시 입찰
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBid {
    pub amount: f64,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BidLine {
    pub user_name: String,
    pub amount: String,
    pub at: Option<String>,
}

/// 화면에 그릴 상세 정보
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub product_id: Option<i64>,
    pub state: DetailState,
    pub title: String,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub current_bid: Option<f64>,
    pub current_bid_display: Option<String>,
    pub minimum_bid_display: Option<String>,
    pub retail_value_display: Option<String>,
    pub buy_now_display: Option<String>,
    pub live_url: Option<String>,
    pub countdown: Option<String>,
    pub ended: bool,
    pub bidding_enabled: bool,
    pub quick_bids: Vec<f64>,
    pub connection_banner: Option<String>,
    pub pending_bid: Option<String>,
    pub recent_bids: Vec<BidLine>,
    pub bid_form: BidForm,
}

// endregion: --- View Model

// region:    --- Session State
#[derive(Default)]
struct Page {
    generation: u64,
    product_id: Option<i64>,
    state: DetailState,
    document: Option<ProductDocument>,
    auction: Option<Auction>,
    countdown: Option<CountdownTimer>,
    pending: Option<PendingBid>,
    // 첫 스냅샷 수신 여부 (그 전의 피드 패치는 스냅샷보다 새 값)
    snapshot_loaded: bool,
    closed: bool,
}

struct SessionInner {
    api: Arc<dyn MarketplaceApi>,
    feed: LiveFeedClient,
    clock: Arc<dyn Clock>,
    bids: BidSubmitter,
    page: Mutex<Page>,
    changes: Arc<watch::Sender<u64>>,
}

// endregion: --- Session State

// region:    --- Auction Detail Session
/// 경매 상세 세션
/// drop 시 피드 구독을 해제한다.
pub struct AuctionDetailSession {
    inner: Arc<SessionInner>,
}

impl AuctionDetailSession {
    pub fn new(
        config: &ClientConfig,
        api: Arc<dyn MarketplaceApi>,
        transport: Arc<dyn FeedTransport>,
        tokens: Arc<dyn TokenProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        let inner = Arc::new(SessionInner {
            feed: LiveFeedClient::new(transport, config.reconnect_delay),
            bids: BidSubmitter::new(
                Arc::clone(&api),
                tokens,
                config.min_increment,
                config.quick_bid_steps.clone(),
            ),
            api,
            clock,
            page: Mutex::new(Page::default()),
            changes: Arc::new(changes),
        });

        let weak = Arc::downgrade(&inner);
        inner.bids.set_on_success(move |placed| {
            if let Some(inner) = weak.upgrade() {
                inner.on_bid_placed(placed);
            }
        });

        Self { inner }
    }

    /// 상품 상세 열기: 구독 후 초기 조회
    pub async fn open(&self, product_id: i64) -> Result<(), ClientError> {
        let generation = {
            let mut page = lock(&self.inner.page);
            let generation = page.generation + 1;
            *page = Page {
                generation,
                product_id: Some(product_id),
                ..Page::default()
            };
            generation
        };
        info!("{:<12} --> 상세 열기 id: {} (세대 {})", "Detail", product_id, generation);

        self.inner.bids.reset();
        self.inner.notify();
        SessionInner::subscribe(&self.inner, product_id, generation)?;
        SessionInner::load_snapshot(&self.inner, product_id, generation).await;
        Ok(())
    }

    /// 다른 상품으로 이동 (재구독, 카운트다운/입찰 모달 초기화)
    pub async fn navigate(&self, product_id: i64) -> Result<(), ClientError> {
        self.open(product_id).await
    }

    /// 세션 종료, 여러 번 호출해도 안전
    pub fn close(&self) {
        {
            let mut page = lock(&self.inner.page);
            if page.closed {
                return;
            }
            page.closed = true;
            page.generation += 1;
            page.countdown = None;
        }
        self.inner.feed.disconnect();
        self.inner.notify();
        info!("{:<12} --> 상세 닫기", "Detail");
    }

    pub fn state(&self) -> DetailState {
        lock(&self.inner.page).state.clone()
    }

    pub fn auction(&self) -> Option<Auction> {
        lock(&self.inner.page).auction.clone()
    }

    pub fn pending_bid(&self) -> Option<PendingBid> {
        lock(&self.inner.page).pending.clone()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.inner.feed.status()
    }

    /// 화면 갱신 알림 (값은 변경 횟수)
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    pub fn countdown(&self) -> Option<CountdownSnapshot> {
        let page = lock(&self.inner.page);
        let end = page.auction.as_ref()?.auction_end?;
        Some(Countdown::new(end).snapshot(self.inner.clock.now()))
    }

    pub fn view(&self) -> DetailView {
        let page = lock(&self.inner.page);
        let now = self.inner.clock.now();
        let form = self.inner.bids.form();
        let submitting = self.inner.bids.is_submitting();
        let feed = self.inner.feed.status();

        let auction = page.auction.as_ref();
        let ended = auction.map(|a| a.is_ended(now)).unwrap_or(false);
        let highest = auction.map(Auction::highest_bid);
        let bidding_enabled = page.state == DetailState::Loaded && !ended && !submitting;

        DetailView {
            product_id: page.product_id,
            state: page.state.clone(),
            title: auction.map(|a| a.name.clone()).unwrap_or_default(),
            images: auction.map(|a| a.images.clone()).unwrap_or_default(),
            category: auction.and_then(|a| a.category.clone()),
            condition: auction.and_then(|a| a.condition.clone()),
            location: auction.and_then(|a| a.location.clone()),
            current_bid: highest,
            current_bid_display: highest.map(format_currency),
            minimum_bid_display: highest
                .map(|h| format_currency(minimum_bid(h, self.inner.bids.min_increment()))),
            retail_value_display: auction.and_then(|a| a.retail_value).map(format_currency),
            buy_now_display: auction.and_then(|a| a.buy_now_price).map(format_currency),
            live_url: auction.and_then(|a| a.live_url.clone()),
            countdown: auction
                .and_then(|a| a.auction_end)
                .map(|end| Countdown::new(end).snapshot(now).display),
            ended,
            bidding_enabled,
            quick_bids: match highest {
                Some(h) if bidding_enabled => self.inner.bids.quick_bids(h),
                _ => Vec::new(),
            },
            connection_banner: feed
                .connection_error
                .then(|| ClientError::ConnectionLost(String::new()).user_message()),
            pending_bid: page
                .pending
                .as_ref()
                .map(|p| format!("{} (pending)", format_currency(p.amount))),
            recent_bids: auction
                .map(|a| {
                    a.recent_bids()
                        .into_iter()
                        .map(|b| BidLine {
                            user_name: b.user_name.clone(),
                            amount: format_currency(b.bid_amount),
                            at: b.bid_time.map(format_timestamp),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            bid_form: form,
        }
    }

    // region:    --- Bid Modal

    pub fn open_bid_modal(&self) {
        self.inner.bids.open_modal();
        self.inner.notify();
    }

    pub fn close_bid_modal(&self) {
        self.inner.bids.close_modal();
        self.inner.notify();
    }

    pub fn set_bid_input(&self, input: impl Into<String>) {
        self.inner.bids.set_input(input);
        self.inner.notify();
    }

    pub fn dismiss_bid_error(&self) {
        self.inner.bids.dismiss_error();
        self.inner.notify();
    }

    /// 빠른 입찰 금액을 입력란에 채움 (종료 후에는 무시)
    pub fn quick_bid(&self, step: usize) -> Option<f64> {
        let ctx = self.bid_context().ok()?;
        let amount = self.inner.bids.quick_bid(step, ctx.highest_bid, ctx.ended);
        self.inner.notify();
        amount
    }

    /// 입력된 금액으로 입찰
    pub async fn place_bid(&self) -> Result<SubmitOutcome, ClientError> {
        let ctx = self.bid_context()?;
        let result = self.inner.bids.submit(ctx).await;
        self.inner.notify();
        result
    }

    fn bid_context(&self) -> Result<BidContext, ClientError> {
        let page = lock(&self.inner.page);
        let product_id = page.product_id.unwrap_or_default();
        match (&page.state, page.auction.as_ref()) {
            (DetailState::Loaded, Some(auction)) => Ok(BidContext {
                product_id: auction.id,
                highest_bid: auction.highest_bid(),
                ended: auction.is_ended(self.inner.clock.now()),
            }),
            _ => Err(ClientError::NotFound(product_id)),
        }
    }

    // endregion: --- Bid Modal
}

impl Drop for AuctionDetailSession {
    fn drop(&mut self) {
        self.close();
    }
}

// endregion: --- Auction Detail Session

// region:    --- Session Internals
impl SessionInner {
    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    /// 기존 구독 해제 후 새 구독
    fn subscribe(this: &Arc<Self>, product_id: i64, generation: u64) -> Result<(), ClientError> {
        this.feed.disconnect();
        let weak: Weak<Self> = Arc::downgrade(this);
        this.feed.connect(product_id, move |event| {
            if let Some(inner) = weak.upgrade() {
                SessionInner::on_feed_event(&inner, generation, event);
            }
        })
    }

    /// 초기 조회 또는 재연결 후 전체 스냅샷 조회
    async fn load_snapshot(this: &Arc<Self>, product_id: i64, generation: u64) {
        let result = this.api.fetch_product(product_id).await;

        let mut page = lock(&this.page);
        if page.closed || page.generation != generation {
            debug!(
                "{:<12} --> 이전 세대 응답 무시 id: {} (세대 {})",
                "Detail", product_id, generation
            );
            return;
        }

        match result {
            Ok(Some(snapshot)) => {
                let merged = match (page.snapshot_loaded, page.document.take()) {
                    // 첫 스냅샷보다 먼저 도착한 패치는 스냅샷 위에 다시 적용
                    (false, Some(patches)) => {
                        let mut doc = snapshot;
                        doc.merge_patch(&patches);
                        doc
                    }
                    (true, Some(mut existing)) => {
                        existing.merge_patch(&snapshot);
                        existing
                    }
                    (_, None) => snapshot,
                };
                page.snapshot_loaded = true;
                this.apply_document(&mut page, merged);
            }
            Ok(None) => {
                if page.document.is_none() {
                    info!("{:<12} --> 상품 없음 id: {}", "Detail", product_id);
                    page.state = DetailState::NotFound;
                }
            }
            Err(e) => {
                warn!("{:<12} --> 상품 조회 실패 id: {}: {}", "Detail", product_id, e);
                if page.document.is_none() {
                    page.state = DetailState::Failed(e.user_message());
                }
            }
        }
        drop(page);
        this.notify();
    }

    fn on_feed_event(this: &Arc<Self>, generation: u64, event: FeedEvent) {
        let mut page = lock(&this.page);
        if page.closed || page.generation != generation {
            return;
        }
        let Some(product_id) = page.product_id else {
            return;
        };

        match event {
            FeedEvent::Update(patch) => {
                let mut doc = page.document.take().unwrap_or_else(|| {
                    let mut seed = Map::new();
                    seed.insert("id".to_string(), Value::from(product_id));
                    ProductDocument::new(seed)
                });
                doc.merge_patch(&patch);
                this.apply_document(&mut page, doc);
            }
            FeedEvent::ConnectionLost => {
                warn!("{:<12} --> 실시간 연결 끊김 id: {}", "Detail", product_id);
            }
            FeedEvent::Reconnected => {
                // 끊긴 동안 놓친 필드를 복구하기 위해 전체 스냅샷 재조회
                let inner = Arc::clone(this);
                tokio::spawn(async move {
                    SessionInner::load_snapshot(&inner, product_id, generation).await;
                });
            }
        }
        drop(page);
        this.notify();
    }

    /// 문서를 반영하고 파생 상태 갱신
    fn apply_document(&self, page: &mut Page, doc: ProductDocument) {
        let auction = Auction::from_document(&doc);
        page.document = Some(doc);

        let Some(auction) = auction else {
            return;
        };

        if let Some(pending) = &page.pending {
            if to_paise(auction.highest_bid()) >= to_paise(pending.amount) {
                debug!("{:<12} --> 임시 입찰 확인됨: {}", "Detail", pending.amount);
                page.pending = None;
            }
        }

        let end_changed = page
            .countdown
            .as_ref()
            .map(|timer| Some(timer.countdown().end()) != auction.auction_end)
            .unwrap_or(true);
        if end_changed {
            page.countdown = auction
                .auction_end
                .map(|end| self.start_countdown(end));
        }

        page.auction = Some(auction);
        page.state = DetailState::Loaded;
    }

    fn start_countdown(&self, end: DateTime<Utc>) -> CountdownTimer {
        let timer = CountdownTimer::start(end, Arc::clone(&self.clock));
        let mut ticks = timer.subscribe();
        let changes = Arc::clone(&self.changes);
        tokio::spawn(async move {
            while ticks.changed().await.is_ok() {
                changes.send_modify(|version| *version += 1);
            }
        });
        timer
    }

    /// 입찰 성공: 임시 입찰 기록 후 재구독해서 서버 상태를 기다린다
    fn on_bid_placed(self: Arc<Self>, placed: &BidPlaced) {
        let generation = {
            let mut page = lock(&self.page);
            if page.closed || page.product_id != Some(placed.product_id) {
                return;
            }
            page.pending = Some(PendingBid {
                amount: placed.amount,
                placed_at: self.clock.now(),
            });
            page.generation
        };

        info!(
            "{:<12} --> 입찰 성공, 재구독 id: {}",
            "Detail", placed.product_id
        );
        if let Err(e) = SessionInner::subscribe(&self, placed.product_id, generation) {
            warn!("{:<12} --> 재구독 실패: {}", "Detail", e);
        }
        self.notify();
    }
}

// endregion: --- Session Internals
