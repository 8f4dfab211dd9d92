/// 실시간 경매 피드 클라이언트
/// 상품 하나에 대한 구독을 유지하며 product_update 메시지를 콜백으로 전달한다.
/// 상태 전이: Disconnected -> Connecting -> Connected
/// 구독 중에 connect()를 다시 호출하면 거부한다. 먼저 disconnect()가 필요하다.
// region:    --- Imports
use crate::auction::{FeedMessage, ProductDocument};
use crate::error::ClientError;
use crate::lock;
use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Feed Transport
/// 텍스트 프레임 스트림
pub type FeedStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// 피드 채널 트레이트
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn open(&self, subject_id: i64) -> Result<FeedStream, ClientError>;
}

/// 웹소켓 채널 구현체
#[derive(Debug, Clone)]
pub struct WsFeedTransport {
    base_url: String,
}

impl WsFeedTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, subject_id: i64) -> String {
        format!("{}/ws/products/{}", self.base_url, subject_id)
    }
}

#[async_trait]
impl FeedTransport for WsFeedTransport {
    async fn open(&self, subject_id: i64) -> Result<FeedStream, ClientError> {
        let url = self.url_for(subject_id);
        info!("{:<12} --> 웹소켓 연결: {}", "Feed", url);
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::ConnectionLost(e.to_string()))?;

        let frames = ws_stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!("{:<12} --> 연결 종료 프레임: {:?}", "Feed", frame);
                    None
                }
                // ping/pong 응답은 tungstenite가 처리
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::ConnectionLost(e.to_string()))),
            }
        });
        Ok(Box::pin(frames))
    }
}

// endregion: --- Feed Transport

// region:    --- Feed State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// 구독 상태 (연결 오류 배너 표시에 사용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedStatus {
    pub state: FeedState,
    pub subject_id: Option<i64>,
    pub connection_error: bool,
}

/// 콜백으로 전달되는 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Update(ProductDocument),
    ConnectionLost,
    Reconnected,
}

type EventCallback = Box<dyn Fn(FeedEvent) + Send + Sync>;

struct Subscription {
    subject_id: i64,
    cancel: CancellationToken,
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

// endregion: --- Feed State

// region:    --- Live Feed Client
/// 실시간 피드 클라이언트
/// 콜백 안에서 같은 클라이언트의 connect()/disconnect()를 호출하면 안 된다.
pub struct LiveFeedClient {
    transport: Arc<dyn FeedTransport>,
    reconnect_delay: Duration,
    status: Arc<watch::Sender<FeedStatus>>,
    subscription: Mutex<Option<Subscription>>,
}

impl LiveFeedClient {
    pub fn new(transport: Arc<dyn FeedTransport>, reconnect_delay: Duration) -> Self {
        let (status, _) = watch::channel(FeedStatus::default());
        Self {
            transport,
            reconnect_delay,
            status: Arc::new(status),
            subscription: Mutex::new(None),
        }
    }

    /// 구독 시작
    pub fn connect<F>(&self, subject_id: i64, on_event: F) -> Result<(), ClientError>
    where
        F: Fn(FeedEvent) + Send + Sync + 'static,
    {
        let mut slot = lock(&self.subscription);
        if let Some(active) = slot.as_ref() {
            warn!(
                "{:<12} --> 이미 구독 중: 현재 id={}, 요청 id={}",
                "Feed", active.subject_id, subject_id
            );
            return Err(ClientError::AlreadyConnected(active.subject_id));
        }

        self.status.send_replace(FeedStatus {
            state: FeedState::Connecting,
            subject_id: Some(subject_id),
            connection_error: false,
        });

        let cancel = CancellationToken::new();
        let gate = Arc::new(Mutex::new(true));
        let pump = FeedPump {
            subject_id,
            transport: Arc::clone(&self.transport),
            reconnect_delay: self.reconnect_delay,
            status: Arc::clone(&self.status),
            gate: Arc::clone(&gate),
            cancel: cancel.clone(),
            on_event: Box::new(on_event),
        };
        let task = tokio::spawn(pump.run());

        info!("{:<12} --> 구독 시작 id: {}", "Feed", subject_id);
        *slot = Some(Subscription {
            subject_id,
            cancel,
            gate,
            task,
        });
        Ok(())
    }

    /// 구독 해제 (구독이 없어도 안전)
    /// 반환 이후에는 콜백이 호출되지 않는다.
    pub fn disconnect(&self) {
        let Some(subscription) = lock(&self.subscription).take() else {
            debug!("{:<12} --> 해제할 구독 없음", "Feed");
            return;
        };

        subscription.cancel.cancel();
        *lock(&subscription.gate) = false;
        subscription.task.abort();
        self.status.send_replace(FeedStatus::default());
        info!("{:<12} --> 구독 해제 id: {}", "Feed", subscription.subject_id);
    }

    pub fn status(&self) -> FeedStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> FeedState {
        self.status().state
    }

    pub fn connection_error(&self) -> bool {
        self.status().connection_error
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }
}

impl Drop for LiveFeedClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// endregion: --- Live Feed Client

// region:    --- Feed Pump
/// 구독 하나를 담당하는 수신 루프
struct FeedPump {
    subject_id: i64,
    transport: Arc<dyn FeedTransport>,
    reconnect_delay: Duration,
    status: Arc<watch::Sender<FeedStatus>>,
    gate: Arc<Mutex<bool>>,
    cancel: CancellationToken,
    on_event: EventCallback,
}

impl FeedPump {
    async fn run(self) {
        let mut lost = false;
        loop {
            let opened = tokio::select! {
                _ = self.cancel.cancelled() => return,
                opened = self.transport.open(self.subject_id) => opened,
            };

            match opened {
                Ok(mut stream) => {
                    self.while_active(|status| {
                        status.send_modify(|s| {
                            s.state = FeedState::Connected;
                            s.connection_error = false;
                        });
                    });
                    if lost {
                        info!("{:<12} --> 재연결 성공 id: {}", "Feed", self.subject_id);
                        self.deliver(FeedEvent::Reconnected);
                        lost = false;
                    }

                    loop {
                        let next = tokio::select! {
                            _ = self.cancel.cancelled() => return,
                            next = stream.next() => next,
                        };
                        match next {
                            Some(Ok(text)) => self.handle_text(&text),
                            Some(Err(e)) => {
                                warn!("{:<12} --> 수신 오류: {}", "Feed", e);
                                break;
                            }
                            None => {
                                warn!("{:<12} --> 서버가 연결을 종료함", "Feed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("{:<12} --> 연결 실패 id: {}: {}", "Feed", self.subject_id, e),
            }

            if !lost {
                lost = true;
                self.while_active(|status| {
                    status.send_modify(|s| {
                        s.state = FeedState::Connecting;
                        s.connection_error = true;
                    });
                });
                self.deliver(FeedEvent::ConnectionLost);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
            debug!("{:<12} --> 재연결 시도 id: {}", "Feed", self.subject_id);
        }
    }

    fn handle_text(&self, text: &str) {
        match FeedMessage::parse(text) {
            Ok(FeedMessage::ProductUpdate(patch)) => match patch.product_id() {
                Some(id) if id != self.subject_id => {
                    debug!(
                        "{:<12} --> 다른 상품 업데이트 무시 id: {} (구독 {})",
                        "Feed", id, self.subject_id
                    );
                }
                _ => {
                    debug!("{:<12} --> product_update 수신 id: {}", "Feed", self.subject_id);
                    self.deliver(FeedEvent::Update(patch));
                }
            },
            Ok(FeedMessage::Other { kind }) => {
                debug!("{:<12} --> 무시하는 메시지: {}", "Feed", kind);
            }
            Err(e) => warn!("{:<12} --> 메시지 파싱 실패: {}", "Feed", e),
        }
    }

    /// 구독이 유효할 때만 콜백 호출
    fn deliver(&self, event: FeedEvent) {
        let active = lock(&self.gate);
        if *active {
            (self.on_event)(event);
        }
    }

    fn while_active(&self, f: impl FnOnce(&watch::Sender<FeedStatus>)) {
        let active = lock(&self.gate);
        if *active {
            f(&self.status);
        }
    }
}

// endregion: --- Feed Pump
