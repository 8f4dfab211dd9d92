// region:    --- Imports
use crate::format::format_currency;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Errors
/// 입찰 입력 검증 오류 (네트워크 호출 전에 검출)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Enter a bid amount")]
    Empty,
    #[error("'{0}' is not a valid amount")]
    InvalidNumber(String),
    #[error("Bid must be at least {} (entered {})", rupees(.minimum), rupees(.amount))]
    BelowMinimum { amount: f64, minimum: f64 },
    #[error("Auction Ended")]
    AuctionEnded,
}

/// 환경 설정 오류
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0} must contain at least one positive step")]
    EmptyLadder(&'static str),
}

/// 클라이언트 공통 오류
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Sign in required")]
    AuthenticationRequired,
    #[error("Request failed: {0}")]
    NetworkOrServer(String),
    #[error("Live feed connection lost: {0}")]
    ConnectionLost(String),
    #[error("Live feed already subscribed to product {0}")]
    AlreadyConnected(i64),
    #[error("Product {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// 화면에 표시할 메시지
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::AuthenticationRequired => "Sign in required".to_string(),
            Self::NetworkOrServer(message) => {
                format!("{message}. Please try again.")
            }
            Self::ConnectionLost(_) => "Connection issue, reconnecting…".to_string(),
            Self::AlreadyConnected(_) => "Live updates already active".to_string(),
            Self::NotFound(_) => "Product not found".to_string(),
            Self::Config(e) => e.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkOrServer(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::NetworkOrServer(format!("malformed response: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

fn rupees(amount: &f64) -> String {
    format_currency(*amount)
}
// endregion: --- Errors
