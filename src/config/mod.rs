/// 클라이언트 환경 설정
/// 서버 주소, 입찰 단위, 재연결 간격 등을 환경 변수에서 읽는다.
// region:    --- Imports
use crate::error::ConfigError;
use std::time::Duration;
use tracing::info;

// endregion: --- Imports

// region:    --- Client Config
pub const API_URL_VAR: &str = "AUCTION_API_URL";
pub const FEED_URL_VAR: &str = "AUCTION_FEED_URL";
pub const MIN_INCREMENT_VAR: &str = "AUCTION_MIN_INCREMENT";
pub const QUICK_BIDS_VAR: &str = "AUCTION_QUICK_BIDS";
pub const REQUEST_TIMEOUT_VAR: &str = "AUCTION_REQUEST_TIMEOUT_SECS";
pub const RECONNECT_DELAY_VAR: &str = "AUCTION_RECONNECT_DELAY_MS";
pub const TOKEN_VAR: &str = "AUCTION_TOKEN";

/// 클라이언트 설정
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub feed_url: String,
    pub min_increment: f64,
    pub quick_bid_steps: Vec<f64>,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            feed_url: "ws://localhost:3000".to_string(),
            min_increment: 50.0,
            quick_bid_steps: vec![50.0, 100.0, 200.0, 500.0],
            request_timeout: Duration::from_secs(15),
            reconnect_delay: Duration::from_millis(2000),
            token: None,
        }
    }
}

/// ClientConfig 구현
impl ClientConfig {
    /// 환경 변수에서 설정 생성
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 변수 조회 함수로부터 설정 생성 (테스트에서 환경 변수 없이 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup(API_URL_VAR).unwrap_or(defaults.api_url);
        let feed_url = lookup(FEED_URL_VAR).unwrap_or(defaults.feed_url);

        let min_increment = match lookup(MIN_INCREMENT_VAR) {
            Some(raw) => parse_positive(MIN_INCREMENT_VAR, &raw)?,
            None => defaults.min_increment,
        };

        let quick_bid_steps = match lookup(QUICK_BIDS_VAR) {
            Some(raw) => parse_ladder(&raw)?,
            None => defaults.quick_bid_steps,
        };

        let request_timeout = match lookup(REQUEST_TIMEOUT_VAR) {
            Some(raw) => Duration::from_secs(parse_integer(REQUEST_TIMEOUT_VAR, &raw)?),
            None => defaults.request_timeout,
        };

        let reconnect_delay = match lookup(RECONNECT_DELAY_VAR) {
            Some(raw) => Duration::from_millis(parse_integer(RECONNECT_DELAY_VAR, &raw)?),
            None => defaults.reconnect_delay,
        };

        let token = lookup(TOKEN_VAR).filter(|t| !t.trim().is_empty());

        let config = Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            feed_url: feed_url.trim_end_matches('/').to_string(),
            min_increment,
            quick_bid_steps,
            request_timeout,
            reconnect_delay,
            token,
        };
        info!(
            "{:<12} --> 설정 로드: api={}, feed={}, 최소 입찰 단위={}",
            "Config", config.api_url, config.feed_url, config.min_increment
        );
        Ok(config)
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        }),
    }
}

fn parse_integer(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

/// 빠른 입찰 단계 파싱 ("50,100,200")
fn parse_ladder(raw: &str) -> Result<Vec<f64>, ConfigError> {
    let steps = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_positive(QUICK_BIDS_VAR, s))
        .collect::<Result<Vec<_>, _>>()?;

    if steps.is_empty() {
        return Err(ConfigError::EmptyLadder(QUICK_BIDS_VAR));
    }
    Ok(steps)
}

// endregion: --- Client Config

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn reads_overrides_and_trims_urls() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (API_URL_VAR, "http://api.local/"),
            (MIN_INCREMENT_VAR, "25"),
            (QUICK_BIDS_VAR, "25, 75 ,300"),
            (RECONNECT_DELAY_VAR, "10"),
            (TOKEN_VAR, "abc"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://api.local");
        assert_eq!(config.min_increment, 25.0);
        assert_eq!(config.quick_bid_steps, vec![25.0, 75.0, 300.0]);
        assert_eq!(config.reconnect_delay, Duration::from_millis(10));
        assert_eq!(config.token.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = ClientConfig::from_lookup(lookup_from(&[(MIN_INCREMENT_VAR, "-5")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == MIN_INCREMENT_VAR));

        let err = ClientConfig::from_lookup(lookup_from(&[(QUICK_BIDS_VAR, " , ")])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyLadder(QUICK_BIDS_VAR));
    }
}
