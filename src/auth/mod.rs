/// 인증 토큰 및 세션
/// 저장된 토큰(쿠키)을 로컬에서 디코딩해 사용자 id를 얻는다.
/// 서명은 클라이언트에서 검증할 수 없으므로 서버가 최종 판단한다.
// region:    --- Imports
use crate::error::ClientError;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

// endregion: --- Imports

// region:    --- Token Provider
pub const TOKEN_COOKIE: &str = "token";

/// 토큰 공급자 (테스트에서는 가짜 구현 주입)
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// 고정 토큰 공급자
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Cookie 헤더 문자열에서 토큰을 꺼내는 공급자
#[derive(Debug, Clone)]
pub struct CookieTokenProvider {
    cookie_header: String,
}

impl CookieTokenProvider {
    pub fn new(cookie_header: impl Into<String>) -> Self {
        Self {
            cookie_header: cookie_header.into(),
        }
    }
}

impl TokenProvider for CookieTokenProvider {
    fn token(&self) -> Option<String> {
        self.cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == TOKEN_COOKIE)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

// endregion: --- Token Provider

// region:    --- Session
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    exp: Option<i64>,
}

/// 로그인 세션
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

impl Session {
    /// 공급자의 토큰으로 세션 구성, 없거나 무효하면 로그인 필요
    pub fn from_provider(provider: &dyn TokenProvider) -> Result<Self, ClientError> {
        let token = provider.token().ok_or(ClientError::AuthenticationRequired)?;
        Self::from_token(token)
    }

    pub fn from_token(token: String) -> Result<Self, ClientError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = jsonwebtoken::decode::<Claims>(&token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| {
                warn!("{:<12} --> 토큰 디코딩 실패: {}", "Auth", e);
                ClientError::AuthenticationRequired
            })?
            .claims;

        if let Some(exp) = claims.exp {
            if exp <= Utc::now().timestamp() {
                warn!("{:<12} --> 만료된 토큰", "Auth");
                return Err(ClientError::AuthenticationRequired);
            }
        }

        let user_id = [claims.id, claims.user_id, claims.sub]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or(ClientError::AuthenticationRequired)?;

        debug!("{:<12} --> 세션 확인: user_id={}", "Auth", user_id);
        Ok(Self { user_id, token })
    }
}

// endregion: --- Session

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    fn token_for(claims: Value) -> String {
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap()
    }

    #[test]
    fn reads_user_id_from_token() {
        let token = token_for(json!({"id": 42, "exp": Utc::now().timestamp() + 3600}));
        let session = Session::from_provider(&StaticTokenProvider::new(Some(token))).unwrap();
        assert_eq!(session.user_id, "42");
    }

    #[test]
    fn missing_or_expired_token_requires_sign_in() {
        let err = Session::from_provider(&StaticTokenProvider::signed_out()).unwrap_err();
        assert_eq!(err, ClientError::AuthenticationRequired);

        let expired = token_for(json!({"sub": "u1", "exp": Utc::now().timestamp() - 10}));
        assert_eq!(
            Session::from_token(expired).unwrap_err(),
            ClientError::AuthenticationRequired
        );

        assert_eq!(
            Session::from_token("garbage".to_string()).unwrap_err(),
            ClientError::AuthenticationRequired
        );
    }

    #[test]
    fn cookie_provider_finds_token_cookie() {
        let provider = CookieTokenProvider::new("theme=dark; token=abc.def.ghi; lang=en");
        assert_eq!(provider.token().as_deref(), Some("abc.def.ghi"));
        assert_eq!(CookieTokenProvider::new("theme=dark").token(), None);
    }
}
