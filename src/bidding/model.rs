use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

// 입찰 진행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BidPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

// 입찰 모달 상태
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BidForm {
    pub input: String,
    pub open: bool,
    pub phase: BidPhase,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl BidForm {
    /// 종료 단계에서 사용자가 다시 조작하면 대기 상태로 복귀
    pub fn settle(&mut self) {
        if matches!(self.phase, BidPhase::Succeeded | BidPhase::Failed) {
            self.phase = BidPhase::Idle;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 금액을 정수 paise 단위로 변환
pub fn to_paise(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_paise(paise: i64) -> f64 {
    paise as f64 / 100.0
}

/// 입력창에 넣을 금액 문자열 (paise 가 0 이면 정수로)
pub fn input_amount(amount: f64) -> String {
    let paise = to_paise(amount);
    let sign = if paise < 0 { "-" } else { "" };
    let paise = paise.abs();
    if paise % 100 == 0 {
        format!("{sign}{}", paise / 100)
    } else {
        format!("{sign}{}.{:02}", paise / 100, paise % 100)
    }
}

/// 최소 입찰가 = 현재 최고가 + 최소 단위 (경계 포함)
pub fn minimum_bid(highest: f64, min_increment: f64) -> f64 {
    from_paise(to_paise(highest) + to_paise(min_increment))
}

/// 입찰 금액 검증
pub fn validate_bid(input: &str, highest: f64, min_increment: f64) -> Result<f64, ValidationError> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('₹')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let amount = cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber(input.trim().to_string()))?;

    // paise 단위 정수로 비교
    let amount = from_paise(to_paise(amount));
    let minimum = minimum_bid(highest, min_increment);
    if to_paise(amount) < to_paise(minimum) {
        return Err(ValidationError::BelowMinimum { amount, minimum });
    }
    Ok(amount)
}

/// 빠른 입찰 금액 목록 (현재가 + 단계별 증가분)
pub fn quick_bid_amounts(highest: f64, ladder: &[f64]) -> Vec<f64> {
    ladder
        .iter()
        .map(|step| from_paise(to_paise(highest) + to_paise(*step)))
        .collect()
}
