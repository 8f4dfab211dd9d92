/// 표시용 포맷 함수 (통화, 남은 시간, 시각)
// region:    --- Imports
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

// endregion: --- Imports

// region:    --- Formatters
pub const ENDED_LABEL: &str = "Auction Ended";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// 금액 표시 (인도식 자릿수 구분: ₹1,23,456)
pub fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let paise_total = (amount.abs() * 100.0).round() as u64;
    let rupees = paise_total / 100;
    let paise = paise_total % 100;

    let digits = rupees.to_string();
    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    if paise == 0 {
        format!("{sign}₹{grouped}")
    } else {
        format!("{sign}₹{grouped}.{paise:02}")
    }
}

/// 남은 시간 표시, 0 이하이면 종료 문구
pub fn format_remaining(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds();
    if millis <= 0 {
        return ENDED_LABEL.to_string();
    }

    // 1초 미만이 남아도 종료 전까지는 0초로 표시하지 않는다
    let total = (millis + 999) / 1000;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m {seconds:02}s")
    } else if hours > 0 {
        format!("{hours:02}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{minutes:02}m {seconds:02}s")
    }
}

/// 시각 표시 (항상 UTC)
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y, %H:%M UTC").to_string()
}

/// 서버 시각 문자열을 UTC로 정규화
/// 오프셋이 없는 문자열은 UTC로 간주한다.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// endregion: --- Formatters
