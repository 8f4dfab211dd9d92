/// 경매 카운트다운 타이머
/// 남은 시간은 매 틱마다 (종료 시각 - 현재 시각)으로 다시 계산한다.
/// 경과 틱을 누적하지 않으므로 재시작해도 어긋나지 않는다.
// region:    --- Imports
use crate::format::format_remaining;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Clock
/// 현재 시각 공급자
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// endregion: --- Clock

// region:    --- Countdown
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownSnapshot {
    pub remaining: ChronoDuration,
    pub display: String,
    pub ended: bool,
}

/// 고정된 종료 시각 기준 카운트다운
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    end: DateTime<Utc>,
}

impl Countdown {
    pub fn new(end: DateTime<Utc>) -> Self {
        Self { end }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// 남은 시간 (0 미만은 0)
    pub fn remaining(&self, now: DateTime<Utc>) -> ChronoDuration {
        (self.end - now).max(ChronoDuration::zero())
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> CountdownSnapshot {
        let remaining = self.remaining(now);
        CountdownSnapshot {
            remaining,
            display: format_remaining(remaining),
            ended: remaining.is_zero(),
        }
    }
}

// endregion: --- Countdown

// region:    --- Countdown Timer
/// 1초마다 스냅샷을 발행하는 타이머
/// drop 또는 stop() 시 틱 작업도 함께 종료된다.
pub struct CountdownTimer {
    countdown: Countdown,
    receiver: watch::Receiver<CountdownSnapshot>,
    cancel: CancellationToken,
}

impl CountdownTimer {
    /// 타이머 시작
    pub fn start(end: DateTime<Utc>, clock: Arc<dyn Clock>) -> Self {
        let countdown = Countdown::new(end);
        let (sender, receiver) = watch::channel(countdown.snapshot(clock.now()));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        info!("{:<12} --> 카운트다운 시작: 종료 {}", "Countdown", end);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("{:<12} --> 카운트다운 취소", "Countdown");
                        break;
                    }
                    _ = ticker.tick() => {
                        let snapshot = countdown.snapshot(clock.now());
                        let ended = snapshot.ended;
                        sender.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                *current = snapshot;
                                true
                            }
                        });
                        if ended {
                            info!("{:<12} --> 경매 종료 시각 도달", "Countdown");
                            break;
                        }
                        if sender.is_closed() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            countdown,
            receiver,
            cancel,
        }
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown
    }

    /// 마지막으로 발행된 스냅샷
    pub fn current(&self) -> CountdownSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.receiver.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// endregion: --- Countdown Timer

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ENDED_LABEL;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// 테스트에서 직접 움직이는 시계
    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += ChronoDuration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn remaining_is_monotonic_and_clamped() {
        let end = base() + ChronoDuration::seconds(90);
        let countdown = Countdown::new(end);

        let mut previous = countdown.remaining(base());
        for step in 1..=120 {
            let remaining = countdown.remaining(base() + ChronoDuration::seconds(step));
            assert!(remaining <= previous);
            assert!(remaining >= ChronoDuration::zero());
            previous = remaining;
        }

        assert!(!countdown.snapshot(end - ChronoDuration::seconds(1)).ended);
        let at_end = countdown.snapshot(end);
        assert!(at_end.ended);
        assert_eq!(at_end.display, ENDED_LABEL);
        assert_eq!(countdown.snapshot(end + ChronoDuration::hours(3)).display, ENDED_LABEL);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_publishes_until_end() {
        let clock = Arc::new(ManualClock(Mutex::new(base())));
        let timer = CountdownTimer::start(base() + ChronoDuration::seconds(3), clock.clone());
        let mut rx = timer.subscribe();
        assert_eq!(timer.current().display, "00m 03s");

        for _ in 0..3 {
            clock.advance(1);
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }
        let last = loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.ended {
                break snapshot;
            }
        };
        assert_eq!(last.display, ENDED_LABEL);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_publishes_nothing_more() {
        let clock = Arc::new(ManualClock(Mutex::new(base())));
        let timer = CountdownTimer::start(base() + ChronoDuration::seconds(30), clock.clone());
        let mut rx = timer.subscribe();
        tokio::task::yield_now().await;
        rx.borrow_and_update();

        timer.stop();
        tokio::task::yield_now().await;
        clock.advance(5);
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        assert!(timer.is_stopped());
        assert!(!rx.has_changed().unwrap_or(false));
    }
}
