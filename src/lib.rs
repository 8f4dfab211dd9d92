// region:    --- Modules
pub mod api;
pub mod auction;
pub mod auth;
pub mod bidding;
pub mod config;
pub mod countdown;
pub mod detail;
pub mod error;
pub mod feed;
pub mod format;
pub mod wishlist;
// endregion: --- Modules

// region:    --- Lock
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 패닉으로 오염된 락도 그대로 사용 (상태는 항상 일관된 값만 기록)
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
// endregion: --- Lock
