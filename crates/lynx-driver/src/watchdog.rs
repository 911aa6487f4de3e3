//! Watchdog 踢狗纪律
//!
//! 截止期的检测与执行都在控制器侧：输入通道的节奏低于声明的最小
//! 频率时由控制器自行停机。客户端只有两条义务：
//! 1. 每个会话恰好发送一次使能命令；
//! 2. 踢狗失败必须以错误上浮，绝不静默吞掉。
//!
//! 本模块只做"恰好一次"的记账，命令发送在 `session`。

use crate::error::DriverError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// 默认的最小保活频率（Hz）
pub const DEFAULT_WATCHDOG_MIN_HZ: f64 = 10.0;

/// watchdog 会话状态
pub struct Watchdog {
    enabled: AtomicBool,
    min_hz: Mutex<Option<f64>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            min_hz: Mutex::new(None),
        }
    }

    /// 记录使能；一个会话内第二次调用报错
    pub fn mark_enabled(&self, min_hz: f64) -> Result<(), DriverError> {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return Err(DriverError::WatchdogAlreadyEnabled);
        }
        *self.min_hz.lock() = Some(min_hz);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn min_hz(&self) -> Option<f64> {
        *self.min_hz.lock()
    }

    /// 会话重建时复位（新会话需要重新使能）
    pub fn reset(&self) {
        self.enabled.store(false, Ordering::Release);
        *self.min_hz.lock() = None;
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_exactly_once_per_session() {
        let watchdog = Watchdog::new();
        assert!(!watchdog.is_enabled());

        watchdog.mark_enabled(10.0).unwrap();
        assert!(watchdog.is_enabled());
        assert_eq!(watchdog.min_hz(), Some(10.0));

        let err = watchdog.mark_enabled(20.0).unwrap_err();
        assert!(matches!(err, DriverError::WatchdogAlreadyEnabled));

        watchdog.reset();
        assert!(!watchdog.is_enabled());
        watchdog.mark_enabled(20.0).unwrap();
    }
}
