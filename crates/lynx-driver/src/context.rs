//! 会话共享状态
//!
//! 快照由接收循环独占写入、任意线程读取。`ArcSwap` 整体替换保证
//! 读者永远看到一个完整解码的数据包，不存在新旧字段混合的撕裂读。

use arc_swap::ArcSwap;
use lynx_protocol::StateSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// 应用启动锚点，首次访问时设定，之后不变
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 应用启动起算的单调微秒数
///
/// 单调递增、不受系统时钟调整影响，可安全存入 AtomicU64 / 快照。
pub fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 会话上下文：接收循环与前台调用方之间唯一的共享可变状态
pub struct SessionContext {
    /// 最近一个完整解码的输出数据包（整体替换，无锁读取）
    snapshot: ArcSwap<StateSnapshot>,
    /// 接收循环运行标志
    rx_running: AtomicBool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(StateSnapshot::empty()),
            rx_running: AtomicBool::new(false),
        }
    }

    /// 读取当前快照（无锁，纳秒级返回）
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.snapshot.load_full()
    }

    /// 发布一个新快照（仅接收循环调用）
    pub(crate) fn publish(&self, snapshot: StateSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    /// 清空快照（会话重建时丢弃陈旧状态）
    pub(crate) fn clear_snapshot(&self) {
        self.snapshot.store(Arc::new(StateSnapshot::empty()));
    }

    pub fn rx_running(&self) -> bool {
        self.rx_running.load(Ordering::Acquire)
    }

    pub(crate) fn set_rx_running(&self, running: bool) {
        self.rx_running.store(running, Ordering::Release);
    }

    /// 异步操作进度：-1 = 空闲
    pub fn async_progress(&self) -> i32 {
        self.snapshot.load().async_progress()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_protocol::RegisterValue;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_monotonic_micros_increases() {
        let t1 = monotonic_micros();
        thread::sleep(Duration::from_millis(5));
        let t2 = monotonic_micros();
        assert!(t2 > t1);
    }

    #[test]
    fn test_snapshot_replacement_is_whole() {
        let ctx = SessionContext::new();
        assert!(ctx.snapshot().is_empty());
        assert_eq!(ctx.async_progress(), -1);

        ctx.publish(StateSnapshot::from_values(
            [("output_int_register_1".to_string(), RegisterValue::Int32(2))],
            monotonic_micros(),
        ));
        assert_eq!(ctx.async_progress(), 2);

        // 老读者继续持有旧快照，不受新发布影响
        let old = ctx.snapshot();
        ctx.publish(StateSnapshot::empty());
        assert_eq!(old.async_progress(), 2);
        assert_eq!(ctx.async_progress(), -1);
    }
}
