//! 状态接收循环
//!
//! 每个会话一个常驻线程：阻塞收包 → 整体替换快照。任何解码或传输
//! 失败都终止本循环并断开会话，失败经错误通道上报；循环从不自我
//! 重启，恢复只能由调用方显式 `reconnect()`。

use crate::context::SessionContext;
use crate::engine::ProtocolEngine;
use crate::error::DriverError;
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::{debug, error, trace};

pub(crate) fn rx_loop(
    engine: Arc<ProtocolEngine>,
    ctx: Arc<SessionContext>,
    err_tx: Sender<DriverError>,
) {
    // 设置线程优先级（可选 feature）：接收循环跑在控制器周期上
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
            tracing::warn!("failed to set receive loop thread priority: {e:?}");
        }
    }

    debug!("receive loop started");
    loop {
        if !ctx.rx_running() {
            trace!("receive loop: stop requested");
            break;
        }

        match engine.receive_data() {
            Ok(snapshot) => ctx.publish(snapshot),
            Err(e) => {
                if ctx.rx_running() {
                    // 接收失败对会话是致命的：断开并上报，绝不内部重试
                    error!("receive loop terminated: {e}");
                    engine.disconnect();
                    let _ = err_tx.send(e);
                    ctx.set_rx_running(false);
                } else {
                    // 主动停机：disconnect 唤醒了阻塞中的读，属正常路径
                    trace!("receive loop: unblocked by shutdown ({e})");
                }
                break;
            },
        }
    }
    debug!("receive loop exited");
}

// 停机顺序约定：session 先 set_rx_running(false) 再 disconnect()，
// 循环被唤醒后要么看到 false 走正常停机，要么读到错误且标志仍为
// true 走故障停机，两条路径都恰好断开一次。
