//! 会话运行时
//!
//! `Session` 把协议引擎、共享上下文和接收线程装配成一个可重建的
//! 整体：connect → negotiate → recipe 注册 → start → 接收循环。
//! 接收循环故障后会话保持断开，恢复只有一条路径 —— 调用方显式
//! `reconnect()` 按同样顺序重做全部建联步骤（幂等，可重复调用）。

use crate::context::SessionContext;
use crate::engine::ProtocolEngine;
use crate::error::DriverError;
use crate::pipeline;
use crate::recipes::{self, RecipeIds};
use crate::watchdog::Watchdog;
use crossbeam_channel::{Receiver, bounded};
use lynx_protocol::names::default_output_variables;
use lynx_protocol::{
    CommandOpcode, CommandPayload, ControlCommand, ControllerVersion, RobotCommand, StateSnapshot,
};
use lynx_transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 建联超时
    pub connect_timeout: Duration,
    /// 发送发现连接已断时的重连重试次数上限
    ///
    /// 超时内重试恰好这么多次后向调用方报失败；0 表示从不重试。
    pub send_retries: u32,
    /// 输出 recipe 的变量列表
    pub output_variables: Vec<String>,
    /// 建联后等待第一个状态包的时长
    pub first_snapshot_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            send_retries: 1,
            output_variables: default_output_variables(),
            first_snapshot_timeout: Duration::from_millis(500),
        }
    }
}

pub struct Session {
    engine: Arc<ProtocolEngine>,
    ctx: Arc<SessionContext>,
    config: SessionConfig,
    recipe_ids: Mutex<Option<RecipeIds>>,
    controller_version: Mutex<Option<ControllerVersion>>,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
    rx_errors: Mutex<Option<Receiver<DriverError>>>,
    watchdog: Watchdog,
    /// 串行化建联/重连（两个线程同时 reconnect 会交错协商序列）
    setup_lock: Mutex<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// 建立会话并启动接收循环
    pub fn connect(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Result<Arc<Self>, DriverError> {
        let session = Arc::new(Self {
            engine: Arc::new(ProtocolEngine::new(transport)),
            ctx: Arc::new(SessionContext::new()),
            config,
            recipe_ids: Mutex::new(None),
            controller_version: Mutex::new(None),
            rx_thread: Mutex::new(None),
            rx_errors: Mutex::new(None),
            watchdog: Watchdog::new(),
            setup_lock: Mutex::new(()),
        });
        {
            let _guard = session.setup_lock.lock();
            session.establish()?;
        }
        Ok(session)
    }

    /// 重新建联：完整重做 connect → negotiate → recipe 注册 → start，
    /// 并重启接收循环。幂等，连续调用多次结果一致。
    pub fn reconnect(self: &Arc<Self>) -> Result<(), DriverError> {
        let _guard = self.setup_lock.lock();
        info!("reconnecting session");
        self.teardown_rx();
        self.establish()
    }

    /// 断开会话（接收循环随之终止并被 join）
    pub fn disconnect(&self) {
        let _guard = self.setup_lock.lock();
        self.teardown_rx();
        info!("session disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// 本会话协商出的固件版本
    pub fn controller_version(&self) -> Result<ControllerVersion, DriverError> {
        (*self.controller_version.lock()).ok_or(DriverError::NotConnected)
    }

    /// 一个控制周期的时长（未连接时按旧代 125 Hz 保守取值）
    pub fn cycle_time(&self) -> Duration {
        (*self.controller_version.lock())
            .map(|v| v.cycle_time())
            .unwrap_or(Duration::from_millis(8))
    }

    /// 本会话协商出的输入 recipe ID 表
    pub fn recipe_ids(&self) -> Result<RecipeIds, DriverError> {
        (*self.recipe_ids.lock()).ok_or(DriverError::NotConnected)
    }

    /// 当前状态快照（无锁读取，整包一致）
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.ctx.snapshot()
    }

    /// 异步操作进度：-1 = 空闲
    pub fn async_progress(&self) -> i32 {
        self.ctx.async_progress()
    }

    /// 取出接收循环上报的致命错误（若有）
    pub fn take_rx_error(&self) -> Option<DriverError> {
        let guard = self.rx_errors.lock();
        guard.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    /// 发送一条命令，连接已断时做有界的重连重试
    ///
    /// 重试只针对连接丢失；协议性失败（recipe 被拒、解码错误）
    /// 立即上浮，绝不降级为重试。
    pub fn send(self: &Arc<Self>, command: &RobotCommand) -> Result<(), DriverError> {
        let mut attempt = 0u32;
        loop {
            let result = if self.is_connected() {
                self.engine.send(command)
            } else {
                Err(DriverError::NotConnected)
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_connection_loss() && attempt < self.config.send_retries => {
                    attempt += 1;
                    warn!("send failed ({e}), reconnect attempt {attempt}");
                    self.reconnect()?;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// 使能 watchdog；每会话恰好一次
    pub fn enable_watchdog(self: &Arc<Self>, min_hz: f64) -> Result<(), DriverError> {
        // 先记账再发送：并发的第二次调用在发送前就被拒绝
        self.watchdog.mark_enabled(min_hz)?;
        let ids = match self.recipe_ids() {
            Ok(ids) => ids,
            Err(e) => {
                self.watchdog.reset();
                return Err(e);
            },
        };
        let command = RobotCommand::new(
            ids.control,
            CommandPayload::Control(
                ControlCommand::new(CommandOpcode::WatchdogSetup).with_double(0, min_hz),
            ),
        );
        if let Err(e) = self.send(&command) {
            self.watchdog.reset();
            return Err(e);
        }
        info!("watchdog enabled at {min_hz} Hz minimum");
        Ok(())
    }

    /// 踢狗：经空命令 recipe 发送一个保活包
    ///
    /// 不走重连重试 —— 在踢狗路径里做重连必然错过截止期，失败就
    /// 如实上报（`NotConnected`），由调用方的控制环决定善后。
    pub fn kick_watchdog(&self) -> Result<(), DriverError> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        let ids = self.recipe_ids()?;
        self.engine
            .send(&RobotCommand::new(ids.no_command, CommandPayload::WatchdogKick))
    }

    pub fn watchdog_enabled(&self) -> bool {
        self.watchdog.is_enabled()
    }

    // ---- 内部 ----

    /// 完整建联序列（调用方须持 setup_lock，且接收循环已停）
    fn establish(&self) -> Result<(), DriverError> {
        self.engine.connect(self.config.connect_timeout)?;
        self.engine.negotiate_protocol_version()?;
        let version = self.engine.controller_version()?;
        let frequency = version.cycle_frequency();

        self.engine
            .send_output_setup(&self.config.output_variables, frequency)?;

        // 输入 recipe 固定顺序注册，ID 在重连后保持一致
        let ids = RecipeIds {
            no_command: self.engine.send_input_setup(&recipes::no_command())?,
            standard_digital_out: self
                .engine
                .send_input_setup(&recipes::standard_digital_out())?,
            tool_digital_out: self.engine.send_input_setup(&recipes::tool_digital_out())?,
            speed_slider: self.engine.send_input_setup(&recipes::speed_slider())?,
            analog_out: self.engine.send_input_setup(&recipes::analog_out())?,
            control: self.engine.send_input_setup(&recipes::control())?,
        };

        self.engine.send_start()?;

        *self.recipe_ids.lock() = Some(ids);
        *self.controller_version.lock() = Some(version);
        self.watchdog.reset();
        self.ctx.clear_snapshot();
        self.spawn_rx()?;
        self.wait_first_snapshot();
        debug!("session established (controller {version}, {frequency} Hz)");
        Ok(())
    }

    fn spawn_rx(&self) -> Result<(), DriverError> {
        let engine = self.engine.clone();
        let ctx = self.ctx.clone();
        let (err_tx, err_rx) = bounded(1);
        ctx.set_rx_running(true);
        let handle = std::thread::Builder::new()
            .name("lynx-rx".to_string())
            .spawn({
                let ctx = ctx.clone();
                move || pipeline::rx_loop(engine, ctx, err_tx)
            })
            .map_err(|e| {
                ctx.set_rx_running(false);
                DriverError::Transport(lynx_transport::TransportError::Io(e))
            })?;
        *self.rx_thread.lock() = Some(handle);
        *self.rx_errors.lock() = Some(err_rx);
        Ok(())
    }

    /// 停接收线程并断开传输
    fn teardown_rx(&self) {
        self.stop_rx_thread();
        self.engine.disconnect();
    }

    fn stop_rx_thread(&self) {
        // 先清标志再断开：唤醒后的循环据此区分正常停机与故障
        self.ctx.set_rx_running(false);
        self.engine.transport().disconnect();
        if let Some(handle) = self.rx_thread.lock().take() {
            if handle.join().is_err() {
                warn!("receive loop thread panicked");
            }
        }
    }

    /// 等待接收循环发布第一个快照（软等待，超时仅告警）
    fn wait_first_snapshot(&self) {
        let deadline = Instant::now() + self.config.first_snapshot_timeout;
        while self.ctx.snapshot().is_empty() {
            if Instant::now() >= deadline {
                warn!(
                    "no state packet within {:?} after start",
                    self.config.first_snapshot_timeout
                );
                return;
            }
            spin_sleep::sleep(Duration::from_micros(500));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // 不经 setup_lock：Drop 时不可能再有并发的 reconnect
        self.stop_rx_thread();
        self.engine.disconnect();
    }
}
