//! Client 层 Builder
//!
//! 组装一次完整的连接：实时通道会话（协商 + recipe + 接收循环）、
//! 脚本通道、版本门控的控制程序上传，产出共享同一会话的三个句柄
//! （运动 / I/O / 状态）。

use crate::commander::MotionCommander;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::io::IoCommander;
use crate::observer::Observer;
use crate::program::ProgramManager;
use lynx_driver::{Session, SessionConfig};
use lynx_protocol::ControllerVersion;
use lynx_transport::{TcpTransport, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

pub struct LynxBuilder {
    host: String,
    config: ClientConfig,
    realtime_transport: Option<Arc<dyn Transport>>,
    script_transport: Option<Arc<dyn Transport>>,
}

impl LynxBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            config: ClientConfig::default(),
            realtime_transport: None,
            script_transport: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// 指定自定义控制程序文件（整体覆盖内置模板）
    pub fn custom_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.custom_program = Some(path.into());
        self
    }

    pub fn upload_program(mut self, upload: bool) -> Self {
        self.config.upload_program = upload;
        self
    }

    /// 注入传输实现（测试/仿真用；默认按 host + 端口建 TCP）
    pub fn transports(
        mut self,
        realtime: Arc<dyn Transport>,
        script: Arc<dyn Transport>,
    ) -> Self {
        self.realtime_transport = Some(realtime);
        self.script_transport = Some(script);
        self
    }

    pub fn connect(self) -> Result<LynxRobot, ClientError> {
        let realtime: Arc<dyn Transport> = match self.realtime_transport {
            Some(transport) => transport,
            None => Arc::new(
                TcpTransport::new(self.host.clone(), self.config.realtime_port)
                    .with_read_timeout(self.config.receive_timeout()),
            ),
        };

        let session = Session::connect(
            realtime,
            SessionConfig {
                connect_timeout: self.config.connect_timeout(),
                send_retries: self.config.send_retries,
                ..Default::default()
            },
        )?;
        let version = session.controller_version()?;

        let script: Arc<dyn Transport> = match self.script_transport {
            Some(transport) => transport,
            None => Arc::new(TcpTransport::new(self.host.clone(), self.config.script_port)),
        };
        let programs = Arc::new(ProgramManager::new(
            script,
            self.config.connect_timeout(),
            version,
            self.config.custom_program.clone(),
        ));

        if self.config.upload_program {
            programs.upload()?;
            wait_program_running(&session, &self.config);
        }

        Ok(LynxRobot {
            motion: MotionCommander::new(session.clone(), programs.clone(), self.config.clone()),
            io: IoCommander::new(session.clone()),
            observer: Observer::new(session.clone()),
            session,
        })
    }
}

/// 软等待控制程序起跑（超时仅告警，命令路径会再次等待就绪）
fn wait_program_running(session: &Arc<Session>, config: &ClientConfig) {
    let deadline = Instant::now() + config.ready_timeout();
    while Instant::now() < deadline {
        if session.snapshot().is_program_running() {
            return;
        }
        spin_sleep::sleep(session.cycle_time());
    }
    warn!(
        "control program not reported running within {:?}",
        config.ready_timeout()
    );
}

/// 一次连接产出的三个句柄（共享同一条会话）
pub struct LynxRobot {
    pub motion: MotionCommander,
    pub io: IoCommander,
    pub observer: Observer,
    session: Arc<Session>,
}

impl LynxRobot {
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// 本会话协商出的控制器固件版本
    pub fn controller_version(&self) -> Result<ControllerVersion, ClientError> {
        Ok(self.session.controller_version()?)
    }

    /// 显式重连（完整重做建联序列；接收循环随之重启）
    pub fn reconnect(&self) -> Result<(), ClientError> {
        self.motion.reconnect()
    }

    pub fn disconnect(&self) {
        self.motion.disconnect();
    }
}
