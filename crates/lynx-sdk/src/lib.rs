//! # Lynx SDK
//!
//! Lynx 机械臂实时控制 SDK 的统一入口。
//!
//! 分层（自下而上）：
//! - [`protocol`]：寄存器/recipe 协议编解码（无 I/O）
//! - [`transport`]：TCP 实时通道与脚本通道
//! - [`driver`]：协议引擎、会话运行时、状态接收循环、watchdog
//! - [`client`]：运动/I/O/状态三分接口与程序模板
//!
//! 大多数用户从 [`LynxBuilder`] 开始：
//!
//! ```no_run
//! use lynx_sdk::prelude::*;
//!
//! fn main() -> Result<(), lynx_sdk::client::ClientError> {
//!     lynx_sdk::init_logging();
//!     let robot = LynxBuilder::new("192.168.56.101").connect()?;
//!     robot.motion.set_watchdog(None)?;
//!     robot.motion.move_joint([0.0, -1.57, 0.0, -1.57, 0.0, 0.0], 1.05, 1.4, false)?;
//!     Ok(())
//! }
//! ```

pub use lynx_client as client;
pub use lynx_driver as driver;
pub use lynx_protocol as protocol;
pub use lynx_transport as transport;

pub use lynx_client::{ClientConfig, ClientError, LynxBuilder, LynxRobot, Path, PathEntry};
pub use lynx_protocol::{ControllerVersion, StateSnapshot};

pub mod prelude {
    //! 常用类型一揽子导入

    pub use crate::client::types::{CircularMode, Feature, Joints, Pose, SpeedVector, Target};
    pub use crate::client::{
        ClientConfig, ClientError, IoCommander, LynxBuilder, LynxRobot, MotionCommander, Observer,
        Path, PathEntry,
    };
    pub use crate::protocol::ControllerVersion;
}

/// 初始化日志：env-filter 的 tracing 订阅器 + log 桥接
///
/// 可重复调用（后续调用是 no-op）。过滤规则经 `RUST_LOG` 控制，
/// 例如 `RUST_LOG=lynx_driver=trace`。
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logging_is_idempotent() {
        super::init_logging();
        super::init_logging();
        log::info!("log bridge works");
        tracing::info!("tracing works");
    }
}
