//! 驱动层错误类型定义

use lynx_protocol::ProtocolError;
use lynx_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 数据包编解码错误（布局或版本不匹配，对当前会话是致命的）
    #[error("Decode error: {0}")]
    Decode(#[from] ProtocolError),

    /// 控制器拒绝了请求的协议版本
    #[error("Controller refused protocol version {requested}")]
    VersionRefused { requested: u16 },

    /// recipe 注册被拒绝（未知变量名或不支持的频率）
    #[error("Recipe rejected: {reason}")]
    RecipeRejected { reason: String },

    /// 控制器拒绝启动/暂停同步
    #[error("Controller refused to {0} synchronization")]
    SyncRefused(&'static str),

    /// 传输未连接时尝试操作
    #[error("Not connected")]
    NotConnected,

    /// 同步等待超出时限
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// `send_start` 之后不允许再注册 recipe
    #[error("Recipe setup is not allowed after start")]
    SetupAfterStart,

    /// 版本协商必须先于 recipe 注册
    #[error("Protocol version must be negotiated before recipe setup")]
    NotNegotiated,

    /// 尚未调用 `send_start`
    #[error("Synchronization not started")]
    NotStarted,

    /// 同步已经启动，重复调用 `send_start`
    #[error("Synchronization already started")]
    AlreadyStarted,

    /// 发送时引用了未协商的 recipe ID
    #[error("Recipe {0} was not negotiated in this session")]
    UnknownRecipe(u8),

    /// watchdog 每会话只允许使能一次
    #[error("Watchdog already enabled for this session")]
    WatchdogAlreadyEnabled,
}

impl DriverError {
    /// 是否属于连接丢失（可触发有界的重连重试）
    ///
    /// 协议性失败（版本被拒、recipe 被拒、解码错误）不在其中：
    /// 它们重试也不会变好，必须立即上浮。
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, DriverError::Transport(_) | DriverError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_classification() {
        assert!(DriverError::NotConnected.is_connection_loss());
        assert!(DriverError::Transport(TransportError::Closed).is_connection_loss());
        assert!(!DriverError::VersionRefused { requested: 2 }.is_connection_loss());
        assert!(
            !DriverError::RecipeRejected {
                reason: "x".into()
            }
            .is_connection_loss()
        );
    }

    #[test]
    fn test_display_messages() {
        let err = DriverError::VersionRefused { requested: 2 };
        assert_eq!(err.to_string(), "Controller refused protocol version 2");

        let err = DriverError::UnknownRecipe(9);
        assert!(err.to_string().contains("Recipe 9"));
    }
}
