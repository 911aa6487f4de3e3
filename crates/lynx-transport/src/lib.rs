//! # Lynx Transport Layer
//!
//! 字节流会话抽象层：一条到控制器实时端口的持久 TCP 连接，外加
//! 承载控制程序上传的第二条连接（脚本通道）。
//!
//! 读写路径使用相互独立的锁，保证接收循环阻塞在读上时命令发送
//! 不受影响（同一连接的两个 I/O 方向安全交错）。

use std::time::Duration;
use thiserror::Error;

pub mod script;
pub mod tcp;

#[cfg(any(feature = "mock", test))]
pub mod mock;

pub use script::ScriptChannel;
pub use tcp::TcpTransport;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Could not resolve address: {0}")]
    Resolve(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed by peer")]
    Closed,

    #[error("Read timeout")]
    Timeout,
}

/// 字节流会话
///
/// 约定：
/// - `send` 全量写入或失败，不存在半包成功；
/// - `recv_exact` 阻塞到填满缓冲区、连接关闭或读超时；
/// - 读写可并发调用（独立 I/O 方向互不阻塞）；
/// - 任一方向出错后 `is_open` 立即变为 `false`，其后的调用返回
///   `NotConnected`，这是连接活性的唯一事实来源。
pub trait Transport: Send + Sync {
    /// 建立连接；已连接时先断开再重连（幂等）
    fn connect(&self, timeout: Duration) -> Result<(), TransportError>;

    /// 关闭连接；会唤醒阻塞中的 `recv_exact`
    fn disconnect(&self);

    fn send(&self, buf: &[u8]) -> Result<(), TransportError>;

    fn recv_exact(&self, buf: &mut [u8]) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;
}
