//! 脚本通道
//!
//! 控制程序上传走第二条独立连接，是传输会话的退化形态：纯字节写，
//! 没有应答协议。"成功"的含义是字节已写入，程序在控制器端的运行
//! 正确性不在本通道职责内。

use crate::{Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct ScriptChannel {
    transport: Arc<dyn Transport>,
    connect_timeout: Duration,
}

impl ScriptChannel {
    pub fn new(transport: Arc<dyn Transport>, connect_timeout: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
        }
    }

    pub fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect(self.connect_timeout)
    }

    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    /// 将渲染完成的程序文本原样写入脚本通道
    ///
    /// 未连接时自动建连；程序文本必须以换行结尾，控制器以此判断
    /// 程序边界。
    pub fn send_program(&self, text: &str) -> Result<(), TransportError> {
        if !self.transport.is_open() {
            debug!("script channel not open, connecting");
            self.connect()?;
        }
        self.transport.send(text.as_bytes())?;
        info!("uploaded program ({} bytes)", text.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    #[test]
    fn test_send_program_connects_lazily() {
        let (transport, listener) = mock::mock_link();
        let channel = ScriptChannel::new(Arc::new(transport), Duration::from_secs(1));
        assert!(!channel.is_connected());

        channel.send_program("def prog():\n  noop()\nend\n").unwrap();

        let mut peer = listener.accept(Duration::from_secs(1)).unwrap();
        let bytes = peer.recv_some(Duration::from_secs(1)).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "def prog():\n  noop()\nend\n");
        assert!(channel.is_connected());
    }
}
