//! 客户端配置
//!
//! 端口、超时、重试界限与自定义程序路径。支持从 TOML 文件加载，
//! 缺省字段取默认值。

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 实时寄存器通道端口
    pub realtime_port: u16,
    /// 脚本（程序上传）通道端口
    pub script_port: u16,
    /// 建联超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 状态流读超时（毫秒，None = 无限等待）
    ///
    /// 远超控制周期的静默意味着控制器死亡；超时对会话是致命的，
    /// 与解码失败同样触发接收循环终止。
    pub receive_timeout_ms: Option<u64>,
    /// 发送发现连接已断时的重连重试次数上限
    pub send_retries: u32,
    /// 建联后是否上传内置控制程序
    pub upload_program: bool,
    /// 自定义控制程序路径（整体覆盖内置模板，不做版本门控；
    /// 读取失败时回落到内置模板）
    pub custom_program: Option<PathBuf>,
    /// 等待控制程序就绪的超时（毫秒）
    pub ready_timeout_ms: u64,
    /// 普通运动的同步等待超时（毫秒）
    pub motion_timeout_ms: u64,
    /// 路径执行的同步等待超时（毫秒）
    pub path_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            realtime_port: 30020,
            script_port: 30010,
            connect_timeout_ms: 5000,
            receive_timeout_ms: Some(1000),
            send_retries: 1,
            upload_program: true,
            custom_program: None,
            ready_timeout_ms: 3000,
            motion_timeout_ms: 300_000,
            path_timeout_ms: 600_000,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.as_ref().display())))?;
        toml::from_str(&text).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_ms.map(Duration::from_millis)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }

    pub fn path_timeout(&self) -> Duration {
        Duration::from_millis(self.path_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.realtime_port, 30020);
        assert_eq!(config.send_retries, 1);
        assert!(config.upload_program);
        assert_eq!(config.motion_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_from_toml_file_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "realtime_port = 40020\nsend_retries = 3\nupload_program = false"
        )
        .unwrap();

        let config = ClientConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.realtime_port, 40020);
        assert_eq!(config.send_retries, 3);
        assert!(!config.upload_program);
        // 未覆盖的字段保持默认
        assert_eq!(config.script_port, 30010);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ClientConfig::from_toml_file("/nonexistent/lynx.toml").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
