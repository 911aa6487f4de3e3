//! 客户端层错误类型定义

use lynx_driver::DriverError;
use lynx_transport::TransportError;
use thiserror::Error;

/// 客户端层错误类型
#[derive(Error, Debug)]
pub enum ClientError {
    /// 驱动层错误（连接、协议、超时）
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 脚本通道传输错误
    #[error("Script channel error: {0}")]
    Script(#[from] TransportError),

    /// 数值参数越界；参数在任何网络 I/O 之前被拒绝
    #[error("Invalid argument: {name} = {value} outside [{min}; {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// 数值参数为 NaN
    #[error("Invalid argument: {name} is NaN")]
    NotANumber { name: &'static str },

    /// 逆解无解（如实报错而不是占位值）
    #[error("No kinematic solution for the requested pose")]
    NoSolution,

    /// 程序模板错误（哨兵语法损坏）
    #[error("Program template error: {0}")]
    Template(String),

    /// 配置文件错误
    #[error("Config error: {0}")]
    Config(String),

    /// 空路径不可执行
    #[error("Path contains no waypoints")]
    EmptyPath,
}

impl ClientError {
    /// 是否属于参数校验失败（`InvalidArgument` 族）
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            ClientError::OutOfRange { .. } | ClientError::NotANumber { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_classification() {
        let err = ClientError::OutOfRange {
            name: "speed slider fraction",
            value: 1.1,
            min: 0.0,
            max: 1.0,
        };
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("speed slider fraction"));

        assert!(ClientError::NotANumber { name: "gain" }.is_invalid_argument());
        assert!(!ClientError::NoSolution.is_invalid_argument());
    }
}
