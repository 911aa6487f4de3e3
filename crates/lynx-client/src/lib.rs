//! # Lynx Client
//!
//! 面向用户的命令分发接口，包括：
//! - Commander/Observer 模式（读写分离，共享一条会话）
//! - 同步/异步运动命令与停止抢占
//! - 路径执行（渲染为程序文本，航点数不受寄存器宽度限制）
//! - 版本门控的控制程序模板与上传
//! - 发送前参数校验（越界/NaN 一个字节都不上线）
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。需要直接控制 recipe 和数据包
//! 收发时使用 [`lynx_driver`]。
//!
//! ```no_run
//! use lynx_client::LynxBuilder;
//!
//! fn main() -> Result<(), lynx_client::ClientError> {
//!     let robot = LynxBuilder::new("192.168.56.101").connect()?;
//!     robot.io.set_standard_digital_out(3, true)?;
//!     robot.motion.move_joint([0.0, -1.57, 0.0, -1.57, 0.0, 0.0], 1.05, 1.4, false)?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod commander;
pub mod config;
mod error;
pub mod io;
pub mod observer;
pub mod path;
pub mod program;
pub mod template;
pub mod types;
pub mod validation;

// 重新导出常用类型
pub use builder::{LynxBuilder, LynxRobot};
pub use commander::MotionCommander;
pub use config::ClientConfig;
pub use error::ClientError;
pub use io::IoCommander;
pub use observer::Observer;
pub use path::{Path, PathEntry};
pub use types::*;
