//! # Lynx Driver Layer
//!
//! 协议引擎与会话运行时，包括：
//! - 版本协商、recipe 注册与记账、数据包收发（`engine`）
//! - 后台状态接收循环（`pipeline`）
//! - 无锁共享状态快照（`context`，ArcSwap 整体替换）
//! - watchdog 踢狗纪律（`watchdog`）
//! - 显式重连与有界发送重试（`session`）
//!
//! # 使用场景
//!
//! 适用于需要直接控制 recipe 与命令收发的场景。大多数用户应该使用
//! `lynx-client` 提供的更高级接口。

mod context;
mod engine;
mod error;
mod pipeline;
pub mod recipes;
mod session;
mod watchdog;

#[cfg(any(feature = "mock", test))]
pub mod testkit;

pub use context::{SessionContext, monotonic_micros};
pub use engine::ProtocolEngine;
pub use error::DriverError;
pub use recipes::RecipeIds;
pub use session::{Session, SessionConfig};
pub use watchdog::{DEFAULT_WATCHDOG_MIN_HZ, Watchdog};
