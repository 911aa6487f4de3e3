//! # Lynx Protocol
//!
//! Lynx 实时寄存器协议定义（无 I/O 依赖）
//!
//! 控制器固件只暴露一小组通用寄存器（布尔位域、整数、双精度、向量槽位）。
//! 客户端在连接建立时协商若干 "recipe"（有序的寄存器名列表），之后的每个
//! 数据包都按 recipe ID 复用同一组寄存器，从而在固定寄存器银行之上承载
//! 开放的命令词汇表和周期状态流。
//!
//! ## 模块
//!
//! - `packet`: 包头与报文类型定义
//! - `register`: 寄存器类型与值的编解码
//! - `recipe`: recipe 描述符与数据包载荷编解码
//! - `command`: `RobotCommand` 命令总和类型与寄存器绑定
//! - `state`: 输出状态快照与状态位域
//! - `version`: 协议版本与控制器固件版本
//! - `handshake`: 建联阶段请求/应答载荷编解码
//! - `names`: 固件寄存器名词汇表
//!
//! ## 字节序
//!
//! 线上所有多字节整数与浮点数为大端字节序（网络序）。

pub mod command;
pub mod handshake;
pub mod names;
pub mod packet;
pub mod recipe;
pub mod register;
pub mod state;
pub mod version;

// 重新导出常用类型
pub use command::{AnalogOutputKind, CommandOpcode, CommandPayload, ControlCommand, RobotCommand};
pub use packet::{HEADER_SIZE, PacketHeader, PacketKind};
pub use recipe::{RecipeDescriptor, RegisterSource};
pub use register::{RegisterKind, RegisterValue};
pub use state::{RobotStatusBits, SafetyStatusBits, StateSnapshot};
pub use version::{ControllerVersion, PROTOCOL_VERSION};

use thiserror::Error;

/// 协议编解码错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Packet truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Invalid packet length field: {0}")]
    InvalidLength(u16),

    #[error("Unknown packet kind: 0x{0:02X}")]
    UnknownPacketKind(u8),

    #[error("Unexpected packet kind: expected {expected:?}, got {actual:?}")]
    UnexpectedPacket {
        expected: PacketKind,
        actual: PacketKind,
    },

    #[error("Unknown register type name: {0:?}")]
    UnknownRegisterKind(String),

    #[error("Register kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch {
        expected: RegisterKind,
        actual: RegisterKind,
    },

    #[error("Command does not bind register {name:?} of recipe {recipe_id}")]
    UnboundRegister { recipe_id: u8, name: String },

    #[error("Data package carries recipe {actual}, session output recipe is {expected}")]
    RecipeIdMismatch { expected: u8, actual: u8 },

    #[error("Trailing {0} bytes after decoding data package")]
    TrailingBytes(usize),

    #[error("Invalid UTF-8 in packet payload")]
    InvalidText,

    #[error("Unknown command opcode: {0}")]
    UnknownOpcode(i32),
}
