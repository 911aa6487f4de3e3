//! 输出状态快照与状态位域
//!
//! 快照是"协商出的每个输出变量名 -> 最近一次完整解码的值"的映射，
//! 外加接收时间戳。快照整体替换、从不逐字段修改 —— 原子可见性由
//! 持有方（驱动层的 `ArcSwap`）保证，这里只提供不可变的读取视图。

use crate::names;
use crate::register::RegisterValue;
use bilge::prelude::*;
use std::collections::HashMap;

/// 机器人状态位（`robot_status_bits` 低 8 位）
///
/// 协议位序为 LSB first，bilge 默认一致。
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct RobotStatusBits {
    pub power_on: bool,             // Bit 0
    pub program_running: bool,      // Bit 1
    pub teach_button_pressed: bool, // Bit 2
    pub power_button_pressed: bool, // Bit 3
    pub reserved: u4,               // Bit 4-7
}

/// 安全状态位（`safety_status_bits` 低 16 位）
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct SafetyStatusBits {
    pub normal_mode: bool,             // Bit 0
    pub reduced_mode: bool,            // Bit 1
    pub protective_stopped: bool,      // Bit 2
    pub recovery_mode: bool,           // Bit 3
    pub safeguard_stopped: bool,       // Bit 4
    pub system_emergency_stopped: bool, // Bit 5
    pub robot_emergency_stopped: bool, // Bit 6
    pub emergency_stopped: bool,       // Bit 7
    pub violation: bool,               // Bit 8
    pub fault: bool,                   // Bit 9
    pub stopped_due_to_safety: bool,   // Bit 10
    pub reserved: u5,                  // Bit 11-15
}

/// 最近一次完整解码的输出数据包
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    values: HashMap<String, RegisterValue>,
    /// 接收时刻（应用启动起算的单调微秒）
    recv_time_us: u64,
}

impl StateSnapshot {
    /// 尚未收到任何数据包时的空快照
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_values(
        pairs: impl IntoIterator<Item = (String, RegisterValue)>,
        recv_time_us: u64,
    ) -> Self {
        Self {
            values: pairs.into_iter().collect(),
            recv_time_us,
        }
    }

    pub fn recv_time_us(&self) -> u64 {
        self.recv_time_us
    }

    /// 是否还没有任何输出数据（会话刚建立）
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegisterValue> {
        self.values.get(name)
    }

    // ---- 按类型取值 ----

    pub fn double(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn vector3d(&self, name: &str) -> Option<[f64; 3]> {
        self.get(name)?.as_vector3d()
    }

    pub fn vector6d(&self, name: &str) -> Option<[f64; 6]> {
        self.get(name)?.as_vector6d()
    }

    pub fn vector6i32(&self, name: &str) -> Option<[i32; 6]> {
        self.get(name)?.as_vector6i32()
    }

    pub fn bits64(&self, name: &str) -> Option<u64> {
        self.get(name)?.as_u64()
    }

    pub fn int32(&self, name: &str) -> Option<i32> {
        self.get(name)?.as_i32()
    }

    pub fn uint32(&self, name: &str) -> Option<u32> {
        self.get(name)?.as_u32()
    }

    // ---- 专用寄存器 ----

    pub fn output_int_register(&self, n: u32) -> Option<i32> {
        self.int32(&names::output_int_register(n))
    }

    pub fn output_double_register(&self, n: u32) -> Option<f64> {
        self.double(&names::output_double_register(n))
    }

    /// 控制程序命令状态（就绪/完成），未知时为 `None`
    pub fn command_state(&self) -> Option<i32> {
        self.int32(names::REG_COMMAND_STATE)
    }

    /// 异步操作进度：-1 = 无进行中的操作
    ///
    /// 未收到任何数据包时同样返回 -1（从未下发过异步命令等价于空闲）。
    pub fn async_progress(&self) -> i32 {
        self.int32(names::REG_ASYNC_PROGRESS)
            .unwrap_or(names::ASYNC_PROGRESS_IDLE)
    }

    pub fn robot_status(&self) -> Option<RobotStatusBits> {
        self.uint32("robot_status_bits")
            .map(|raw| RobotStatusBits::from(raw as u8))
    }

    pub fn safety_status(&self) -> Option<SafetyStatusBits> {
        self.uint32("safety_status_bits")
            .map(|raw| SafetyStatusBits::from(raw as u16))
    }

    /// 控制器端是否有程序在运行
    pub fn is_program_running(&self) -> bool {
        self.robot_status().map(|s| s.program_running()).unwrap_or(false)
    }
}
