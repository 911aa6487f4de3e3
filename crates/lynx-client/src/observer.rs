//! 状态读取
//!
//! 对共享快照的类型化只读视图。快照由接收循环整体替换，这里的
//! 每次读取都落在同一个完整解码的数据包上。值为 `None` 表示该
//! 变量不在协商的输出 recipe 里，或首个数据包尚未到达。

use lynx_driver::Session;
use lynx_protocol::{RobotStatusBits, SafetyStatusBits, StateSnapshot};
use std::sync::Arc;

pub struct Observer {
    session: Arc<Session>,
}

impl Observer {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// 当前快照句柄（同一句柄上的多次读取保证一致）
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.session.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// 控制器时间戳（秒）
    pub fn timestamp(&self) -> Option<f64> {
        self.snapshot().double("timestamp")
    }

    /// 快照接收时刻（应用启动起算的单调微秒）
    pub fn recv_time_us(&self) -> u64 {
        self.snapshot().recv_time_us()
    }

    // ---- 关节空间 ----

    pub fn target_q(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_q")
    }

    pub fn target_qd(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_qd")
    }

    pub fn target_qdd(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_qdd")
    }

    pub fn target_current(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_current")
    }

    pub fn target_moment(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_moment")
    }

    pub fn actual_q(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_q")
    }

    pub fn actual_qd(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_qd")
    }

    pub fn actual_current(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_current")
    }

    pub fn joint_control_output(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("joint_control_output")
    }

    pub fn joint_temperatures(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("joint_temperatures")
    }

    pub fn joint_mode(&self) -> Option<[i32; 6]> {
        self.snapshot().vector6i32("joint_mode")
    }

    pub fn actual_joint_voltage(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_joint_voltage")
    }

    // ---- 工具空间 ----

    pub fn actual_tcp_pose(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_TCP_pose")
    }

    pub fn actual_tcp_speed(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_TCP_speed")
    }

    pub fn actual_tcp_force(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("actual_TCP_force")
    }

    pub fn target_tcp_pose(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_TCP_pose")
    }

    pub fn target_tcp_speed(&self) -> Option<[f64; 6]> {
        self.snapshot().vector6d("target_TCP_speed")
    }

    pub fn actual_tool_accelerometer(&self) -> Option<[f64; 3]> {
        self.snapshot().vector3d("actual_tool_accelerometer")
    }

    // ---- 数字/模拟 I/O ----

    pub fn actual_digital_input_bits(&self) -> Option<u64> {
        self.snapshot().bits64("actual_digital_input_bits")
    }

    pub fn actual_digital_output_bits(&self) -> Option<u64> {
        self.snapshot().bits64("actual_digital_output_bits")
    }

    /// 单个数字输出口的当前电平
    pub fn digital_out_state(&self, output_id: u8) -> Option<bool> {
        self.actual_digital_output_bits()
            .map(|bits| bits & (1 << output_id) != 0)
    }

    /// 单个数字输入口的当前电平
    pub fn digital_in_state(&self, input_id: u8) -> Option<bool> {
        self.actual_digital_input_bits()
            .map(|bits| bits & (1 << input_id) != 0)
    }

    pub fn standard_analog_input(&self, input_id: u8) -> Option<f64> {
        self.snapshot()
            .double(&format!("standard_analog_input{input_id}"))
    }

    pub fn standard_analog_output(&self, output_id: u8) -> Option<f64> {
        self.snapshot()
            .double(&format!("standard_analog_output{output_id}"))
    }

    // ---- 状态与模式 ----

    pub fn robot_mode(&self) -> Option<i32> {
        self.snapshot().int32("robot_mode")
    }

    pub fn safety_mode(&self) -> Option<i32> {
        self.snapshot().int32("safety_mode")
    }

    pub fn runtime_state(&self) -> Option<u32> {
        self.snapshot().uint32("runtime_state")
    }

    pub fn robot_status(&self) -> Option<RobotStatusBits> {
        self.snapshot().robot_status()
    }

    pub fn safety_status(&self) -> Option<SafetyStatusBits> {
        self.snapshot().safety_status()
    }

    /// 控制器端是否有程序在运行
    pub fn is_program_running(&self) -> bool {
        self.snapshot().is_program_running()
    }

    // ---- 标量 ----

    pub fn speed_scaling(&self) -> Option<f64> {
        self.snapshot().double("speed_scaling")
    }

    pub fn target_speed_fraction(&self) -> Option<f64> {
        self.snapshot().double("target_speed_fraction")
    }

    pub fn actual_momentum(&self) -> Option<f64> {
        self.snapshot().double("actual_momentum")
    }

    pub fn actual_main_voltage(&self) -> Option<f64> {
        self.snapshot().double("actual_main_voltage")
    }

    pub fn actual_robot_voltage(&self) -> Option<f64> {
        self.snapshot().double("actual_robot_voltage")
    }

    pub fn actual_robot_current(&self) -> Option<f64> {
        self.snapshot().double("actual_robot_current")
    }

    pub fn actual_execution_time(&self) -> Option<f64> {
        self.snapshot().double("actual_execution_time")
    }

    // ---- 通用寄存器 ----

    pub fn output_int_register(&self, n: u32) -> Option<i32> {
        self.snapshot().output_int_register(n)
    }

    pub fn output_double_register(&self, n: u32) -> Option<f64> {
        self.snapshot().output_double_register(n)
    }

    /// 异步操作进度：-1 = 空闲，>= 0 = 当前航点/步序号
    pub fn async_progress(&self) -> i32 {
        self.session.async_progress()
    }
}
