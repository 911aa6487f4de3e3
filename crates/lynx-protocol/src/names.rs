//! 固件寄存器名词汇表
//!
//! 寄存器名与其线上类型由控制器固件固定。客户端这份表用于：
//! 构造默认输出 recipe、在测试中模拟固件应答。运行时真正的类型
//! 信息以 recipe 注册应答为准，这里只是词汇表的镜像。

use crate::register::RegisterKind;

// ---- 输出流中约定的专用寄存器 ----

/// 控制程序命令状态寄存器（输出 int 0）：1 = 就绪，2 = 完成
pub const REG_COMMAND_STATE: &str = "output_int_register_0";
/// 异步操作进度寄存器（输出 int 1）：-1 = 空闲，>= 0 = 当前航点序号
pub const REG_ASYNC_PROGRESS: &str = "output_int_register_1";
/// 整数结果寄存器（输出 int 2）：查询类命令的布尔/计数结果
pub const REG_INT_RESULT: &str = "output_int_register_2";

/// 命令状态：控制程序就绪，可接收下一条命令
pub const COMMAND_STATE_READY: i32 = 1;
/// 命令状态：当前命令已执行完成
pub const COMMAND_STATE_DONE: i32 = 2;

/// 异步进度的空闲值
pub const ASYNC_PROGRESS_IDLE: i32 = -1;

// ---- 名字构造 ----

pub fn input_int_register(n: u32) -> String {
    format!("input_int_register_{n}")
}

pub fn input_double_register(n: u32) -> String {
    format!("input_double_register_{n}")
}

pub fn output_int_register(n: u32) -> String {
    format!("output_int_register_{n}")
}

pub fn output_double_register(n: u32) -> String {
    format!("output_double_register_{n}")
}

/// 默认输出 recipe：完整状态流
///
/// 与固件输出词汇表一一对应；按需裁剪时必须保留专用寄存器
/// （命令状态、异步进度、结果寄存器），否则命令分发器无法工作。
pub fn default_output_variables() -> Vec<String> {
    let mut names: Vec<String> = [
        "timestamp",
        "target_q",
        "target_qd",
        "target_qdd",
        "target_current",
        "target_moment",
        "actual_q",
        "actual_qd",
        "actual_current",
        "joint_control_output",
        "actual_TCP_pose",
        "actual_TCP_speed",
        "actual_TCP_force",
        "target_TCP_pose",
        "target_TCP_speed",
        "actual_digital_input_bits",
        "joint_temperatures",
        "actual_execution_time",
        "robot_mode",
        "joint_mode",
        "safety_mode",
        "actual_tool_accelerometer",
        "speed_scaling",
        "target_speed_fraction",
        "actual_momentum",
        "actual_main_voltage",
        "actual_robot_voltage",
        "actual_robot_current",
        "actual_joint_voltage",
        "actual_digital_output_bits",
        "runtime_state",
        "standard_analog_input0",
        "standard_analog_input1",
        "standard_analog_output0",
        "standard_analog_output1",
        "robot_status_bits",
        "safety_status_bits",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    for n in 0..8 {
        names.push(output_int_register(n));
    }
    for n in 0..8 {
        names.push(output_double_register(n));
    }
    names
}

/// 固件词汇表：名字 -> 线上类型
///
/// 未知名字返回 `None`，对应 recipe 注册应答中的 `NOT_FOUND`。
pub fn well_known_kind(name: &str) -> Option<RegisterKind> {
    if let Some(rest) = name.strip_prefix("input_int_register_")
        .or_else(|| name.strip_prefix("output_int_register_"))
    {
        return rest.parse::<u32>().ok().filter(|n| *n < 48).map(|_| RegisterKind::Int32);
    }
    if let Some(rest) = name.strip_prefix("input_double_register_")
        .or_else(|| name.strip_prefix("output_double_register_"))
    {
        return rest.parse::<u32>().ok().filter(|n| *n < 48).map(|_| RegisterKind::Double);
    }

    let kind = match name {
        "timestamp"
        | "actual_execution_time"
        | "speed_scaling"
        | "target_speed_fraction"
        | "actual_momentum"
        | "actual_main_voltage"
        | "actual_robot_voltage"
        | "actual_robot_current"
        | "standard_analog_input0"
        | "standard_analog_input1"
        | "standard_analog_output0"
        | "standard_analog_output1"
        | "speed_slider_fraction"
        | "standard_analog_output_0"
        | "standard_analog_output_1" => RegisterKind::Double,

        "target_q" | "target_qd" | "target_qdd" | "target_current" | "target_moment"
        | "actual_q" | "actual_qd" | "actual_current" | "joint_control_output"
        | "actual_TCP_pose" | "actual_TCP_speed" | "actual_TCP_force" | "target_TCP_pose"
        | "target_TCP_speed" | "joint_temperatures" | "actual_joint_voltage" => {
            RegisterKind::Vector6d
        },

        "actual_tool_accelerometer" => RegisterKind::Vector3d,

        "joint_mode" => RegisterKind::Vector6Int32,

        "robot_mode" | "safety_mode" => RegisterKind::Int32,

        "actual_digital_input_bits" | "actual_digital_output_bits" => RegisterKind::UInt64,

        "runtime_state" | "robot_status_bits" | "safety_status_bits" | "speed_slider_mask" => {
            RegisterKind::UInt32
        },

        "standard_digital_output_mask"
        | "standard_digital_output"
        | "tool_digital_output_mask"
        | "tool_digital_output"
        | "standard_analog_output_mask"
        | "standard_analog_output_type" => RegisterKind::UInt8,

        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_list_is_fully_known() {
        for name in default_output_variables() {
            assert!(
                well_known_kind(&name).is_some(),
                "default output variable {name} missing from vocabulary"
            );
        }
    }

    #[test]
    fn test_register_families() {
        assert_eq!(well_known_kind("input_int_register_23"), Some(RegisterKind::Int32));
        assert_eq!(well_known_kind("output_double_register_7"), Some(RegisterKind::Double));
        // 超出寄存器银行范围
        assert_eq!(well_known_kind("input_int_register_48"), None);
        assert_eq!(well_known_kind("input_int_register_x"), None);
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(well_known_kind("not_a_variable"), None);
    }
}
