//! `RobotCommand` 命令总和类型与寄存器绑定
//!
//! 命令词汇表是开放的，但固件只认识 recipe。每个命令变体对应一种输入
//! recipe 形状；序列化时由 recipe 布局逐寄存器向命令取值（见
//! [`RegisterSource`]），因此"命令发到错误的 recipe"在发送前就会报错。
//!
//! ## 控制 recipe 的寄存器约定
//!
//! 宽命令（运动、伺服、力控、查询）共用同一个最宽的控制 recipe：
//! 8 个输入 int 寄存器 + 24 个输入 double 寄存器。
//!
//! | 寄存器 | 含义 |
//! |---|---|
//! | `input_int_register_0` | 命令操作码（[`CommandOpcode`]） |
//! | `input_int_register_1..=7` | 整型参数（选择向量、模式、异步标志等） |
//! | `input_double_register_0..=23` | 双精度参数（目标、速度、加速度等） |
//!
//! 每个操作码的具体参数布局见 `lynx-client` 中对应的构造函数。

use crate::ProtocolError;
use crate::recipe::RegisterSource;
use crate::register::RegisterValue;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 控制 recipe 的整型参数个数（不含操作码）
pub const CONTROL_INT_PARAMS: usize = 7;
/// 控制 recipe 的双精度参数个数
pub const CONTROL_DOUBLE_PARAMS: usize = 24;

/// 控制程序能识别的命令操作码
///
/// 写入 `input_int_register_0`。取值是固件契约的一部分，新增操作码
/// 必须同步更新控制程序模板。
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum CommandOpcode {
    /// 空命令：清除已完成命令，使控制程序回到就绪态
    NoCommand = 0,
    MoveJoint = 1,
    MoveJointToPose = 2,
    MoveLinear = 3,
    MoveLinearFromJoints = 4,
    MoveCircular = 5,
    MoveProcess = 6,
    ForceMode = 7,
    ForceModeStop = 8,
    SpeedJoint = 9,
    SpeedLinear = 10,
    SpeedStop = 11,
    ServoJoint = 12,
    ServoLinear = 13,
    ServoCircular = 14,
    ServoStop = 15,
    StopJoint = 16,
    StopLinear = 17,
    JogStart = 18,
    JogStop = 19,
    TeachMode = 20,
    EndTeachMode = 21,
    ZeroFtSensor = 22,
    SetPayload = 23,
    SetTcp = 24,
    ForceModeSetDamping = 25,
    ForceModeSetGainScaling = 26,
    InverseKinematics = 27,
    ForwardKinematics = 28,
    PoseTrans = 29,
    IsPoseWithinSafetyLimits = 30,
    IsJointsWithinSafetyLimits = 31,
    IsSteady = 32,
    ToolContact = 33,
    GetStepTime = 34,
    GetTargetWaypoint = 35,
    GetTcpOffset = 36,
    GetJointTorques = 37,
    TriggerProtectiveStop = 38,
    WatchdogSetup = 40,
    /// 终止控制器端程序
    StopProgram = 255,
}

/// 模拟输出的物理类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogOutputKind {
    Current = 0,
    Voltage = 1,
}

/// 宽控制命令：操作码 + 满配寄存器载荷
///
/// 载荷按最宽输入 recipe 定尺；未用槽位保持零值，控制程序只读与
/// 操作码相关的寄存器。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCommand {
    pub opcode: CommandOpcode,
    pub ints: [i32; CONTROL_INT_PARAMS],
    pub doubles: [f64; CONTROL_DOUBLE_PARAMS],
}

impl ControlCommand {
    pub fn new(opcode: CommandOpcode) -> Self {
        Self {
            opcode,
            ints: [0; CONTROL_INT_PARAMS],
            doubles: [0.0; CONTROL_DOUBLE_PARAMS],
        }
    }

    pub fn with_int(mut self, index: usize, value: i32) -> Self {
        self.ints[index] = value;
        self
    }

    pub fn with_double(mut self, index: usize, value: f64) -> Self {
        self.doubles[index] = value;
        self
    }

    pub fn with_doubles(mut self, start: usize, values: &[f64]) -> Self {
        self.doubles[start..start + values.len()].copy_from_slice(values);
        self
    }

    fn register_value(&self, name: &str) -> Option<RegisterValue> {
        if let Some(rest) = name.strip_prefix("input_int_register_") {
            let n: usize = rest.parse().ok()?;
            return match n {
                0 => Some(RegisterValue::Int32(self.opcode.into())),
                1..=CONTROL_INT_PARAMS => Some(RegisterValue::Int32(self.ints[n - 1])),
                _ => None,
            };
        }
        if let Some(rest) = name.strip_prefix("input_double_register_") {
            let n: usize = rest.parse().ok()?;
            return (n < CONTROL_DOUBLE_PARAMS).then(|| RegisterValue::Double(self.doubles[n]));
        }
        None
    }
}

/// 命令载荷：判别子即命令种类
///
/// 每个变体只携带其 recipe 实际读取的字段；构造后立即被序列化消费，
/// 不做保留。
#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    /// 空命令 / 保活（watchdog 同通道）
    NoCommand,
    /// watchdog 踢狗
    WatchdogKick,
    SetStandardDigitalOut {
        mask: u8,
        level: u8,
    },
    SetToolDigitalOut {
        mask: u8,
        level: u8,
    },
    SetSpeedSlider {
        fraction: f64,
    },
    SetAnalogOut {
        mask: u8,
        kind: AnalogOutputKind,
        value0: f64,
        value1: f64,
    },
    /// 宽寄存器控制命令（运动、伺服、力控、查询……）
    Control(ControlCommand),
}

impl CommandPayload {
    /// 命令种类的显示名（日志用）
    pub fn kind_name(&self) -> &'static str {
        match self {
            CommandPayload::NoCommand => "no_command",
            CommandPayload::WatchdogKick => "watchdog_kick",
            CommandPayload::SetStandardDigitalOut { .. } => "set_standard_digital_out",
            CommandPayload::SetToolDigitalOut { .. } => "set_tool_digital_out",
            CommandPayload::SetSpeedSlider { .. } => "set_speed_slider",
            CommandPayload::SetAnalogOut { .. } => "set_analog_out",
            CommandPayload::Control(_) => "control",
        }
    }
}

/// 一条待发送的命令：负载 + 它所属的已协商 recipe
///
/// `recipe_id` 必须是本会话 `send_input_setup` 返回过的 ID；发送端据此
/// 查找布局，负载与布局不匹配会在序列化时报 [`ProtocolError::UnboundRegister`]。
#[derive(Debug, Clone, PartialEq)]
pub struct RobotCommand {
    pub recipe_id: u8,
    pub payload: CommandPayload,
}

impl RobotCommand {
    pub fn new(recipe_id: u8, payload: CommandPayload) -> Self {
        Self { recipe_id, payload }
    }
}

impl RegisterSource for RobotCommand {
    fn register_value(&self, name: &str) -> Option<RegisterValue> {
        match &self.payload {
            CommandPayload::NoCommand => {
                (name == "input_int_register_23").then_some(RegisterValue::Int32(0))
            },
            CommandPayload::WatchdogKick => {
                (name == "input_int_register_23").then_some(RegisterValue::Int32(1))
            },
            CommandPayload::SetStandardDigitalOut { mask, level } => match name {
                "standard_digital_output_mask" => Some(RegisterValue::UInt8(*mask)),
                "standard_digital_output" => Some(RegisterValue::UInt8(*level)),
                _ => None,
            },
            CommandPayload::SetToolDigitalOut { mask, level } => match name {
                "tool_digital_output_mask" => Some(RegisterValue::UInt8(*mask)),
                "tool_digital_output" => Some(RegisterValue::UInt8(*level)),
                _ => None,
            },
            CommandPayload::SetSpeedSlider { fraction } => match name {
                // mask 位 0 置位表示本包携带新的滑块值
                "speed_slider_mask" => Some(RegisterValue::UInt32(1)),
                "speed_slider_fraction" => Some(RegisterValue::Double(*fraction)),
                _ => None,
            },
            CommandPayload::SetAnalogOut {
                mask,
                kind,
                value0,
                value1,
            } => match name {
                "standard_analog_output_mask" => Some(RegisterValue::UInt8(*mask)),
                "standard_analog_output_type" => Some(RegisterValue::UInt8(*kind as u8)),
                "standard_analog_output_0" => Some(RegisterValue::Double(*value0)),
                "standard_analog_output_1" => Some(RegisterValue::Double(*value1)),
                _ => None,
            },
            CommandPayload::Control(cmd) => cmd.register_value(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeDescriptor;
    use crate::register::RegisterKind;
    use bytes::BytesMut;

    #[test]
    fn test_digital_out_binds_mask_and_level() {
        let cmd = RobotCommand::new(
            2,
            CommandPayload::SetStandardDigitalOut {
                mask: 0b1000,
                level: 0b1000,
            },
        );
        assert_eq!(
            cmd.register_value("standard_digital_output_mask"),
            Some(RegisterValue::UInt8(0b1000))
        );
        assert_eq!(cmd.register_value("input_double_register_0"), None);
    }

    #[test]
    fn test_control_command_register_mapping() {
        let cmd = ControlCommand::new(CommandOpcode::ServoJoint)
            .with_doubles(0, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6])
            .with_int(1, 1);
        let robot_cmd = RobotCommand::new(6, CommandPayload::Control(cmd));

        assert_eq!(
            robot_cmd.register_value("input_int_register_0"),
            Some(RegisterValue::Int32(CommandOpcode::ServoJoint.into()))
        );
        assert_eq!(
            robot_cmd.register_value("input_int_register_2"),
            Some(RegisterValue::Int32(1))
        );
        assert_eq!(
            robot_cmd.register_value("input_double_register_5"),
            Some(RegisterValue::Double(0.6))
        );
        // 控制 recipe 之外的寄存器不被绑定
        assert_eq!(robot_cmd.register_value("input_int_register_8"), None);
        assert_eq!(robot_cmd.register_value("speed_slider_fraction"), None);
    }

    #[test]
    fn test_command_encodes_against_matching_recipe() {
        let recipe = RecipeDescriptor::new(
            4,
            vec!["speed_slider_mask".into(), "speed_slider_fraction".into()],
            vec![RegisterKind::UInt32, RegisterKind::Double],
        )
        .unwrap();
        let cmd = RobotCommand::new(4, CommandPayload::SetSpeedSlider { fraction: 0.5 });

        let mut buf = BytesMut::new();
        recipe.encode_payload(&cmd, &mut buf).unwrap();
        assert_eq!(buf.len(), 12);

        let values = recipe.decode_payload(&buf).unwrap();
        assert_eq!(values[0], RegisterValue::UInt32(1));
        assert_eq!(values[1], RegisterValue::Double(0.5));
    }

    #[test]
    fn test_command_rejects_mismatched_recipe() {
        // speed slider 负载发往 digital out 布局
        let recipe = RecipeDescriptor::new(
            2,
            vec![
                "standard_digital_output_mask".into(),
                "standard_digital_output".into(),
            ],
            vec![RegisterKind::UInt8, RegisterKind::UInt8],
        )
        .unwrap();
        let cmd = RobotCommand::new(2, CommandPayload::SetSpeedSlider { fraction: 0.5 });

        let mut buf = BytesMut::new();
        assert!(recipe.encode_payload(&cmd, &mut buf).is_err());
    }

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(CommandOpcode::try_from(12), Ok(CommandOpcode::ServoJoint));
        assert_eq!(CommandOpcode::try_from(255), Ok(CommandOpcode::StopProgram));
        assert!(CommandOpcode::try_from(9999).is_err());
    }
}
