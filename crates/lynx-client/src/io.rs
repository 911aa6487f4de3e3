//! I/O 命令
//!
//! 全部为发送即确认：写一包命令、以传输写入成败为结果，不等待
//! 控制器侧确认。这些命令幂等且重发廉价，重连后补发无害。

use crate::error::ClientError;
use crate::validation::{check_id, check_range, limits};
use lynx_driver::Session;
use lynx_protocol::{AnalogOutputKind, CommandPayload, RobotCommand};
use std::sync::Arc;

pub struct IoCommander {
    session: Arc<Session>,
}

impl IoCommander {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// 设置标准数字输出口电平
    pub fn set_standard_digital_out(&self, output_id: u8, level: bool) -> Result<(), ClientError> {
        check_id("digital output id", output_id, 7)?;
        let mask = 1u8 << output_id;
        let ids = self.session.recipe_ids()?;
        self.session.send(&RobotCommand::new(
            ids.standard_digital_out,
            CommandPayload::SetStandardDigitalOut {
                mask,
                level: if level { mask } else { 0 },
            },
        ))?;
        Ok(())
    }

    /// 设置工具数字输出口电平
    pub fn set_tool_digital_out(&self, output_id: u8, level: bool) -> Result<(), ClientError> {
        check_id("tool digital output id", output_id, 1)?;
        let mask = 1u8 << output_id;
        let ids = self.session.recipe_ids()?;
        self.session.send(&RobotCommand::new(
            ids.tool_digital_out,
            CommandPayload::SetToolDigitalOut {
                mask,
                level: if level { mask } else { 0 },
            },
        ))?;
        Ok(())
    }

    /// 设置速度滑块（运动速度的全局比例，[0; 1]）
    pub fn set_speed_slider(&self, fraction: f64) -> Result<(), ClientError> {
        check_range("speed slider fraction", fraction, limits::FRACTION)?;
        let ids = self.session.recipe_ids()?;
        self.session.send(&RobotCommand::new(
            ids.speed_slider,
            CommandPayload::SetSpeedSlider { fraction },
        ))?;
        Ok(())
    }

    /// 设置模拟输出（电压模式，比例值 [0; 1]）
    pub fn set_analog_output_voltage(
        &self,
        output_id: u8,
        voltage_ratio: f64,
    ) -> Result<(), ClientError> {
        self.set_analog_output(output_id, AnalogOutputKind::Voltage, voltage_ratio)
    }

    /// 设置模拟输出（电流模式，比例值 [0; 1]）
    pub fn set_analog_output_current(
        &self,
        output_id: u8,
        current_ratio: f64,
    ) -> Result<(), ClientError> {
        self.set_analog_output(output_id, AnalogOutputKind::Current, current_ratio)
    }

    fn set_analog_output(
        &self,
        output_id: u8,
        kind: AnalogOutputKind,
        ratio: f64,
    ) -> Result<(), ClientError> {
        check_id("analog output id", output_id, 1)?;
        check_range("analog output ratio", ratio, limits::FRACTION)?;
        let ids = self.session.recipe_ids()?;
        let (value0, value1) = if output_id == 0 {
            (ratio, 0.0)
        } else {
            (0.0, ratio)
        };
        self.session.send(&RobotCommand::new(
            ids.analog_out,
            CommandPayload::SetAnalogOut {
                mask: 1 << output_id,
                kind,
                value0,
                value1,
            },
        ))?;
        Ok(())
    }
}
