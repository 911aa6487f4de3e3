//! 运动命令分发器
//!
//! 每个公开操作走两种形态之一：
//!
//! - **发送即确认**：I/O 与模式切换类，写一包命令、以传输写入的
//!   成败为结果，不等待控制器侧确认（幂等，重连后重发无害）。
//! - **运动命令（可选异步）**：同步模式下按控制周期轮询共享快照的
//!   命令状态寄存器直到完成或超时；异步模式发送成功即返回，由
//!   调用方轮询 [`MotionCommander::async_progress`]。
//!
//! 同一运动通道同一时刻至多一条在途运动归分发器所有；异步运动
//! 在途时唯一支持的抢占是 `stop_joint` / `stop_linear` /
//! `servo_stop` / `speed_stop` —— 在途中直接叠发新运动命令的结果
//! 由控制器固件决定，客户端不做任何恢复，慎用。
//!
//! 同步等待超时 **不会** 取消控制器侧运动：调用方收到超时错误后
//! 自行决定是否补发 stop。

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::path::Path;
use crate::program::ProgramManager;
use crate::types::{CircularMode, Feature, Joints, Pose, SpeedVector};
use crate::validation::{check_finite, check_range, limits};
use lynx_driver::{DriverError, Session};
use lynx_protocol::names;
use lynx_protocol::{CommandOpcode, CommandPayload, ControlCommand, RobotCommand, StateSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct MotionCommander {
    session: Arc<Session>,
    programs: Arc<ProgramManager>,
    config: ClientConfig,
}

impl MotionCommander {
    pub(crate) fn new(
        session: Arc<Session>,
        programs: Arc<ProgramManager>,
        config: ClientConfig,
    ) -> Self {
        Self {
            session,
            programs,
            config,
        }
    }

    // ==================== 关节/直线/圆弧运动 ====================

    /// 关节空间运动到目标关节角
    ///
    /// `asynchronous = true` 时发送后立即返回，进度经
    /// [`async_progress`](Self::async_progress) 轮询，可用
    /// [`stop_joint`](Self::stop_joint) 取消。
    pub fn move_joint(
        &self,
        q: Joints,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<(), ClientError> {
        check_finite("target joints", &q)?;
        check_range("joint speed", speed, limits::JOINT_VELOCITY)?;
        check_range("joint acceleration", acceleration, limits::JOINT_ACCELERATION)?;
        self.motion(
            ControlCommand::new(CommandOpcode::MoveJoint)
                .with_doubles(0, &q)
                .with_double(6, speed)
                .with_double(7, acceleration),
            asynchronous,
        )
    }

    /// 关节空间运动到位姿目标（控制器侧逆解）
    pub fn move_joint_to_pose(
        &self,
        pose: Pose,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<(), ClientError> {
        check_finite("target pose", &pose)?;
        check_range("joint speed", speed, limits::JOINT_VELOCITY)?;
        check_range("joint acceleration", acceleration, limits::JOINT_ACCELERATION)?;
        self.motion(
            ControlCommand::new(CommandOpcode::MoveJointToPose)
                .with_doubles(0, &pose)
                .with_double(6, speed)
                .with_double(7, acceleration),
            asynchronous,
        )
    }

    /// 工具空间直线运动
    pub fn move_linear(
        &self,
        pose: Pose,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<(), ClientError> {
        check_finite("target pose", &pose)?;
        check_range("tool speed", speed, limits::TOOL_VELOCITY)?;
        check_range("tool acceleration", acceleration, limits::TOOL_ACCELERATION)?;
        self.motion(
            ControlCommand::new(CommandOpcode::MoveLinear)
                .with_doubles(0, &pose)
                .with_double(6, speed)
                .with_double(7, acceleration),
            asynchronous,
        )
    }

    /// 直线运动到关节目标（控制器侧正解）
    pub fn move_linear_from_joints(
        &self,
        q: Joints,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<(), ClientError> {
        check_finite("target joints", &q)?;
        check_range("tool speed", speed, limits::TOOL_VELOCITY)?;
        check_range("tool acceleration", acceleration, limits::TOOL_ACCELERATION)?;
        self.motion(
            ControlCommand::new(CommandOpcode::MoveLinearFromJoints)
                .with_doubles(0, &q)
                .with_double(6, speed)
                .with_double(7, acceleration),
            asynchronous,
        )
    }

    /// 圆弧运动（经由 via 到 target）
    pub fn move_circular(
        &self,
        via: Pose,
        target: Pose,
        speed: f64,
        acceleration: f64,
        blend: f64,
        mode: CircularMode,
    ) -> Result<(), ClientError> {
        check_finite("via pose", &via)?;
        check_finite("target pose", &target)?;
        check_range("tool speed", speed, limits::TOOL_VELOCITY)?;
        check_range("tool acceleration", acceleration, limits::TOOL_ACCELERATION)?;
        check_range("blend radius", blend, limits::BLEND_RADIUS)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::MoveCircular)
                .with_doubles(0, &via)
                .with_doubles(6, &target)
                .with_double(12, speed)
                .with_double(13, acceleration)
                .with_double(14, blend)
                .with_int(1, mode as i32),
            self.config.motion_timeout(),
        )
    }

    /// 工艺运动：恒定工具速度到目标
    pub fn move_process(
        &self,
        pose: Pose,
        speed: f64,
        acceleration: f64,
        blend: f64,
    ) -> Result<(), ClientError> {
        check_finite("target pose", &pose)?;
        check_range("tool speed", speed, limits::TOOL_VELOCITY)?;
        check_range("tool acceleration", acceleration, limits::TOOL_ACCELERATION)?;
        check_range("blend radius", blend, limits::BLEND_RADIUS)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::MoveProcess)
                .with_doubles(0, &pose)
                .with_double(6, speed)
                .with_double(7, acceleration)
                .with_double(8, blend),
            self.config.motion_timeout(),
        )
    }

    // ==================== 流式命令（速度/伺服/力控） ====================

    /// 关节速度运动（流式：每周期重发以维持）
    pub fn speed_joint(
        &self,
        qd: SpeedVector,
        acceleration: f64,
        time: f64,
    ) -> Result<(), ClientError> {
        check_finite("joint speeds", &qd)?;
        check_range("joint acceleration", acceleration, limits::JOINT_ACCELERATION)?;
        check_range("time", time, limits::TIME)?;
        self.execute_stream(
            ControlCommand::new(CommandOpcode::SpeedJoint)
                .with_doubles(0, &qd)
                .with_double(6, acceleration)
                .with_double(7, time),
        )
    }

    /// 工具速度运动
    pub fn speed_linear(
        &self,
        xd: SpeedVector,
        acceleration: f64,
        time: f64,
    ) -> Result<(), ClientError> {
        check_finite("tool speeds", &xd)?;
        check_range("tool acceleration", acceleration, limits::TOOL_ACCELERATION)?;
        check_range("time", time, limits::TIME)?;
        self.execute_stream(
            ControlCommand::new(CommandOpcode::SpeedLinear)
                .with_doubles(0, &xd)
                .with_double(6, acceleration)
                .with_double(7, time),
        )
    }

    /// 关节伺服（高频跟踪）
    pub fn servo_joint(
        &self,
        q: Joints,
        speed: f64,
        acceleration: f64,
        time: f64,
        lookahead_time: f64,
        gain: f64,
    ) -> Result<(), ClientError> {
        check_finite("target joints", &q)?;
        check_range("time", time, limits::TIME)?;
        check_range("lookahead time", lookahead_time, limits::SERVO_LOOKAHEAD_TIME)?;
        check_range("servo gain", gain, limits::SERVO_GAIN)?;
        self.execute_stream(
            ControlCommand::new(CommandOpcode::ServoJoint)
                .with_doubles(0, &q)
                .with_double(6, speed)
                .with_double(7, acceleration)
                .with_double(8, time)
                .with_double(9, lookahead_time)
                .with_double(10, gain),
        )
    }

    /// 位姿伺服
    pub fn servo_linear(
        &self,
        pose: Pose,
        speed: f64,
        acceleration: f64,
        time: f64,
        lookahead_time: f64,
        gain: f64,
    ) -> Result<(), ClientError> {
        check_finite("target pose", &pose)?;
        check_range("time", time, limits::TIME)?;
        check_range("lookahead time", lookahead_time, limits::SERVO_LOOKAHEAD_TIME)?;
        check_range("servo gain", gain, limits::SERVO_GAIN)?;
        self.execute_stream(
            ControlCommand::new(CommandOpcode::ServoLinear)
                .with_doubles(0, &pose)
                .with_double(6, speed)
                .with_double(7, acceleration)
                .with_double(8, time)
                .with_double(9, lookahead_time)
                .with_double(10, gain),
        )
    }

    /// 圆弧伺服
    pub fn servo_circular(
        &self,
        pose: Pose,
        speed: f64,
        acceleration: f64,
        blend: f64,
    ) -> Result<(), ClientError> {
        check_finite("target pose", &pose)?;
        check_range("tool speed", speed, limits::TOOL_VELOCITY)?;
        check_range("tool acceleration", acceleration, limits::TOOL_ACCELERATION)?;
        check_range("blend radius", blend, limits::BLEND_RADIUS)?;
        self.execute_stream(
            ControlCommand::new(CommandOpcode::ServoCircular)
                .with_doubles(0, &pose)
                .with_double(6, speed)
                .with_double(7, acceleration)
                .with_double(8, blend),
        )
    }

    /// 力控模式（流式；参考系/柔顺选择/目标力旋量/类型/速度限制）
    pub fn force_mode(
        &self,
        task_frame: Pose,
        selection: [bool; 6],
        wrench: SpeedVector,
        mode_type: i32,
        limits_vec: SpeedVector,
    ) -> Result<(), ClientError> {
        check_finite("task frame", &task_frame)?;
        check_finite("wrench", &wrench)?;
        check_finite("force limits", &limits_vec)?;
        check_range("force mode type", mode_type as f64, (1.0, 3.0))?;
        let mut command = ControlCommand::new(CommandOpcode::ForceMode)
            .with_doubles(0, &task_frame)
            .with_doubles(6, &wrench)
            .with_doubles(12, &limits_vec)
            .with_int(0, mode_type);
        for (i, compliant) in selection.iter().enumerate() {
            command = command.with_int(i + 1, *compliant as i32);
        }
        self.execute_stream(command)
    }

    /// 退出力控模式
    pub fn force_mode_stop(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::ForceModeStop),
            self.config.motion_timeout(),
        )
    }

    /// 设置力控阻尼（进入力控前调用）
    pub fn force_mode_set_damping(&self, damping: f64) -> Result<(), ClientError> {
        check_range("force damping", damping, limits::FORCE_DAMPING)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::ForceModeSetDamping).with_double(0, damping),
            self.config.motion_timeout(),
        )
    }

    /// 设置力控增益缩放
    pub fn force_mode_set_gain_scaling(&self, scaling: f64) -> Result<(), ClientError> {
        check_range("force gain scaling", scaling, limits::FORCE_GAIN_SCALING)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::ForceModeSetGainScaling).with_double(0, scaling),
            self.config.motion_timeout(),
        )
    }

    // ==================== 停止（异步运动的唯一抢占方式） ====================

    /// 关节空间减速停止；同时取消在途的异步运动
    pub fn stop_joint(&self, deceleration: f64) -> Result<(), ClientError> {
        check_range("joint deceleration", deceleration, limits::JOINT_ACCELERATION)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::StopJoint).with_double(0, deceleration),
            self.config.motion_timeout(),
        )
    }

    /// 工具空间减速停止；同时取消在途的异步运动
    pub fn stop_linear(&self, deceleration: f64) -> Result<(), ClientError> {
        check_range("tool deceleration", deceleration, limits::TOOL_ACCELERATION)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::StopLinear).with_double(0, deceleration),
            self.config.motion_timeout(),
        )
    }

    /// 停止伺服
    pub fn servo_stop(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::ServoStop),
            self.config.motion_timeout(),
        )
    }

    /// 停止速度运动
    pub fn speed_stop(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::SpeedStop),
            self.config.motion_timeout(),
        )
    }

    // ==================== jog / 示教 / 杂项 ====================

    /// 以给定速度旋量开始 jog；重复调用可更新速度向量
    pub fn jog_start(&self, speeds: SpeedVector, feature: Feature) -> Result<(), ClientError> {
        check_finite("jog speeds", &speeds)?;
        self.execute_stream(
            ControlCommand::new(CommandOpcode::JogStart)
                .with_doubles(0, &speeds)
                .with_int(1, feature as i32),
        )
    }

    pub fn jog_stop(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::JogStop),
            self.config.motion_timeout(),
        )
    }

    /// 进入自由驱动（示教）模式
    pub fn teach_mode(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::TeachMode),
            self.config.motion_timeout(),
        )
    }

    pub fn end_teach_mode(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::EndTeachMode),
            self.config.motion_timeout(),
        )
    }

    /// 力传感器置零
    pub fn zero_ft_sensor(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::ZeroFtSensor),
            self.config.motion_timeout(),
        )
    }

    /// 设置负载；`cog = None` 时沿用控制器当前重心
    pub fn set_payload(&self, mass: f64, cog: Option<[f64; 3]>) -> Result<(), ClientError> {
        check_range("payload mass", mass, limits::PAYLOAD_MASS)?;
        let mut command =
            ControlCommand::new(CommandOpcode::SetPayload).with_double(0, mass);
        if let Some(cog) = cog {
            check_finite("payload cog", &cog)?;
            command = command.with_doubles(1, &cog).with_int(1, 1);
        }
        self.execute_sync(command, self.config.motion_timeout())
    }

    /// 设置 TCP 偏移
    pub fn set_tcp(&self, tcp_offset: Pose) -> Result<(), ClientError> {
        check_finite("tcp offset", &tcp_offset)?;
        self.execute_sync(
            ControlCommand::new(CommandOpcode::SetTcp).with_doubles(0, &tcp_offset),
            self.config.motion_timeout(),
        )
    }

    /// 触发保护停（测试/调试用）
    pub fn trigger_protective_stop(&self) -> Result<(), ClientError> {
        self.execute_sync(
            ControlCommand::new(CommandOpcode::TriggerProtectiveStop),
            self.config.motion_timeout(),
        )
    }

    // ==================== 路径执行 ====================

    /// 执行路径
    ///
    /// 路径渲染成程序文本整体上传（航点数不受寄存器宽度限制），
    /// 进度经异步进度寄存器上报，每完成一个航点加一。同步模式等到
    /// 路径程序报告完成后重传主控制程序；异步模式上传后立即返回，
    /// 进度回到 -1 即结束，之后需调用
    /// [`reupload_program`](Self::reupload_program) 恢复命令通道。
    pub fn move_path(&self, path: &Path, asynchronous: bool) -> Result<(), ClientError> {
        if path.is_empty() {
            return Err(ClientError::EmptyPath);
        }
        for entry in path.entries() {
            entry.validate()?;
        }

        self.wait_ready()?;
        self.programs.upload_text(&path.to_program())?;
        debug!("path program uploaded ({} waypoints)", path.len());
        if asynchronous {
            return Ok(());
        }

        self.wait_done(self.config.path_timeout())?;
        // 路径程序退出后恢复主控制程序
        self.programs.upload()?;
        self.wait_ready()?;
        Ok(())
    }

    // ==================== 运动学查询（控制器侧计算） ====================

    /// 正运动学：关节角 -> 位姿
    pub fn forward_kinematics(
        &self,
        q: Joints,
        tcp_offset: Option<Pose>,
    ) -> Result<Pose, ClientError> {
        check_finite("joints", &q)?;
        let mut command =
            ControlCommand::new(CommandOpcode::ForwardKinematics).with_doubles(0, &q);
        if let Some(offset) = tcp_offset {
            check_finite("tcp offset", &offset)?;
            command = command.with_doubles(6, &offset).with_int(1, 1);
        }
        let (_, pose) = self.execute_query(command)?;
        Ok(pose)
    }

    /// 逆运动学：位姿 -> 关节角；无解时返回错误而不是占位值
    pub fn inverse_kinematics(
        &self,
        pose: Pose,
        seed: Option<Joints>,
        max_position_error: f64,
        max_orientation_error: f64,
    ) -> Result<Joints, ClientError> {
        check_finite("target pose", &pose)?;
        check_range("max position error", max_position_error, (0.0, 1.0))?;
        check_range("max orientation error", max_orientation_error, (0.0, 1.0))?;
        let mut command = ControlCommand::new(CommandOpcode::InverseKinematics)
            .with_doubles(0, &pose)
            .with_double(12, max_position_error)
            .with_double(13, max_orientation_error);
        if let Some(seed) = seed {
            check_finite("seed joints", &seed)?;
            command = command.with_doubles(6, &seed).with_int(1, 1);
        }
        let (found, q) = self.execute_query(command)?;
        if found == 0 {
            return Err(ClientError::NoSolution);
        }
        Ok(q)
    }

    /// 位姿复合：从 `p_from` 出发再做 `p_from_to`
    pub fn pose_trans(&self, p_from: Pose, p_from_to: Pose) -> Result<Pose, ClientError> {
        check_finite("from pose", &p_from)?;
        check_finite("relative pose", &p_from_to)?;
        let (_, pose) = self.execute_query(
            ControlCommand::new(CommandOpcode::PoseTrans)
                .with_doubles(0, &p_from)
                .with_doubles(6, &p_from_to),
        )?;
        Ok(pose)
    }

    /// 位姿是否在当前安全限制内（逆解可达即视为可达）
    pub fn is_pose_within_safety_limits(&self, pose: Pose) -> Result<bool, ClientError> {
        check_finite("pose", &pose)?;
        let (result, _) = self.execute_query(
            ControlCommand::new(CommandOpcode::IsPoseWithinSafetyLimits).with_doubles(0, &pose),
        )?;
        Ok(result != 0)
    }

    /// 关节位置是否在当前安全限制内
    pub fn is_joints_within_safety_limits(&self, q: Joints) -> Result<bool, ClientError> {
        check_finite("joints", &q)?;
        let (result, _) = self.execute_query(
            ControlCommand::new(CommandOpcode::IsJointsWithinSafetyLimits).with_doubles(0, &q),
        )?;
        Ok(result != 0)
    }

    /// 机械臂是否完全静止
    pub fn is_steady(&self) -> Result<bool, ClientError> {
        let (result, _) = self.execute_query(ControlCommand::new(CommandOpcode::IsSteady))?;
        Ok(result != 0)
    }

    /// 工具接触检测；返回接触开始前的时间步数（0 = 无接触）
    pub fn tool_contact(&self, direction: SpeedVector) -> Result<i32, ClientError> {
        check_finite("contact direction", &direction)?;
        let (steps, _) = self.execute_query(
            ControlCommand::new(CommandOpcode::ToolContact).with_doubles(0, &direction),
        )?;
        Ok(steps)
    }

    /// 控制器时间步长（秒）
    pub fn get_step_time(&self) -> Result<f64, ClientError> {
        let (_, results) =
            self.execute_query(ControlCommand::new(CommandOpcode::GetStepTime))?;
        Ok(results[0])
    }

    /// 当前活动运动的目标航点
    pub fn get_target_waypoint(&self) -> Result<Pose, ClientError> {
        let (_, pose) =
            self.execute_query(ControlCommand::new(CommandOpcode::GetTargetWaypoint))?;
        Ok(pose)
    }

    /// 当前 TCP 偏移
    pub fn get_tcp_offset(&self) -> Result<Pose, ClientError> {
        let (_, pose) = self.execute_query(ControlCommand::new(CommandOpcode::GetTcpOffset))?;
        Ok(pose)
    }

    /// 各关节力矩 [Nm]
    pub fn get_joint_torques(&self) -> Result<Joints, ClientError> {
        let (_, torques) =
            self.execute_query(ControlCommand::new(CommandOpcode::GetJointTorques))?;
        Ok(torques)
    }

    // ==================== watchdog ====================

    /// 使能 watchdog（每会话恰好一次）；`None` 用默认 10 Hz
    pub fn set_watchdog(&self, min_hz: Option<f64>) -> Result<(), ClientError> {
        let min_hz = min_hz.unwrap_or(lynx_driver::DEFAULT_WATCHDOG_MIN_HZ);
        check_range("watchdog frequency", min_hz, limits::WATCHDOG_MIN_HZ)?;
        self.session.enable_watchdog(min_hz)?;
        Ok(())
    }

    /// 踢狗；失败（含未连接）如实上浮，不做静默
    pub fn kick_watchdog(&self) -> Result<(), ClientError> {
        self.session.kick_watchdog()?;
        Ok(())
    }

    // ==================== 程序与会话管理 ====================

    /// 重传主控制程序（路径/自定义程序之后恢复命令通道）
    pub fn reupload_program(&self) -> Result<(), ClientError> {
        self.programs.upload()?;
        self.wait_ready()
    }

    /// 上传并运行一段自定义程序（整体替换当前程序）
    pub fn send_custom_program(&self, program: &str) -> Result<(), ClientError> {
        self.programs.upload_text(program)
    }

    /// 把内联片段包装成函数上传执行
    pub fn send_custom_function(&self, name: &str, body: &str) -> Result<(), ClientError> {
        self.programs.upload_function(name, body)
    }

    /// 终止控制器侧程序
    pub fn stop_program(&self) -> Result<(), ClientError> {
        let command = self.control_command(ControlCommand::new(CommandOpcode::StopProgram))?;
        self.session.send(&command)?;
        Ok(())
    }

    /// 异步操作进度：-1 = 空闲，>= 0 = 当前航点/步序号
    pub fn async_progress(&self) -> i32 {
        self.session.async_progress()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// 显式重连：完整重做建联序列并恢复控制程序
    pub fn reconnect(&self) -> Result<(), ClientError> {
        self.session.reconnect()?;
        if self.config.upload_program {
            self.programs.upload()?;
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        self.programs.disconnect();
        self.session.disconnect();
    }

    // ==================== 内部 ====================

    fn control_command(&self, command: ControlCommand) -> Result<RobotCommand, ClientError> {
        let ids = self.session.recipe_ids()?;
        Ok(RobotCommand::new(ids.control, CommandPayload::Control(command)))
    }

    /// 运动命令：同步等待完成，或置异步标志后即发即回
    fn motion(&self, command: ControlCommand, asynchronous: bool) -> Result<(), ClientError> {
        if asynchronous {
            self.execute_stream(command.with_int(1, 1))
        } else {
            self.execute_sync(command, self.config.motion_timeout())
        }
    }

    /// 同步命令：就绪 → 发送 → 等完成 → 清除
    fn execute_sync(
        &self,
        command: ControlCommand,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        self.wait_ready()?;
        let command = self.control_command(command)?;
        self.session.send(&command)?;
        self.wait_done(timeout)?;
        self.send_clear()
    }

    /// 流式/异步命令：就绪后发送即返回，不等待完成
    fn execute_stream(&self, command: ControlCommand) -> Result<(), ClientError> {
        self.wait_ready()?;
        let command = self.control_command(command)?;
        self.session.send(&command)?;
        Ok(())
    }

    /// 查询命令：完成后从同一快照读结果寄存器
    fn execute_query(
        &self,
        command: ControlCommand,
    ) -> Result<(i32, [f64; 6]), ClientError> {
        self.wait_ready()?;
        let command = self.control_command(command)?;
        self.session.send(&command)?;
        let snapshot = self.wait_done(self.config.motion_timeout())?;
        let int_result = snapshot.int32(names::REG_INT_RESULT).unwrap_or(0);
        let mut results = [0.0; 6];
        for (i, slot) in results.iter_mut().enumerate() {
            *slot = snapshot.output_double_register(i as u32).unwrap_or(0.0);
        }
        self.send_clear()?;
        Ok((int_result, results))
    }

    /// 等待控制程序就绪；残留的完成态顺手清除
    fn wait_ready(&self) -> Result<(), ClientError> {
        let timeout = self.config.ready_timeout();
        let deadline = Instant::now() + timeout;
        let cycle = self.session.cycle_time();
        loop {
            match self.session.snapshot().command_state() {
                Some(names::COMMAND_STATE_READY) => return Ok(()),
                Some(names::COMMAND_STATE_DONE) => self.send_clear()?,
                _ => {},
            }
            if Instant::now() >= deadline {
                warn!("control program not ready within {timeout:?}");
                return Err(DriverError::Timeout(timeout).into());
            }
            spin_sleep::sleep(cycle);
        }
    }

    /// 轮询命令完成；超时返回错误但不取消控制器侧运动
    fn wait_done(&self, timeout: Duration) -> Result<Arc<StateSnapshot>, ClientError> {
        let deadline = Instant::now() + timeout;
        let cycle = self.session.cycle_time();
        loop {
            let snapshot = self.session.snapshot();
            if snapshot.command_state() == Some(names::COMMAND_STATE_DONE) {
                return Ok(snapshot);
            }
            if !self.session.is_connected() {
                return Err(DriverError::NotConnected.into());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(timeout).into());
            }
            spin_sleep::sleep(cycle);
        }
    }

    /// 清除已完成命令，使控制程序回到就绪态
    fn send_clear(&self) -> Result<(), ClientError> {
        let command = self.control_command(ControlCommand::new(CommandOpcode::NoCommand))?;
        self.session.send(&command)?;
        Ok(())
    }
}
