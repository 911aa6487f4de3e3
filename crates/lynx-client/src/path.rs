//! 路径：异构航点序列与程序文本渲染
//!
//! 路径长度无上界而寄存器银行定宽，所以路径不走逐周期寄存器，而是
//! 渲染成一段控制程序整体上传（见 `program`）。执行进度经异步进度
//! 寄存器上报，每完成一个航点加一。

use crate::error::ClientError;
use crate::types::{CircularMode, Pose, Target};
use crate::validation::{check_finite, check_range, limits};
use std::fmt::Write;

/// 单个航点
///
/// 每个航点携带自己的运动类型与动力学参数，同一条路径里可以混用。
#[derive(Debug, Clone, PartialEq)]
pub enum PathEntry {
    /// 关节空间运动（位姿目标经逆解）
    MoveJoint {
        target: Target,
        velocity: f64,
        acceleration: f64,
        blend: f64,
    },
    /// 直线运动
    MoveLinear {
        target: Target,
        velocity: f64,
        acceleration: f64,
        blend: f64,
    },
    /// 工艺运动（恒定工具速度）
    MoveProcess {
        target: Pose,
        velocity: f64,
        acceleration: f64,
        blend: f64,
    },
    /// 圆弧运动
    MoveCircular {
        via: Pose,
        target: Pose,
        velocity: f64,
        acceleration: f64,
        blend: f64,
        mode: CircularMode,
    },
}

impl PathEntry {
    /// 航点参数校验（路径执行前逐航点调用）
    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        match self {
            PathEntry::MoveJoint {
                target,
                velocity,
                acceleration,
                blend,
            } => {
                check_target(target)?;
                check_range("waypoint velocity", *velocity, limits::JOINT_VELOCITY)?;
                check_range(
                    "waypoint acceleration",
                    *acceleration,
                    limits::JOINT_ACCELERATION,
                )?;
                check_range("waypoint blend radius", *blend, limits::BLEND_RADIUS)?;
            },
            PathEntry::MoveLinear {
                target,
                velocity,
                acceleration,
                blend,
            } => {
                check_target(target)?;
                check_range("waypoint velocity", *velocity, limits::TOOL_VELOCITY)?;
                check_range(
                    "waypoint acceleration",
                    *acceleration,
                    limits::TOOL_ACCELERATION,
                )?;
                check_range("waypoint blend radius", *blend, limits::BLEND_RADIUS)?;
            },
            PathEntry::MoveProcess {
                target,
                velocity,
                acceleration,
                blend,
            } => {
                check_finite("waypoint pose", target)?;
                check_range("waypoint velocity", *velocity, limits::TOOL_VELOCITY)?;
                check_range(
                    "waypoint acceleration",
                    *acceleration,
                    limits::TOOL_ACCELERATION,
                )?;
                check_range("waypoint blend radius", *blend, limits::BLEND_RADIUS)?;
            },
            PathEntry::MoveCircular {
                via,
                target,
                velocity,
                acceleration,
                blend,
                ..
            } => {
                check_finite("waypoint via pose", via)?;
                check_finite("waypoint pose", target)?;
                check_range("waypoint velocity", *velocity, limits::TOOL_VELOCITY)?;
                check_range(
                    "waypoint acceleration",
                    *acceleration,
                    limits::TOOL_ACCELERATION,
                )?;
                check_range("waypoint blend radius", *blend, limits::BLEND_RADIUS)?;
            },
        }
        Ok(())
    }

    fn script_line(&self) -> String {
        match self {
            PathEntry::MoveJoint {
                target,
                velocity,
                acceleration,
                blend,
            } => match target {
                Target::Joints(q) => format!(
                    "movej({}, a = {acceleration:.6}, v = {velocity:.6}, r = {blend:.6})",
                    fmt_joints(q)
                ),
                Target::Pose(pose) => format!(
                    "movej(get_inverse_kin({}), a = {acceleration:.6}, v = {velocity:.6}, r = {blend:.6})",
                    fmt_pose(pose)
                ),
            },
            PathEntry::MoveLinear {
                target,
                velocity,
                acceleration,
                blend,
            } => match target {
                Target::Joints(q) => format!(
                    "movel(get_forward_kin({}), a = {acceleration:.6}, v = {velocity:.6}, r = {blend:.6})",
                    fmt_joints(q)
                ),
                Target::Pose(pose) => format!(
                    "movel({}, a = {acceleration:.6}, v = {velocity:.6}, r = {blend:.6})",
                    fmt_pose(pose)
                ),
            },
            PathEntry::MoveProcess {
                target,
                velocity,
                acceleration,
                blend,
            } => format!(
                "movep({}, a = {acceleration:.6}, v = {velocity:.6}, r = {blend:.6})",
                fmt_pose(target)
            ),
            PathEntry::MoveCircular {
                via,
                target,
                velocity,
                acceleration,
                blend,
                mode,
            } => format!(
                "movec({}, {}, a = {acceleration:.6}, v = {velocity:.6}, r = {blend:.6}, mode = {})",
                fmt_pose(via),
                fmt_pose(target),
                *mode as i32
            ),
        }
    }
}

fn check_target(target: &Target) -> Result<(), ClientError> {
    match target {
        Target::Joints(q) => check_finite("waypoint joints", q),
        Target::Pose(pose) => check_finite("waypoint pose", pose),
    }
}

fn fmt_joints(q: &[f64; 6]) -> String {
    format!(
        "[{:.6}, {:.6}, {:.6}, {:.6}, {:.6}, {:.6}]",
        q[0], q[1], q[2], q[3], q[4], q[5]
    )
}

fn fmt_pose(pose: &[f64; 6]) -> String {
    format!(
        "p[{:.6}, {:.6}, {:.6}, {:.6}, {:.6}, {:.6}]",
        pose[0], pose[1], pose[2], pose[3], pose[4], pose[5]
    )
}

/// 航点序列（长度无上界）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    entries: Vec<PathEntry>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: PathEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    /// 渲染为可上传的路径程序
    ///
    /// 程序自身维护进度寄存器：开始前与结束后为 -1，执行第 i 个
    /// 航点期间为 i；结束时写入完成状态。
    pub(crate) fn to_program(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# lynx-path waypoints={}", self.entries.len());
        out.push_str("def lynx_path():\n");
        out.push_str("  write_output_integer_register(1, -1)\n");
        for (index, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(out, "  write_output_integer_register(1, {index})");
            out.push_str("  ");
            out.push_str(&entry.script_line());
            out.push('\n');
        }
        out.push_str("  write_output_integer_register(1, -1)\n");
        out.push_str("  write_output_integer_register(0, 2)\n");
        out.push_str("end\n");
        out.push_str("lynx_path()\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Path {
        let mut path = Path::new();
        path.add_entry(PathEntry::MoveJoint {
            target: Target::Pose([-0.14, -0.4, 0.1, 0.0, 3.14, 0.0]),
            velocity: 0.5,
            acceleration: 4.0,
            blend: 0.0,
        });
        path.add_entry(PathEntry::MoveLinear {
            target: Target::Pose([-0.14, -0.4, 0.3, 0.0, 3.14, 0.0]),
            velocity: 0.5,
            acceleration: 4.0,
            blend: 0.099,
        });
        path
    }

    #[test]
    fn test_program_rendering() {
        let program = sample_path().to_program();
        assert!(program.starts_with("# lynx-path waypoints=2\n"));
        assert!(program.contains("write_output_integer_register(1, 0)\n"));
        assert!(program.contains("write_output_integer_register(1, 1)\n"));
        assert!(program.contains("movej(get_inverse_kin(p[-0.140000"));
        assert!(program.contains("movel(p[-0.140000"));
        assert!(program.ends_with("lynx_path()\n"));
        // 结束时进度回到 -1、状态置完成
        assert!(program.contains("  write_output_integer_register(1, -1)\n  write_output_integer_register(0, 2)\n"));
    }

    #[test]
    fn test_waypoint_validation() {
        let ok = PathEntry::MoveLinear {
            target: Target::Pose([0.0; 6]),
            velocity: 0.25,
            acceleration: 1.2,
            blend: 0.05,
        };
        assert!(ok.validate().is_ok());

        let bad_blend = PathEntry::MoveLinear {
            target: Target::Pose([0.0; 6]),
            velocity: 0.25,
            acceleration: 1.2,
            blend: 2.5,
        };
        assert!(bad_blend.validate().unwrap_err().is_invalid_argument());

        let nan_target = PathEntry::MoveJoint {
            target: Target::Joints([f64::NAN; 6]),
            velocity: 0.5,
            acceleration: 1.0,
            blend: 0.0,
        };
        assert!(nan_target.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_mixed_move_kinds() {
        let mut path = sample_path();
        path.add_entry(PathEntry::MoveCircular {
            via: [0.1, -0.5, 0.2, 0.0, 3.14, 0.0],
            target: [0.2, -0.4, 0.2, 0.0, 3.14, 0.0],
            velocity: 0.25,
            acceleration: 1.2,
            blend: 0.0,
            mode: CircularMode::Fixed,
        });
        let program = path.to_program();
        assert!(program.contains("movec(p[0.100000"));
        assert!(program.contains("mode = 1"));
        assert!(program.contains("waypoints=3"));
    }
}
