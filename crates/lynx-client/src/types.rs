//! 客户端基础类型

/// 关节向量 [J1..J6]（弧度）
pub type Joints = [f64; 6];

/// 位姿向量 [X, Y, Z, Rx, Ry, Rz]（米 / 旋转向量）
pub type Pose = [f64; 6];

/// 速度旋量 [vx, vy, vz, wx, wy, wz]
pub type SpeedVector = [f64; 6];

/// jog 的参考坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// 基座坐标系
    Base = 0,
    /// 工具坐标系
    Tool = 1,
}

/// 圆弧运动的姿态插值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircularMode {
    /// 从当前姿态插值到目标姿态
    Unconstrained = 0,
    /// 姿态相对弧线切向保持不变
    Fixed = 1,
}

/// 路径航点的目标表达：关节空间或位姿空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Joints(Joints),
    Pose(Pose),
}
