//! 协议版本与控制器固件版本

use std::fmt;
use std::time::Duration;

/// 客户端请求的寄存器协议版本
pub const PROTOCOL_VERSION: u16 = 2;

/// 旧代固件的最大主版本号（该代及以下按 125 Hz 同步）
pub const LEGACY_MAJOR_MAX: u32 = 3;

/// 控制器固件版本，连接时获取一次，会话期间不变。
///
/// 决定两件事：
/// - 输出流的同步频率（旧代 125 Hz，新代 500 Hz）
/// - 上传控制程序时保留哪些版本门控区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerVersion {
    pub major: u32,
    pub minor: u32,
    pub bugfix: u32,
    pub build: u32,
}

impl ControllerVersion {
    pub fn new(major: u32, minor: u32, bugfix: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            bugfix,
            build,
        }
    }

    /// 该固件代际唯一接受的输出同步频率（Hz）
    pub fn cycle_frequency(&self) -> f64 {
        if self.major > LEGACY_MAJOR_MAX { 500.0 } else { 125.0 }
    }

    /// 一个控制周期的时长
    pub fn cycle_time(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.cycle_frequency())
    }

    /// 是否满足 (major, minor) 的最低版本要求
    pub fn satisfies(&self, major: u32, minor: u32) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }
}

impl fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.bugfix, self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_frequency_by_generation() {
        assert_eq!(ControllerVersion::new(3, 15, 0, 0).cycle_frequency(), 125.0);
        assert_eq!(ControllerVersion::new(5, 9, 0, 0).cycle_frequency(), 500.0);
        assert_eq!(
            ControllerVersion::new(5, 9, 0, 0).cycle_time(),
            Duration::from_millis(2)
        );
    }

    #[test]
    fn test_satisfies() {
        let v = ControllerVersion::new(5, 9, 0, 1010);
        assert!(v.satisfies(5, 1));
        assert!(v.satisfies(5, 9));
        assert!(v.satisfies(3, 15));
        assert!(!v.satisfies(5, 10));
        assert!(!v.satisfies(6, 0));
    }

    #[test]
    fn test_display() {
        let v = ControllerVersion::new(5, 9, 2, 1010);
        assert_eq!(v.to_string(), "5.9.2.1010");
    }
}
