//! 寄存器类型与值的编解码
//!
//! 固件暴露的每个寄存器槽位都有固定的线上类型。recipe 注册应答中，
//! 控制器以逗号分隔的类型名列表告知每个变量的实际类型，本模块负责
//! 类型名解析与值的大端编解码。

use crate::ProtocolError;
use bytes::{Buf, BufMut, BytesMut};

/// 寄存器线上类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterKind {
    Bool,
    UInt8,
    UInt32,
    UInt64,
    Int32,
    Double,
    Vector3d,
    Vector6d,
    Vector6Int32,
}

impl RegisterKind {
    /// 线上编码长度（字节）
    pub fn wire_size(self) -> usize {
        match self {
            RegisterKind::Bool | RegisterKind::UInt8 => 1,
            RegisterKind::UInt32 | RegisterKind::Int32 => 4,
            RegisterKind::UInt64 | RegisterKind::Double => 8,
            RegisterKind::Vector3d => 24,
            RegisterKind::Vector6d => 48,
            RegisterKind::Vector6Int32 => 24,
        }
    }

    /// 固件类型名（recipe 注册应答中的拼写）
    pub fn wire_name(self) -> &'static str {
        match self {
            RegisterKind::Bool => "BOOL",
            RegisterKind::UInt8 => "UINT8",
            RegisterKind::UInt32 => "UINT32",
            RegisterKind::UInt64 => "UINT64",
            RegisterKind::Int32 => "INT32",
            RegisterKind::Double => "DOUBLE",
            RegisterKind::Vector3d => "VECTOR3D",
            RegisterKind::Vector6d => "VECTOR6D",
            RegisterKind::Vector6Int32 => "VECTOR6INT32",
        }
    }

    /// 解析固件类型名
    pub fn from_wire_name(name: &str) -> Result<Self, ProtocolError> {
        match name {
            "BOOL" => Ok(RegisterKind::Bool),
            "UINT8" => Ok(RegisterKind::UInt8),
            "UINT32" => Ok(RegisterKind::UInt32),
            "UINT64" => Ok(RegisterKind::UInt64),
            "INT32" => Ok(RegisterKind::Int32),
            "DOUBLE" => Ok(RegisterKind::Double),
            "VECTOR3D" => Ok(RegisterKind::Vector3d),
            "VECTOR6D" => Ok(RegisterKind::Vector6d),
            "VECTOR6INT32" => Ok(RegisterKind::Vector6Int32),
            other => Err(ProtocolError::UnknownRegisterKind(other.to_string())),
        }
    }
}

/// 带类型标签的寄存器值
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterValue {
    Bool(bool),
    UInt8(u8),
    UInt32(u32),
    UInt64(u64),
    Int32(i32),
    Double(f64),
    Vector3d([f64; 3]),
    Vector6d([f64; 6]),
    Vector6Int32([i32; 6]),
}

impl RegisterValue {
    pub fn kind(&self) -> RegisterKind {
        match self {
            RegisterValue::Bool(_) => RegisterKind::Bool,
            RegisterValue::UInt8(_) => RegisterKind::UInt8,
            RegisterValue::UInt32(_) => RegisterKind::UInt32,
            RegisterValue::UInt64(_) => RegisterKind::UInt64,
            RegisterValue::Int32(_) => RegisterKind::Int32,
            RegisterValue::Double(_) => RegisterKind::Double,
            RegisterValue::Vector3d(_) => RegisterKind::Vector3d,
            RegisterValue::Vector6d(_) => RegisterKind::Vector6d,
            RegisterValue::Vector6Int32(_) => RegisterKind::Vector6Int32,
        }
    }

    /// 指定类型的零值（未收到任何数据前的占位）
    pub fn zero_of(kind: RegisterKind) -> Self {
        match kind {
            RegisterKind::Bool => RegisterValue::Bool(false),
            RegisterKind::UInt8 => RegisterValue::UInt8(0),
            RegisterKind::UInt32 => RegisterValue::UInt32(0),
            RegisterKind::UInt64 => RegisterValue::UInt64(0),
            RegisterKind::Int32 => RegisterValue::Int32(0),
            RegisterKind::Double => RegisterValue::Double(0.0),
            RegisterKind::Vector3d => RegisterValue::Vector3d([0.0; 3]),
            RegisterKind::Vector6d => RegisterValue::Vector6d([0.0; 6]),
            RegisterKind::Vector6Int32 => RegisterValue::Vector6Int32([0; 6]),
        }
    }

    /// 大端编码
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            RegisterValue::Bool(v) => buf.put_u8(*v as u8),
            RegisterValue::UInt8(v) => buf.put_u8(*v),
            RegisterValue::UInt32(v) => buf.put_u32(*v),
            RegisterValue::UInt64(v) => buf.put_u64(*v),
            RegisterValue::Int32(v) => buf.put_i32(*v),
            RegisterValue::Double(v) => buf.put_f64(*v),
            RegisterValue::Vector3d(v) => {
                for x in v {
                    buf.put_f64(*x);
                }
            },
            RegisterValue::Vector6d(v) => {
                for x in v {
                    buf.put_f64(*x);
                }
            },
            RegisterValue::Vector6Int32(v) => {
                for x in v {
                    buf.put_i32(*x);
                }
            },
        }
    }

    /// 从缓冲区按类型解码
    pub fn decode(kind: RegisterKind, buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let need = kind.wire_size();
        if buf.remaining() < need {
            return Err(ProtocolError::Truncated {
                expected: need,
                actual: buf.remaining(),
            });
        }
        let value = match kind {
            RegisterKind::Bool => RegisterValue::Bool(buf.get_u8() != 0),
            RegisterKind::UInt8 => RegisterValue::UInt8(buf.get_u8()),
            RegisterKind::UInt32 => RegisterValue::UInt32(buf.get_u32()),
            RegisterKind::UInt64 => RegisterValue::UInt64(buf.get_u64()),
            RegisterKind::Int32 => RegisterValue::Int32(buf.get_i32()),
            RegisterKind::Double => RegisterValue::Double(buf.get_f64()),
            RegisterKind::Vector3d => {
                let mut v = [0.0; 3];
                for x in &mut v {
                    *x = buf.get_f64();
                }
                RegisterValue::Vector3d(v)
            },
            RegisterKind::Vector6d => {
                let mut v = [0.0; 6];
                for x in &mut v {
                    *x = buf.get_f64();
                }
                RegisterValue::Vector6d(v)
            },
            RegisterKind::Vector6Int32 => {
                let mut v = [0; 6];
                for x in &mut v {
                    *x = buf.get_i32();
                }
                RegisterValue::Vector6Int32(v)
            },
        };
        Ok(value)
    }

    // ---- 便捷取值（类型不符返回 None，由调用方决定语义） ----

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RegisterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            RegisterValue::UInt8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RegisterValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            RegisterValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            RegisterValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RegisterValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3d(&self) -> Option<[f64; 3]> {
        match self {
            RegisterValue::Vector3d(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector6d(&self) -> Option<[f64; 6]> {
        match self {
            RegisterValue::Vector6d(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector6i32(&self) -> Option<[i32; 6]> {
        match self {
            RegisterValue::Vector6Int32(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: RegisterValue) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        assert_eq!(buf.len(), value.kind().wire_size());
        let decoded = RegisterValue::decode(value.kind(), &mut buf.freeze()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_scalar_roundtrip() {
        roundtrip(RegisterValue::Bool(true));
        roundtrip(RegisterValue::UInt8(0xAB));
        roundtrip(RegisterValue::UInt32(0xDEAD_BEEF));
        roundtrip(RegisterValue::UInt64(0x0123_4567_89AB_CDEF));
        roundtrip(RegisterValue::Int32(-42));
        roundtrip(RegisterValue::Double(-0.5235));
    }

    #[test]
    fn test_vector_roundtrip() {
        roundtrip(RegisterValue::Vector3d([1.0, -2.0, 3.5]));
        roundtrip(RegisterValue::Vector6d([0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));
        roundtrip(RegisterValue::Vector6Int32([1, 0, -1, 7, 0, 3]));
    }

    #[test]
    fn test_double_is_big_endian() {
        let mut buf = BytesMut::new();
        RegisterValue::Double(1.0).encode(&mut buf);
        assert_eq!(&buf[..], &[0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_truncated() {
        let mut short: &[u8] = &[0x00, 0x01];
        let err = RegisterValue::decode(RegisterKind::Double, &mut short).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { expected: 8, actual: 2 }));
    }

    #[test]
    fn test_wire_name_roundtrip() {
        for kind in [
            RegisterKind::Bool,
            RegisterKind::UInt8,
            RegisterKind::UInt32,
            RegisterKind::UInt64,
            RegisterKind::Int32,
            RegisterKind::Double,
            RegisterKind::Vector3d,
            RegisterKind::Vector6d,
            RegisterKind::Vector6Int32,
        ] {
            assert_eq!(RegisterKind::from_wire_name(kind.wire_name()).unwrap(), kind);
        }
        assert!(RegisterKind::from_wire_name("FLOAT128").is_err());
    }
}
