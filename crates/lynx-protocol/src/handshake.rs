//! 建联阶段请求/应答载荷编解码
//!
//! 控制通道的非周期报文：版本协商、固件版本查询、recipe 注册、
//! 启停控制、文本消息。客户端与测试中的模拟控制器共用这份编解码，
//! 保证两端对外部契约的理解一致。

use crate::ProtocolError;
use crate::register::RegisterKind;
use crate::version::ControllerVersion;
use bytes::{Buf, BufMut, BytesMut};

/// recipe 注册应答中的单个类型条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEntry {
    Kind(RegisterKind),
    /// 固件不认识该变量名
    NotFound,
}

/// recipe 注册应答
///
/// `recipe_id == 0` 表示整体拒绝，`body` 为拒绝原因；否则 `body` 是
/// 与请求变量同序的逗号分隔类型名列表。
#[derive(Debug, Clone, PartialEq)]
pub struct SetupResponse {
    pub recipe_id: u8,
    pub body: String,
}

impl SetupResponse {
    pub fn is_rejected(&self) -> bool {
        self.recipe_id == 0
    }

    /// 解析类型名列表（`NOT_FOUND` 条目保留为 [`TypeEntry::NotFound`]）
    pub fn type_entries(&self) -> Result<Vec<TypeEntry>, ProtocolError> {
        self.body
            .split(',')
            .map(|raw| {
                let raw = raw.trim();
                if raw == "NOT_FOUND" {
                    Ok(TypeEntry::NotFound)
                } else {
                    RegisterKind::from_wire_name(raw).map(TypeEntry::Kind)
                }
            })
            .collect()
    }
}

/// 控制器文本消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLevel {
    Exception,
    Error,
    Warning,
    Info,
}

impl TextLevel {
    fn from_wire(raw: u8) -> Self {
        match raw {
            0 => TextLevel::Exception,
            1 => TextLevel::Error,
            2 => TextLevel::Warning,
            _ => TextLevel::Info,
        }
    }
}

fn utf8(body: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(body.to_vec()).map_err(|_| ProtocolError::InvalidText)
}

fn need(body: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if body.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: body.len(),
        });
    }
    Ok(())
}

// ---- 协议版本协商 ----

pub fn encode_version_request(version: u16, buf: &mut BytesMut) {
    buf.put_u16(version);
}

pub fn decode_version_request(body: &[u8]) -> Result<u16, ProtocolError> {
    need(body, 2)?;
    Ok(u16::from_be_bytes([body[0], body[1]]))
}

pub fn encode_accept(accepted: bool, buf: &mut BytesMut) {
    buf.put_u8(accepted as u8);
}

/// 解码启动/暂停/版本协商的单字节应答
pub fn decode_accept(body: &[u8]) -> Result<bool, ProtocolError> {
    need(body, 1)?;
    Ok(body[0] != 0)
}

// ---- 控制器固件版本 ----

pub fn encode_controller_version(version: &ControllerVersion, buf: &mut BytesMut) {
    buf.put_u32(version.major);
    buf.put_u32(version.minor);
    buf.put_u32(version.bugfix);
    buf.put_u32(version.build);
}

pub fn decode_controller_version(body: &[u8]) -> Result<ControllerVersion, ProtocolError> {
    need(body, 16)?;
    let mut body = body;
    Ok(ControllerVersion::new(
        body.get_u32(),
        body.get_u32(),
        body.get_u32(),
        body.get_u32(),
    ))
}

// ---- recipe 注册 ----

pub fn encode_output_setup_request(frequency: f64, names: &[String], buf: &mut BytesMut) {
    buf.put_f64(frequency);
    buf.put_slice(names.join(",").as_bytes());
}

pub fn decode_output_setup_request(body: &[u8]) -> Result<(f64, Vec<String>), ProtocolError> {
    need(body, 8)?;
    let mut body = body;
    let frequency = body.get_f64();
    let names = utf8(body)?;
    Ok((frequency, split_names(&names)))
}

pub fn encode_input_setup_request(names: &[String], buf: &mut BytesMut) {
    buf.put_slice(names.join(",").as_bytes());
}

pub fn decode_input_setup_request(body: &[u8]) -> Result<Vec<String>, ProtocolError> {
    Ok(split_names(&utf8(body)?))
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn encode_setup_response(recipe_id: u8, body: &str, buf: &mut BytesMut) {
    buf.put_u8(recipe_id);
    buf.put_slice(body.as_bytes());
}

pub fn decode_setup_response(body: &[u8]) -> Result<SetupResponse, ProtocolError> {
    need(body, 1)?;
    Ok(SetupResponse {
        recipe_id: body[0],
        body: utf8(&body[1..])?,
    })
}

// ---- 文本消息 ----

pub fn encode_text_message(level: u8, message: &str, buf: &mut BytesMut) {
    buf.put_u8(level);
    buf.put_slice(message.as_bytes());
}

pub fn decode_text_message(body: &[u8]) -> Result<(TextLevel, String), ProtocolError> {
    need(body, 1)?;
    Ok((TextLevel::from_wire(body[0]), utf8(&body[1..])?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_request_roundtrip() {
        let mut buf = BytesMut::new();
        encode_version_request(2, &mut buf);
        assert_eq!(decode_version_request(&buf).unwrap(), 2);
    }

    #[test]
    fn test_controller_version_roundtrip() {
        let version = ControllerVersion::new(5, 9, 2, 1010);
        let mut buf = BytesMut::new();
        encode_controller_version(&version, &mut buf);
        assert_eq!(decode_controller_version(&buf).unwrap(), version);
    }

    #[test]
    fn test_output_setup_roundtrip() {
        let names = vec!["actual_q".to_string(), "robot_status_bits".to_string()];
        let mut buf = BytesMut::new();
        encode_output_setup_request(500.0, &names, &mut buf);

        let (frequency, decoded) = decode_output_setup_request(&buf).unwrap();
        assert_eq!(frequency, 500.0);
        assert_eq!(decoded, names);
    }

    #[test]
    fn test_setup_response_type_entries() {
        let response = SetupResponse {
            recipe_id: 1,
            body: "VECTOR6D,NOT_FOUND,UINT32".to_string(),
        };
        let entries = response.type_entries().unwrap();
        assert_eq!(entries[0], TypeEntry::Kind(RegisterKind::Vector6d));
        assert_eq!(entries[1], TypeEntry::NotFound);
        assert_eq!(entries[2], TypeEntry::Kind(RegisterKind::UInt32));
    }

    #[test]
    fn test_setup_response_rejection() {
        let mut buf = BytesMut::new();
        encode_setup_response(0, "unsupported frequency 500", &mut buf);
        let response = decode_setup_response(&buf).unwrap();
        assert!(response.is_rejected());
        assert_eq!(response.body, "unsupported frequency 500");
    }

    #[test]
    fn test_text_message_levels() {
        let mut buf = BytesMut::new();
        encode_text_message(2, "joint 3 near limit", &mut buf);
        let (level, message) = decode_text_message(&buf).unwrap();
        assert_eq!(level, TextLevel::Warning);
        assert_eq!(message, "joint 3 near limit");
    }

    #[test]
    fn test_truncated_bodies() {
        assert!(decode_version_request(&[0x00]).is_err());
        assert!(decode_controller_version(&[0u8; 8]).is_err());
        assert!(decode_accept(&[]).is_err());
        assert!(decode_setup_response(&[]).is_err());
    }
}
