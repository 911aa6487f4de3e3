//! 包头与报文类型定义
//!
//! 控制通道上的每个报文都是 `u16 长度（含 3 字节包头） + u8 类型 + 载荷`。
//! 长度与所有多字节字段均为大端字节序。

use crate::ProtocolError;
use bytes::{BufMut, BytesMut};
use num_enum::TryFromPrimitive;

/// 包头长度（字节）：u16 长度 + u8 类型
pub const HEADER_SIZE: usize = 3;

/// 单个报文的最大总长度（受 u16 长度字段限制）
pub const MAX_PACKET_SIZE: usize = u16::MAX as usize;

/// 控制通道报文类型
///
/// 类型值为固件定义的外部契约，见 `handshake` 模块中各载荷的编解码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketKind {
    /// 协议版本协商请求/应答
    RequestProtocolVersion = 0x56,
    /// 控制器固件版本查询
    GetControllerVersion = 0x76,
    /// 控制器端文本消息（日志转发）
    TextMessage = 0x4D,
    /// 周期数据包（双向：输入命令 / 输出状态）
    DataPackage = 0x55,
    /// 输出 recipe 注册
    SetupOutputs = 0x4F,
    /// 输入 recipe 注册
    SetupInputs = 0x49,
    /// 开始同步
    Start = 0x53,
    /// 暂停同步
    Pause = 0x50,
}

/// 已解析的包头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub kind: PacketKind,
    /// 载荷长度（不含包头）
    pub body_len: usize,
}

impl PacketHeader {
    /// 从 3 字节包头解析
    pub fn decode(raw: [u8; HEADER_SIZE]) -> Result<Self, ProtocolError> {
        let total = u16::from_be_bytes([raw[0], raw[1]]);
        if (total as usize) < HEADER_SIZE {
            return Err(ProtocolError::InvalidLength(total));
        }
        let kind = PacketKind::try_from(raw[2])
            .map_err(|_| ProtocolError::UnknownPacketKind(raw[2]))?;
        Ok(Self {
            kind,
            body_len: total as usize - HEADER_SIZE,
        })
    }
}

/// 将一个完整报文（包头 + 载荷）编码进缓冲区
///
/// 载荷超过 u16 可表示的长度属于调用方错误（recipe 宽度受固件寄存器银行
/// 限制，正常路径不可能触及），以 `InvalidLength` 报出而不是截断。
pub fn encode_packet(kind: PacketKind, body: &[u8], buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let total = HEADER_SIZE + body.len();
    if total > MAX_PACKET_SIZE {
        return Err(ProtocolError::InvalidLength(u16::MAX));
    }
    buf.reserve(total);
    buf.put_u16(total as u16);
    buf.put_u8(kind as u8);
    buf.put_slice(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut buf = BytesMut::new();
        encode_packet(PacketKind::Start, &[0x01], &mut buf).unwrap();
        assert_eq!(buf.len(), 4);

        let header = PacketHeader::decode([buf[0], buf[1], buf[2]]).unwrap();
        assert_eq!(header.kind, PacketKind::Start);
        assert_eq!(header.body_len, 1);
        assert_eq!(buf[3], 0x01);
    }

    #[test]
    fn test_header_rejects_unknown_kind() {
        let err = PacketHeader::decode([0x00, 0x03, 0xEE]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketKind(0xEE)));
    }

    #[test]
    fn test_header_rejects_short_length() {
        // 长度字段小于包头自身长度
        let err = PacketHeader::decode([0x00, 0x02, 0x55]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(2)));
    }

    #[test]
    fn test_empty_body() {
        let mut buf = BytesMut::new();
        encode_packet(PacketKind::GetControllerVersion, &[], &mut buf).unwrap();
        let header = PacketHeader::decode([buf[0], buf[1], buf[2]]).unwrap();
        assert_eq!(header.body_len, 0);
    }
}
