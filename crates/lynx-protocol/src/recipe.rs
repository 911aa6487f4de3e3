//! Recipe 描述符与数据包载荷编解码
//!
//! recipe 是一次会话内协商出的有序寄存器名列表，ID 由控制器在注册时
//! 分配。之后输入/输出数据包只携带 recipe ID 和按列表顺序紧排的值，
//! 本模块据此做布局检查和编解码。

use crate::ProtocolError;
use crate::register::{RegisterKind, RegisterValue};
use bytes::{Buf, BytesMut};
use smallvec::SmallVec;

/// 命令向 recipe 提供寄存器值的来源
///
/// 序列化按 recipe 的寄存器列表逐个取值，因此命令与 recipe 布局不匹配
/// 是一个可检查的错误（`UnboundRegister`），而不是静默的字节错位。
pub trait RegisterSource {
    fn register_value(&self, name: &str) -> Option<RegisterValue>;
}

/// 协商完成的 recipe
///
/// 会话建立时创建一次，之后不可变。输出 recipe 单个，输入 recipe 按
/// 命令形状多个。
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDescriptor {
    id: u8,
    variables: Vec<String>,
    kinds: Vec<RegisterKind>,
}

impl RecipeDescriptor {
    pub fn new(
        id: u8,
        variables: Vec<String>,
        kinds: Vec<RegisterKind>,
    ) -> Result<Self, ProtocolError> {
        if variables.len() != kinds.len() {
            return Err(ProtocolError::Truncated {
                expected: variables.len(),
                actual: kinds.len(),
            });
        }
        Ok(Self {
            id,
            variables,
            kinds,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn kinds(&self) -> &[RegisterKind] {
        &self.kinds
    }

    /// 数据包载荷长度（不含 recipe ID 字节）
    pub fn payload_size(&self) -> usize {
        self.kinds.iter().map(|k| k.wire_size()).sum()
    }

    /// 按布局从 `source` 取值并编码载荷
    pub fn encode_payload(
        &self,
        source: &impl RegisterSource,
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        for (name, kind) in self.variables.iter().zip(&self.kinds) {
            let value = source
                .register_value(name)
                .ok_or_else(|| ProtocolError::UnboundRegister {
                    recipe_id: self.id,
                    name: name.clone(),
                })?;
            if value.kind() != *kind {
                return Err(ProtocolError::KindMismatch {
                    expected: *kind,
                    actual: value.kind(),
                });
            }
            value.encode(buf);
        }
        Ok(())
    }

    /// 按布局解码载荷，返回与寄存器列表同序的值
    ///
    /// 载荷长度必须与布局严格一致，多余或不足都视为解码错误。
    pub fn decode_payload(
        &self,
        mut body: &[u8],
    ) -> Result<SmallVec<[RegisterValue; 16]>, ProtocolError> {
        let mut values = SmallVec::with_capacity(self.kinds.len());
        for kind in &self.kinds {
            values.push(RegisterValue::decode(*kind, &mut body)?);
        }
        if body.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(body.remaining()));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapSource(Vec<(&'static str, RegisterValue)>);

    impl RegisterSource for MapSource {
        fn register_value(&self, name: &str) -> Option<RegisterValue> {
            self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v.clone())
        }
    }

    fn mask_level_recipe() -> RecipeDescriptor {
        RecipeDescriptor::new(
            2,
            vec![
                "standard_digital_output_mask".into(),
                "standard_digital_output".into(),
            ],
            vec![RegisterKind::UInt8, RegisterKind::UInt8],
        )
        .unwrap()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let recipe = mask_level_recipe();
        let source = MapSource(vec![
            ("standard_digital_output_mask", RegisterValue::UInt8(0b1000)),
            ("standard_digital_output", RegisterValue::UInt8(0b1000)),
        ]);

        let mut buf = BytesMut::new();
        recipe.encode_payload(&source, &mut buf).unwrap();
        assert_eq!(buf.len(), recipe.payload_size());

        let values = recipe.decode_payload(&buf).unwrap();
        assert_eq!(values[0], RegisterValue::UInt8(0b1000));
        assert_eq!(values[1], RegisterValue::UInt8(0b1000));
    }

    #[test]
    fn test_encode_rejects_unbound_register() {
        let recipe = mask_level_recipe();
        let source = MapSource(vec![(
            "standard_digital_output_mask",
            RegisterValue::UInt8(1),
        )]);

        let mut buf = BytesMut::new();
        let err = recipe.encode_payload(&source, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnboundRegister { recipe_id: 2, .. }
        ));
    }

    #[test]
    fn test_encode_rejects_kind_mismatch() {
        let recipe = mask_level_recipe();
        let source = MapSource(vec![
            ("standard_digital_output_mask", RegisterValue::UInt32(1)),
            ("standard_digital_output", RegisterValue::UInt8(1)),
        ]);

        let mut buf = BytesMut::new();
        let err = recipe.encode_payload(&source, &mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::KindMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let recipe = mask_level_recipe();
        let err = recipe.decode_payload(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let recipe = mask_level_recipe();
        let err = recipe.decode_payload(&[1]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }
}
