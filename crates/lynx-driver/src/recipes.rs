//! 会话固定的输入 recipe 形状
//!
//! recipe ID 由控制器按注册顺序分配，且 `send_start` 之后不可再协商，
//! 因此会话建立时一次性按固定顺序注册全部输入 recipe，并把返回的 ID
//! 记录在 [`RecipeIds`] 里供命令分发使用。重连会按同样的顺序重做
//! 注册，得到与上次一致的 ID。

use lynx_protocol::names::{input_double_register, input_int_register};

/// 空命令 / watchdog 保活通道
pub fn no_command() -> Vec<String> {
    vec![input_int_register(23)]
}

pub fn standard_digital_out() -> Vec<String> {
    vec![
        "standard_digital_output_mask".to_string(),
        "standard_digital_output".to_string(),
    ]
}

pub fn tool_digital_out() -> Vec<String> {
    vec![
        "tool_digital_output_mask".to_string(),
        "tool_digital_output".to_string(),
    ]
}

pub fn speed_slider() -> Vec<String> {
    vec![
        "speed_slider_mask".to_string(),
        "speed_slider_fraction".to_string(),
    ]
}

pub fn analog_out() -> Vec<String> {
    vec![
        "standard_analog_output_mask".to_string(),
        "standard_analog_output_type".to_string(),
        "standard_analog_output_0".to_string(),
        "standard_analog_output_1".to_string(),
    ]
}

/// 宽控制 recipe：操作码 + 7 个整型参数 + 24 个双精度参数
pub fn control() -> Vec<String> {
    let mut names: Vec<String> = (0..8).map(input_int_register).collect();
    names.extend((0..24).map(input_double_register));
    names
}

/// 会话协商得到的输入 recipe ID 登记表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeIds {
    pub no_command: u8,
    pub standard_digital_out: u8,
    pub tool_digital_out: u8,
    pub speed_slider: u8,
    pub analog_out: u8,
    pub control: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_protocol::names::well_known_kind;

    #[test]
    fn test_all_recipe_variables_are_known() {
        for names in [
            no_command(),
            standard_digital_out(),
            tool_digital_out(),
            speed_slider(),
            analog_out(),
            control(),
        ] {
            for name in names {
                assert!(
                    well_known_kind(&name).is_some(),
                    "recipe variable {name} missing from vocabulary"
                );
            }
        }
    }

    #[test]
    fn test_control_recipe_width() {
        let names = control();
        assert_eq!(names.len(), 32);
        assert_eq!(names[0], "input_int_register_0");
        assert_eq!(names[8], "input_double_register_0");
    }
}
