//! 控制程序模板的版本门控预处理器
//!
//! 模板里按固件版本裁剪的区域用行内哨兵标注，语法（逐行处理）：
//!
//! ```text
//! region     = indent "$" major "." minor "$" [" "] content newline
//! major      = 1*DIGIT
//! minor      = 1*DIGIT
//! ```
//!
//! 行内容（跳过前导空白后）以 `$<major>.<minor>$` 开头的行是版本
//! 门控区域：协商出的控制器版本满足要求时去掉哨兵保留该行（缩进
//! 原样保留），否则连同行尾换行一起删除。版本分量允许多位数字；
//! 哨兵残缺（缺少收尾 `$`、分量不是数字）是模板错误而不是静默
//! 保留。每个会话渲染一次，不逐调用重估。

use crate::error::ClientError;
use lynx_protocol::ControllerVersion;
use semver::Version;

/// 按 `version` 渲染模板
pub fn render(template: &str, version: &ControllerVersion) -> Result<String, ClientError> {
    let actual = Version::new(version.major as u64, version.minor as u64, 0);
    let mut out = String::with_capacity(template.len());

    for (line_no, line) in template.split_inclusive('\n').enumerate() {
        let content = line.trim_start_matches([' ', '\t']);
        let indent = &line[..line.len() - content.len()];

        let Some(rest) = content.strip_prefix('$') else {
            out.push_str(line);
            continue;
        };
        let required = parse_sentinel(rest)
            .ok_or_else(|| ClientError::Template(format!("bad version sentinel at line {}", line_no + 1)))?;
        let (required, body) = required;

        if actual >= required {
            // 保留：去哨兵、保留缩进（哨兵后允许一个分隔空格）
            out.push_str(indent);
            out.push_str(body.strip_prefix(' ').unwrap_or(body));
        }
        // 不满足版本要求：整行（含换行）删除
    }
    Ok(out)
}

/// 解析 `<major>.<minor>$` 前缀，返回所需版本与剩余内容
fn parse_sentinel(rest: &str) -> Option<(Version, &str)> {
    let end = rest.find('$')?;
    let (major, minor) = rest[..end].split_once('.')?;
    let major: u64 = major.parse().ok()?;
    let minor: u64 = minor.parse().ok()?;
    Some((Version::new(major, minor, 0), &rest[end + 1..]))
}
