//! 控制程序的渲染与上传
//!
//! 内置模板经版本门控渲染出本会话唯一的程序文本（每会话渲染一次），
//! 或被调用方提供的自定义程序整体覆盖（自定义程序不做版本门控，
//! 读取失败回落到内置模板）。渲染结果原样写入脚本通道；"成功"即
//! 字节写完，程序的运行时正确性由控制器负责。

use crate::error::ClientError;
use crate::template;
use lynx_protocol::ControllerVersion;
use lynx_transport::{ScriptChannel, Transport};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 内置控制程序模板（含版本门控哨兵）
pub const CONTROL_PROGRAM_TEMPLATE: &str = include_str!("../templates/control.script");

pub struct ProgramManager {
    channel: ScriptChannel,
    version: ControllerVersion,
    custom_program: Option<PathBuf>,
    /// 本会话选定的程序文本（渲染一次，不逐调用重估）
    rendered: Mutex<Option<String>>,
}

impl ProgramManager {
    pub fn new(
        script_transport: Arc<dyn Transport>,
        connect_timeout: Duration,
        version: ControllerVersion,
        custom_program: Option<PathBuf>,
    ) -> Self {
        Self {
            channel: ScriptChannel::new(script_transport, connect_timeout),
            version,
            custom_program,
            rendered: Mutex::new(None),
        }
    }

    /// 本会话的控制程序文本
    pub fn program_text(&self) -> Result<String, ClientError> {
        let mut cached = self.rendered.lock();
        if let Some(text) = cached.as_ref() {
            return Ok(text.clone());
        }
        let text = self.resolve_program()?;
        *cached = Some(text.clone());
        Ok(text)
    }

    /// 上传（或重传）主控制程序
    pub fn upload(&self) -> Result<(), ClientError> {
        let text = self.program_text()?;
        self.channel.send_program(&text)?;
        Ok(())
    }

    /// 上传一段任意程序文本（路径程序、自定义片段）
    pub fn upload_text(&self, text: &str) -> Result<(), ClientError> {
        self.channel.send_program(text)?;
        Ok(())
    }

    /// 把内联片段包装成函数并立即执行
    ///
    /// 片段的每一行自动缩进到函数体内；片段需自带行尾换行。
    pub fn upload_function(&self, name: &str, body: &str) -> Result<(), ClientError> {
        let mut program = format!("def {name}():\n");
        for line in body.lines() {
            program.push_str("  ");
            program.push_str(line);
            program.push('\n');
        }
        program.push_str("end\n");
        program.push_str(name);
        program.push_str("()\n");
        self.upload_text(&program)
    }

    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    fn resolve_program(&self) -> Result<String, ClientError> {
        if let Some(path) = &self.custom_program {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    // 自定义程序整体覆盖，不做版本门控
                    info!("using custom control program {}", path.display());
                    return Ok(text);
                },
                Err(e) => {
                    warn!(
                        "custom control program {} unreadable ({e}), falling back to built-in",
                        path.display()
                    );
                },
            }
        }
        template::render(CONTROL_PROGRAM_TEMPLATE, &self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_protocol::CommandOpcode;
    use lynx_transport::mock::mock_link;
    use std::io::Write;

    fn manager_with(
        version: ControllerVersion,
        custom: Option<PathBuf>,
    ) -> (ProgramManager, lynx_transport::mock::MockListener) {
        let (transport, listener) = mock_link();
        (
            ProgramManager::new(
                Arc::new(transport),
                Duration::from_secs(1),
                version,
                custom,
            ),
            listener,
        )
    }

    /// 模板里 `cmd == N` 分发臂覆盖的操作码集合（版本门控行也计入）
    fn template_dispatch_arms() -> std::collections::HashSet<i32> {
        let marker = "cmd == ";
        CONTROL_PROGRAM_TEMPLATE
            .lines()
            .filter_map(|line| {
                let start = line.find(marker)? + marker.len();
                let rest = &line[start..];
                let end = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                rest[..end].parse().ok()
            })
            .collect()
    }

    #[test]
    fn test_template_dispatches_every_opcode() {
        let arms = template_dispatch_arms();
        // 客户端能发出的每个操作码都必须有分发臂，否则同步命令会
        // 落空并一直等到超时
        for raw in 0..=255 {
            if CommandOpcode::try_from(raw).is_ok() {
                assert!(arms.contains(&raw), "no dispatch arm for opcode {raw}");
            }
        }
    }

    #[test]
    fn test_template_resets_command_state_on_clear() {
        // NoCommand (0) 分发臂必须把完成态清回就绪态；没有这条转换，
        // 第二条同步命令的就绪等待只能等到超时
        let lines: Vec<&str> = CONTROL_PROGRAM_TEMPLATE.lines().collect();
        let arm = lines
            .iter()
            .position(|line| line.trim_start().starts_with("if cmd == 0:"))
            .expect("clear command arm missing");
        assert!(lines[arm + 1].contains("signal_ready()"));
    }

    #[test]
    fn test_builtin_template_renders_per_version() {
        let (manager, _listener) = manager_with(ControllerVersion::new(5, 9, 0, 0), None);
        let text = manager.program_text().unwrap();
        assert!(text.contains("lynx_control()"));
        assert!(!text.contains('$'));
        // (5,4) 门控区域在 5.9 下保留
        assert!(text.contains("jog_start"));

        let (manager, _listener) = manager_with(ControllerVersion::new(3, 15, 0, 0), None);
        let text = manager.program_text().unwrap();
        assert!(!text.contains("jog_start"));
    }

    #[test]
    fn test_rendered_once_and_cached() {
        let (manager, _listener) = manager_with(ControllerVersion::new(5, 9, 0, 0), None);
        let first = manager.program_text().unwrap();
        let second = manager.program_text().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_program_overrides_wholesale() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // 自定义程序里的哨兵原样保留：不做版本门控
        write!(file, "def mine():\n$9.9$ kept_as_is()\nend\n").unwrap();

        let (manager, _listener) = manager_with(
            ControllerVersion::new(5, 9, 0, 0),
            Some(file.path().to_path_buf()),
        );
        let text = manager.program_text().unwrap();
        assert!(text.contains("$9.9$ kept_as_is()"));
        assert!(!text.contains("lynx_control"));
    }

    #[test]
    fn test_unreadable_custom_program_falls_back() {
        let (manager, _listener) = manager_with(
            ControllerVersion::new(5, 9, 0, 0),
            Some(PathBuf::from("/nonexistent/custom.script")),
        );
        let text = manager.program_text().unwrap();
        assert!(text.contains("lynx_control()"));
    }

    #[test]
    fn test_upload_function_wraps_and_indents() {
        let (manager, listener) = manager_with(ControllerVersion::new(5, 9, 0, 0), None);
        manager
            .upload_function("blink", "set_digital_out(0, True)\nset_digital_out(0, False)\n")
            .unwrap();

        let mut peer = listener.accept(Duration::from_secs(1)).unwrap();
        let text = String::from_utf8(peer.recv_some(Duration::from_secs(1)).unwrap()).unwrap();
        assert!(text.starts_with("def blink():\n  set_digital_out(0, True)\n"));
        assert!(text.ends_with("end\nblink()\n"));
    }
}
