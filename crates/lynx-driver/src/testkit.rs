//! 模拟控制器（mock feature）
//!
//! 协议感知的控制器仿真，跑在 `lynx_transport::mock` 的内存链路上：
//! 应答版本协商、按注册顺序分配 recipe ID、以协商频率流式发送状态
//! 包、把数字输出命令回写进状态流、按脚本播放异步进度序列。
//! 覆盖驱动层与客户端集成测试所需的全部控制器行为，不模拟运动学。

use bytes::BytesMut;
use lynx_protocol::handshake;
use lynx_protocol::names::{self, well_known_kind};
use lynx_protocol::packet::{self, HEADER_SIZE, PacketHeader, PacketKind};
use lynx_protocol::{
    CommandOpcode, ControllerVersion, RecipeDescriptor, RegisterValue,
};
use lynx_transport::mock::{MockListener, MockPeer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 仿真行为配置
#[derive(Debug, Clone)]
pub struct MockControllerConfig {
    pub version: ControllerVersion,
    pub accept_protocol: bool,
    pub accepted_frequencies: Vec<f64>,
    /// 同步命令是否立即完成（false 可用于测试同步等待超时）
    pub instant_done: bool,
    /// 异步运动收到后播放的进度序列（不含首尾的 -1）
    pub progress_script: Vec<i32>,
    /// 每个进度值持续的周期数
    pub progress_step_cycles: u32,
    /// 逆解结果；`None` 模拟无解
    pub ik_solution: Option<[f64; 6]>,
    /// 位姿类查询的应答
    pub pose_result: [f64; 6],
    pub actual_q: [f64; 6],
    pub tool_contact_steps: i32,
}

impl Default for MockControllerConfig {
    fn default() -> Self {
        Self {
            version: ControllerVersion::new(5, 9, 0, 1010),
            accept_protocol: true,
            accepted_frequencies: vec![125.0, 500.0],
            instant_done: true,
            progress_script: Vec::new(),
            progress_step_cycles: 5,
            ik_solution: Some([-1.54, -1.83, -2.28, -0.59, 1.60, 0.023]),
            pose_result: [0.28, -0.4, 0.1, 0.0, 3.14, 0.0],
            actual_q: [0.0, -1.57, 0.0, -1.57, 0.0, 0.0],
            tool_contact_steps: 0,
        }
    }
}

/// 测试可见的仿真状态
pub struct MockShared {
    pub sessions: AtomicUsize,
    pub input_packages: AtomicUsize,
    pub watchdog_kicks: AtomicUsize,
    pub watchdog_hz: Mutex<Option<f64>>,
    pub digital_out_bits: AtomicU64,
    pub tool_out_bits: AtomicU64,
    pub speed_slider: Mutex<Option<f64>>,
    pub analog_out: Mutex<Option<(u8, u8, f64, f64)>>,
    pub uploaded_programs: Mutex<Vec<String>>,
    pub last_control_opcode: Mutex<Option<i32>>,

    command_state: AtomicI32,
    progress: AtomicI32,
    int_result: AtomicI32,
    double_results: Mutex<[f64; 6]>,
    program_running: AtomicBool,
    pending_playback: Mutex<Option<Vec<i32>>>,
}

impl MockShared {
    fn new() -> Self {
        Self {
            sessions: AtomicUsize::new(0),
            input_packages: AtomicUsize::new(0),
            watchdog_kicks: AtomicUsize::new(0),
            watchdog_hz: Mutex::new(None),
            digital_out_bits: AtomicU64::new(0),
            tool_out_bits: AtomicU64::new(0),
            speed_slider: Mutex::new(None),
            analog_out: Mutex::new(None),
            uploaded_programs: Mutex::new(Vec::new()),
            last_control_opcode: Mutex::new(None),
            command_state: AtomicI32::new(names::COMMAND_STATE_READY),
            progress: AtomicI32::new(names::ASYNC_PROGRESS_IDLE),
            int_result: AtomicI32::new(0),
            double_results: Mutex::new([0.0; 6]),
            program_running: AtomicBool::new(true),
            pending_playback: Mutex::new(None),
        }
    }

    pub fn command_state(&self) -> i32 {
        self.command_state.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> i32 {
        self.progress.load(Ordering::Acquire)
    }
}

/// 运行中的模拟控制器
pub struct MockController {
    pub shared: Arc<MockShared>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl MockController {
    /// 仅实时通道
    pub fn spawn(listener: MockListener, cfg: MockControllerConfig) -> Self {
        Self::spawn_inner(listener, None, cfg)
    }

    /// 实时通道 + 脚本通道
    pub fn spawn_with_script(
        listener: MockListener,
        script_listener: MockListener,
        cfg: MockControllerConfig,
    ) -> Self {
        Self::spawn_inner(listener, Some(script_listener), cfg)
    }

    fn spawn_inner(
        listener: MockListener,
        script_listener: Option<MockListener>,
        cfg: MockControllerConfig,
    ) -> Self {
        let shared = Arc::new(MockShared::new());
        let stop = Arc::new(AtomicBool::new(false));
        let mut threads = Vec::new();

        {
            let shared = shared.clone();
            let stop = stop.clone();
            let cfg = cfg.clone();
            threads.push(
                std::thread::Builder::new()
                    .name("mock-realtime".to_string())
                    .spawn(move || realtime_thread(listener, shared, cfg, stop))
                    .unwrap(),
            );
        }
        if let Some(script_listener) = script_listener {
            let shared = shared.clone();
            let stop = stop.clone();
            threads.push(
                std::thread::Builder::new()
                    .name("mock-script".to_string())
                    .spawn(move || script_thread(script_listener, shared, stop))
                    .unwrap(),
            );
        }

        Self {
            shared,
            stop,
            threads,
        }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

// ---- 实时通道服务 ----

fn realtime_thread(
    listener: MockListener,
    shared: Arc<MockShared>,
    cfg: MockControllerConfig,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        let Some(mut peer) = listener.accept(Duration::from_millis(20)) else {
            continue;
        };
        shared.sessions.fetch_add(1, Ordering::Relaxed);
        // 新会话：命令通道回到就绪，进度空闲
        shared
            .command_state
            .store(names::COMMAND_STATE_READY, Ordering::Release);
        shared
            .progress
            .store(names::ASYNC_PROGRESS_IDLE, Ordering::Release);
        serve_session(&mut peer, &shared, &cfg, &stop);
    }
}

struct SessionState {
    started: bool,
    next_recipe_id: u8,
    frequency: f64,
    output: Option<RecipeDescriptor>,
    inputs: Vec<RecipeDescriptor>,
    sim_time: f64,
    /// (序列, 当前下标, 当前值已持续的周期数)
    playback: Option<(Vec<i32>, usize, u32)>,
}

fn serve_session(
    peer: &mut MockPeer,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
    stop: &Arc<AtomicBool>,
) {
    let mut state = SessionState {
        started: false,
        next_recipe_id: 1,
        frequency: 125.0,
        output: None,
        inputs: Vec::new(),
        sim_time: 0.0,
        playback: None,
    };
    let mut last_emit = Instant::now();
    let mut idle_polls = 0u32;

    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }

        match peer.recv_exact(HEADER_SIZE, Duration::from_millis(1)) {
            Some(raw) => {
                idle_polls = 0;
                let Ok(header) = PacketHeader::decode([raw[0], raw[1], raw[2]]) else {
                    return; // 测试代码发来坏包头即终止会话
                };
                let Some(body) = peer.recv_exact(header.body_len, Duration::from_millis(100))
                else {
                    return;
                };
                if !handle_packet(header.kind, &body, peer, &mut state, shared, cfg) {
                    return;
                }
            },
            None => {
                idle_polls += 1;
                // 断连探测降频，避免向客户端灌空包
                if idle_polls % 50 == 0 && peer.client_gone() {
                    return;
                }
            },
        }

        let cycle = Duration::from_secs_f64(1.0 / state.frequency);
        if state.started && last_emit.elapsed() >= cycle {
            last_emit = Instant::now();
            state.sim_time += 1.0 / state.frequency;
            advance_playback(&mut state, shared, cfg);
            if !emit_state(peer, &state, shared, cfg) {
                return;
            }
        }
    }
}

/// 返回 false 表示会话应终止
fn handle_packet(
    kind: PacketKind,
    body: &[u8],
    peer: &mut MockPeer,
    state: &mut SessionState,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
) -> bool {
    match kind {
        PacketKind::RequestProtocolVersion => {
            let mut reply = BytesMut::new();
            handshake::encode_accept(cfg.accept_protocol, &mut reply);
            send_packet(peer, kind, &reply)
        },
        PacketKind::GetControllerVersion => {
            let mut reply = BytesMut::new();
            handshake::encode_controller_version(&cfg.version, &mut reply);
            send_packet(peer, kind, &reply)
        },
        PacketKind::SetupOutputs => {
            let Ok((frequency, names)) = handshake::decode_output_setup_request(body) else {
                return false;
            };
            if !cfg.accepted_frequencies.contains(&frequency) {
                let mut reply = BytesMut::new();
                handshake::encode_setup_response(
                    0,
                    &format!("output frequency {frequency} not supported"),
                    &mut reply,
                );
                return send_packet(peer, kind, &reply);
            }
            let (reply_types, recipe) = register_recipe(state, &names);
            if let Some(recipe) = recipe {
                state.frequency = frequency;
                state.output = Some(recipe);
            }
            let id = state.next_recipe_id - 1;
            let mut reply = BytesMut::new();
            handshake::encode_setup_response(id, &reply_types, &mut reply);
            send_packet(peer, kind, &reply)
        },
        PacketKind::SetupInputs => {
            let Ok(names) = handshake::decode_input_setup_request(body) else {
                return false;
            };
            let (reply_types, recipe) = register_recipe(state, &names);
            if let Some(recipe) = recipe {
                state.inputs.push(recipe);
            }
            let id = state.next_recipe_id - 1;
            let mut reply = BytesMut::new();
            handshake::encode_setup_response(id, &reply_types, &mut reply);
            send_packet(peer, kind, &reply)
        },
        PacketKind::Start => {
            let accepted = state.output.is_some();
            state.started = accepted;
            let mut reply = BytesMut::new();
            handshake::encode_accept(accepted, &mut reply);
            send_packet(peer, kind, &reply)
        },
        PacketKind::Pause => {
            state.started = false;
            let mut reply = BytesMut::new();
            handshake::encode_accept(true, &mut reply);
            send_packet(peer, kind, &reply)
        },
        PacketKind::DataPackage => {
            apply_input_package(body, state, shared, cfg);
            true
        },
        PacketKind::TextMessage => true,
    }
}

/// 分配 recipe ID 并（在全部变量已知时）登记描述符
///
/// ID 无条件按调用顺序分配，不去重 —— 同一变量列表注册两次得到
/// 两个不同的 ID，与固件行为一致。
fn register_recipe(
    state: &mut SessionState,
    names: &[String],
) -> (String, Option<RecipeDescriptor>) {
    let id = state.next_recipe_id;
    state.next_recipe_id += 1;

    let mut wire_types = Vec::with_capacity(names.len());
    let mut kinds = Vec::with_capacity(names.len());
    let mut all_known = true;
    for name in names {
        match well_known_kind(name) {
            Some(kind) => {
                wire_types.push(kind.wire_name().to_string());
                kinds.push(kind);
            },
            None => {
                wire_types.push("NOT_FOUND".to_string());
                all_known = false;
            },
        }
    }

    let recipe = if all_known {
        RecipeDescriptor::new(id, names.to_vec(), kinds).ok()
    } else {
        None
    };
    (wire_types.join(","), recipe)
}

fn apply_input_package(
    body: &[u8],
    state: &mut SessionState,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
) {
    if body.is_empty() {
        return;
    }
    let Some(recipe) = state.inputs.iter().find(|r| r.id() == body[0]).cloned() else {
        return;
    };
    let Ok(values) = recipe.decode_payload(&body[1..]) else {
        return;
    };
    shared.input_packages.fetch_add(1, Ordering::Relaxed);

    let get = |name: &str| -> Option<&RegisterValue> {
        recipe
            .variables()
            .iter()
            .position(|n| n == name)
            .map(|i| &values[i])
    };

    // watchdog 保活通道
    if let Some(RegisterValue::Int32(v)) = get("input_int_register_23") {
        if *v == 1 {
            shared.watchdog_kicks.fetch_add(1, Ordering::Relaxed);
        }
        return;
    }

    // 数字输出：mask/level 位运算回写到状态流
    if let (Some(RegisterValue::UInt8(mask)), Some(RegisterValue::UInt8(level))) = (
        get("standard_digital_output_mask"),
        get("standard_digital_output"),
    ) {
        let mask = *mask as u64;
        let level = *level as u64;
        let old = shared.digital_out_bits.load(Ordering::Acquire);
        shared
            .digital_out_bits
            .store((old & !mask) | (level & mask), Ordering::Release);
        return;
    }
    if let (Some(RegisterValue::UInt8(mask)), Some(RegisterValue::UInt8(level))) =
        (get("tool_digital_output_mask"), get("tool_digital_output"))
    {
        let mask = *mask as u64;
        let level = *level as u64;
        let old = shared.tool_out_bits.load(Ordering::Acquire);
        shared
            .tool_out_bits
            .store((old & !mask) | (level & mask), Ordering::Release);
        return;
    }

    if let Some(RegisterValue::Double(fraction)) = get("speed_slider_fraction") {
        *shared.speed_slider.lock() = Some(*fraction);
        return;
    }

    if let (
        Some(RegisterValue::UInt8(mask)),
        Some(RegisterValue::UInt8(kind)),
        Some(RegisterValue::Double(v0)),
        Some(RegisterValue::Double(v1)),
    ) = (
        get("standard_analog_output_mask"),
        get("standard_analog_output_type"),
        get("standard_analog_output_0"),
        get("standard_analog_output_1"),
    ) {
        *shared.analog_out.lock() = Some((*mask, *kind, *v0, *v1));
        return;
    }

    // 宽控制命令
    if let Some(RegisterValue::Int32(opcode_raw)) = get("input_int_register_0") {
        let mut ints = [0i32; 7];
        for (i, slot) in ints.iter_mut().enumerate() {
            if let Some(RegisterValue::Int32(v)) = get(&names::input_int_register(i as u32 + 1)) {
                *slot = *v;
            }
        }
        let mut doubles = [0.0f64; 24];
        for (i, slot) in doubles.iter_mut().enumerate() {
            if let Some(RegisterValue::Double(v)) = get(&names::input_double_register(i as u32)) {
                *slot = *v;
            }
        }
        *shared.last_control_opcode.lock() = Some(*opcode_raw);
        apply_control_command(*opcode_raw, &ints, &doubles, state, shared, cfg);
    }
}

fn apply_control_command(
    opcode_raw: i32,
    ints: &[i32; 7],
    doubles: &[f64; 24],
    state: &mut SessionState,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
) {
    let Ok(opcode) = CommandOpcode::try_from(opcode_raw) else {
        return;
    };
    let done = |shared: &MockShared| {
        if cfg.instant_done {
            shared
                .command_state
                .store(names::COMMAND_STATE_DONE, Ordering::Release);
        }
    };

    match opcode {
        CommandOpcode::NoCommand => {
            shared
                .command_state
                .store(names::COMMAND_STATE_READY, Ordering::Release);
        },
        CommandOpcode::WatchdogSetup => {
            *shared.watchdog_hz.lock() = Some(doubles[0]);
        },
        CommandOpcode::StopProgram => {
            shared.program_running.store(false, Ordering::Release);
        },
        CommandOpcode::MoveJoint
        | CommandOpcode::MoveJointToPose
        | CommandOpcode::MoveLinear
        | CommandOpcode::MoveLinearFromJoints
        | CommandOpcode::MoveProcess
            if ints[1] == 1 =>
        {
            // 异步运动：立即回到就绪，进度走播放序列
            let script = if cfg.progress_script.is_empty() {
                vec![0]
            } else {
                cfg.progress_script.clone()
            };
            state.playback = Some((script, 0, 0));
        },
        CommandOpcode::SpeedStop
        | CommandOpcode::ServoStop
        | CommandOpcode::StopJoint
        | CommandOpcode::StopLinear => {
            state.playback = None;
            shared
                .progress
                .store(names::ASYNC_PROGRESS_IDLE, Ordering::Release);
            done(shared);
        },
        CommandOpcode::InverseKinematics => {
            match cfg.ik_solution {
                Some(q) => {
                    *shared.double_results.lock() = q;
                    shared.int_result.store(1, Ordering::Release);
                },
                None => shared.int_result.store(0, Ordering::Release),
            }
            done(shared);
        },
        CommandOpcode::ForwardKinematics
        | CommandOpcode::PoseTrans
        | CommandOpcode::GetTargetWaypoint
        | CommandOpcode::GetTcpOffset
        | CommandOpcode::GetJointTorques => {
            *shared.double_results.lock() = cfg.pose_result;
            shared.int_result.store(1, Ordering::Release);
            done(shared);
        },
        CommandOpcode::IsPoseWithinSafetyLimits
        | CommandOpcode::IsJointsWithinSafetyLimits
        | CommandOpcode::IsSteady => {
            shared.int_result.store(1, Ordering::Release);
            done(shared);
        },
        CommandOpcode::ToolContact => {
            shared
                .int_result
                .store(cfg.tool_contact_steps, Ordering::Release);
            done(shared);
        },
        CommandOpcode::GetStepTime => {
            shared.double_results.lock()[0] = 1.0 / state.frequency;
            done(shared);
        },
        _ => done(shared),
    }
}

fn advance_playback(
    state: &mut SessionState,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
) {
    // 脚本通道可能投递了路径播放序列
    if state.playback.is_none() {
        if let Some(script) = shared.pending_playback.lock().take() {
            state.playback = Some((script, 0, 0));
        }
    }

    let step_cycles = cfg.progress_step_cycles.max(1);
    let mut finished = false;
    if let Some((script, pos, held)) = &mut state.playback {
        if *pos >= script.len() {
            finished = true;
        } else {
            shared.progress.store(script[*pos], Ordering::Release);
            *held += 1;
            if *held >= step_cycles {
                *held = 0;
                *pos += 1;
            }
        }
    }
    if finished {
        state.playback = None;
        shared
            .progress
            .store(names::ASYNC_PROGRESS_IDLE, Ordering::Release);
        shared
            .command_state
            .store(names::COMMAND_STATE_DONE, Ordering::Release);
    }
}

fn emit_state(
    peer: &MockPeer,
    state: &SessionState,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
) -> bool {
    let Some(recipe) = &state.output else {
        return true;
    };
    let mut body = BytesMut::new();
    body.extend_from_slice(&[recipe.id()]);
    for (name, kind) in recipe.variables().iter().zip(recipe.kinds()) {
        sample_value(name, *kind, state, shared, cfg).encode(&mut body);
    }
    let mut packet_buf = BytesMut::new();
    if packet::encode_packet(PacketKind::DataPackage, &body, &mut packet_buf).is_err() {
        return false;
    }
    peer.send(&packet_buf)
}

fn sample_value(
    name: &str,
    kind: lynx_protocol::RegisterKind,
    state: &SessionState,
    shared: &Arc<MockShared>,
    cfg: &MockControllerConfig,
) -> RegisterValue {
    match name {
        "timestamp" => RegisterValue::Double(state.sim_time),
        names::REG_COMMAND_STATE => {
            RegisterValue::Int32(shared.command_state.load(Ordering::Acquire))
        },
        names::REG_ASYNC_PROGRESS => {
            RegisterValue::Int32(shared.progress.load(Ordering::Acquire))
        },
        names::REG_INT_RESULT => RegisterValue::Int32(shared.int_result.load(Ordering::Acquire)),
        "actual_digital_output_bits" => {
            RegisterValue::UInt64(shared.digital_out_bits.load(Ordering::Acquire))
        },
        "actual_digital_input_bits" => {
            RegisterValue::UInt64(shared.tool_out_bits.load(Ordering::Acquire))
        },
        "robot_status_bits" => {
            let running = shared.program_running.load(Ordering::Acquire) as u32;
            RegisterValue::UInt32(1 | (running << 1))
        },
        "runtime_state" => RegisterValue::UInt32(2),
        "speed_scaling" => RegisterValue::Double(1.0),
        "actual_q" | "target_q" => RegisterValue::Vector6d(cfg.actual_q),
        _ => {
            if let Some(rest) = name.strip_prefix("output_double_register_") {
                if let Ok(n) = rest.parse::<usize>() {
                    if n < 6 {
                        return RegisterValue::Double(shared.double_results.lock()[n]);
                    }
                }
            }
            RegisterValue::zero_of(kind)
        },
    }
}

fn send_packet(peer: &MockPeer, kind: PacketKind, body: &[u8]) -> bool {
    let mut buf = BytesMut::new();
    if packet::encode_packet(kind, body, &mut buf).is_err() {
        return false;
    }
    peer.send(&buf)
}

// ---- 脚本通道服务 ----

fn script_thread(listener: MockListener, shared: Arc<MockShared>, stop: Arc<AtomicBool>) {
    let mut conns: Vec<MockPeer> = Vec::new();
    while !stop.load(Ordering::Acquire) {
        if let Some(peer) = listener.accept(Duration::from_millis(5)) {
            conns.push(peer);
        }
        for conn in &mut conns {
            while let Some(chunk) = conn.recv_some(Duration::from_millis(1)) {
                if chunk.is_empty() {
                    continue;
                }
                let text = String::from_utf8_lossy(&chunk).to_string();
                handle_program_upload(&text, &shared);
            }
        }
    }
}

fn handle_program_upload(text: &str, shared: &Arc<MockShared>) {
    shared.uploaded_programs.lock().push(text.to_string());
    shared.program_running.store(true, Ordering::Release);
    shared
        .command_state
        .store(names::COMMAND_STATE_READY, Ordering::Release);

    // 路径程序：按标记的航点数播放进度序列
    if let Some(n) = parse_path_waypoints(text) {
        *shared.pending_playback.lock() = Some((0..n as i32).collect());
    }
}

/// 从路径程序的标记行解析航点数（`# lynx-path waypoints=N`）
fn parse_path_waypoints(text: &str) -> Option<usize> {
    let marker = "waypoints=";
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}
