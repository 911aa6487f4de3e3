//! 协议引擎
//!
//! 在传输会话之上实现寄存器协议的状态机：版本协商 → 固件版本查询 →
//! recipe 注册 → start，之后进入同步阶段收发数据包。
//!
//! 引擎自身不持线程；建联阶段由前台调用方串行驱动，同步阶段由
//! `pipeline` 的接收循环独占读方向、命令调用方共享写方向。包级
//! 读取（包头 + 载荷两次读）用一把读锁串行化，写方向每条命令编码
//! 为完整缓冲后单次写入，保证"整包写入或失败"。

use crate::context::monotonic_micros;
use crate::error::DriverError;
use bytes::BytesMut;
use lynx_protocol::handshake::{self, TextLevel, TypeEntry};
use lynx_protocol::packet::{self, HEADER_SIZE, PacketHeader, PacketKind};
use lynx_protocol::{
    ControllerVersion, PROTOCOL_VERSION, ProtocolError, RecipeDescriptor, RobotCommand,
    StateSnapshot,
};
use lynx_transport::{Transport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

fn map_transport(e: TransportError) -> DriverError {
    match e {
        TransportError::NotConnected => DriverError::NotConnected,
        other => DriverError::Transport(other),
    }
}

pub struct ProtocolEngine {
    transport: Arc<dyn Transport>,
    /// 串行化整包读取（包头与载荷必须由同一个读者连续读出）
    read_guard: Mutex<()>,
    negotiated: AtomicBool,
    started: AtomicBool,
    controller_version: Mutex<Option<ControllerVersion>>,
    output_recipe: Mutex<Option<Arc<RecipeDescriptor>>>,
    input_recipes: Mutex<Vec<Arc<RecipeDescriptor>>>,
}

impl ProtocolEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            read_guard: Mutex::new(()),
            negotiated: AtomicBool::new(false),
            started: AtomicBool::new(false),
            controller_version: Mutex::new(None),
            output_recipe: Mutex::new(None),
            input_recipes: Mutex::new(Vec::new()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// 建立连接并复位协议状态机
    ///
    /// recipe 与版本缓存都是每次连接重新协商的，残留上一会话的
    /// 状态会导致布局错位解码。
    pub fn connect(&self, timeout: Duration) -> Result<(), DriverError> {
        self.transport.connect(timeout).map_err(map_transport)?;
        self.negotiated.store(false, Ordering::Release);
        self.started.store(false, Ordering::Release);
        *self.controller_version.lock() = None;
        *self.output_recipe.lock() = None;
        self.input_recipes.lock().clear();
        Ok(())
    }

    pub fn disconnect(&self) {
        self.started.store(false, Ordering::Release);
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// 协商寄存器协议版本，必须先于任何 recipe 注册
    pub fn negotiate_protocol_version(&self) -> Result<(), DriverError> {
        let mut body = BytesMut::new();
        handshake::encode_version_request(PROTOCOL_VERSION, &mut body);
        let reply = self.request(PacketKind::RequestProtocolVersion, &body)?;
        if !handshake::decode_accept(&reply)? {
            return Err(DriverError::VersionRefused {
                requested: PROTOCOL_VERSION,
            });
        }
        self.negotiated.store(true, Ordering::Release);
        debug!("protocol version {PROTOCOL_VERSION} negotiated");
        Ok(())
    }

    /// 查询控制器固件版本；首次成功后缓存，之后无副作用
    pub fn controller_version(&self) -> Result<ControllerVersion, DriverError> {
        if let Some(version) = *self.controller_version.lock() {
            return Ok(version);
        }
        let reply = self.request(PacketKind::GetControllerVersion, &[])?;
        let version = handshake::decode_controller_version(&reply)?;
        info!("controller version {version}");
        *self.controller_version.lock() = Some(version);
        Ok(version)
    }

    /// 注册输出 recipe
    ///
    /// 只尝试 `frequency` 这一个频率（按固件代际推导），被拒即
    /// `RecipeRejected`，不做其他频率的协商重试。
    pub fn send_output_setup(
        &self,
        names: &[String],
        frequency: f64,
    ) -> Result<Arc<RecipeDescriptor>, DriverError> {
        self.check_setup_allowed()?;
        let mut body = BytesMut::new();
        handshake::encode_output_setup_request(frequency, names, &mut body);
        let reply = self.request(PacketKind::SetupOutputs, &body)?;
        let recipe = Arc::new(self.parse_setup_response(&reply, names)?);
        debug!(
            "output recipe {} registered: {} variables at {frequency} Hz",
            recipe.id(),
            names.len()
        );
        *self.output_recipe.lock() = Some(recipe.clone());
        Ok(recipe)
    }

    /// 注册一个输入 recipe，返回控制器分配的 ID
    ///
    /// ID 按注册顺序分配、不去重、`send_start` 之后不可再协商，
    /// 调用方必须为后续每次 `send` 记住它。
    pub fn send_input_setup(&self, names: &[String]) -> Result<u8, DriverError> {
        self.check_setup_allowed()?;
        let mut body = BytesMut::new();
        handshake::encode_input_setup_request(names, &mut body);
        let reply = self.request(PacketKind::SetupInputs, &body)?;
        let recipe = Arc::new(self.parse_setup_response(&reply, names)?);
        let id = recipe.id();
        debug!("input recipe {id} registered: {names:?}");
        self.input_recipes.lock().push(recipe);
        Ok(id)
    }

    /// 开始周期同步；之后才允许 `send` / `receive_data`
    pub fn send_start(&self) -> Result<(), DriverError> {
        if self.started.load(Ordering::Acquire) {
            return Err(DriverError::AlreadyStarted);
        }
        if self.output_recipe.lock().is_none() {
            return Err(DriverError::SyncRefused("start"));
        }
        let reply = self.request(PacketKind::Start, &[])?;
        if !handshake::decode_accept(&reply)? {
            return Err(DriverError::SyncRefused("start"));
        }
        self.started.store(true, Ordering::Release);
        info!("synchronization started");
        Ok(())
    }

    /// 暂停周期同步（控制器回到空闲，recipe 保持有效）
    pub fn send_pause(&self) -> Result<(), DriverError> {
        let reply = self.request(PacketKind::Pause, &[])?;
        if !handshake::decode_accept(&reply)? {
            return Err(DriverError::SyncRefused("pause"));
        }
        self.started.store(false, Ordering::Release);
        info!("synchronization paused");
        Ok(())
    }

    /// 发送一条命令
    ///
    /// 整个数据包先在本地编码完成再单次写入传输层：要么整包上线，
    /// 要么在写出任何字节前失败。
    pub fn send(&self, command: &RobotCommand) -> Result<(), DriverError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(DriverError::NotStarted);
        }
        let recipe = self
            .input_recipes
            .lock()
            .iter()
            .find(|r| r.id() == command.recipe_id)
            .cloned()
            .ok_or(DriverError::UnknownRecipe(command.recipe_id))?;

        let mut body = BytesMut::with_capacity(1 + recipe.payload_size());
        body.extend_from_slice(&[recipe.id()]);
        recipe.encode_payload(command, &mut body)?;

        let mut packet = BytesMut::new();
        packet::encode_packet(PacketKind::DataPackage, &body, &mut packet)?;
        trace!(
            "send {} on recipe {}",
            command.payload.kind_name(),
            recipe.id()
        );
        self.transport.send(&packet).map_err(map_transport)
    }

    /// 阻塞等待下一个输出数据包并解码为完整快照
    ///
    /// 解码失败与传输失败对当前会话都是致命的，这里不做内部重试，
    /// 由调用方（接收循环）终止会话。
    pub fn receive_data(&self) -> Result<StateSnapshot, DriverError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(DriverError::NotStarted);
        }
        let recipe = self
            .output_recipe
            .lock()
            .clone()
            .ok_or(DriverError::NotStarted)?;

        loop {
            let (kind, body) = self.read_packet()?;
            match kind {
                PacketKind::DataPackage => {
                    if body.is_empty() {
                        return Err(ProtocolError::Truncated {
                            expected: 1,
                            actual: 0,
                        }
                        .into());
                    }
                    if body[0] != recipe.id() {
                        return Err(ProtocolError::RecipeIdMismatch {
                            expected: recipe.id(),
                            actual: body[0],
                        }
                        .into());
                    }
                    let values = recipe.decode_payload(&body[1..])?;
                    let pairs = recipe
                        .variables()
                        .iter()
                        .cloned()
                        .zip(values.into_iter());
                    return Ok(StateSnapshot::from_values(pairs, monotonic_micros()));
                },
                PacketKind::TextMessage => {
                    self.log_text_message(&body);
                },
                other => {
                    return Err(ProtocolError::UnexpectedPacket {
                        expected: PacketKind::DataPackage,
                        actual: other,
                    }
                    .into());
                },
            }
        }
    }

    // ---- 内部 ----

    fn check_setup_allowed(&self) -> Result<(), DriverError> {
        if self.started.load(Ordering::Acquire) {
            return Err(DriverError::SetupAfterStart);
        }
        if !self.negotiated.load(Ordering::Acquire) {
            return Err(DriverError::NotNegotiated);
        }
        Ok(())
    }

    /// 将注册应答解析为 recipe 描述符
    fn parse_setup_response(
        &self,
        reply: &[u8],
        names: &[String],
    ) -> Result<RecipeDescriptor, DriverError> {
        let response = handshake::decode_setup_response(reply)?;
        if response.is_rejected() {
            return Err(DriverError::RecipeRejected {
                reason: response.body,
            });
        }
        let entries = response.type_entries()?;
        if entries.len() != names.len() {
            return Err(DriverError::RecipeRejected {
                reason: format!(
                    "controller answered {} types for {} variables",
                    entries.len(),
                    names.len()
                ),
            });
        }
        let mut kinds = Vec::with_capacity(entries.len());
        let mut unknown = Vec::new();
        for (name, entry) in names.iter().zip(entries) {
            match entry {
                TypeEntry::Kind(kind) => kinds.push(kind),
                TypeEntry::NotFound => unknown.push(name.clone()),
            }
        }
        if !unknown.is_empty() {
            return Err(DriverError::RecipeRejected {
                reason: format!("unknown variables: {}", unknown.join(", ")),
            });
        }
        Ok(RecipeDescriptor::new(
            response.recipe_id,
            names.to_vec(),
            kinds,
        )?)
    }

    /// 发送请求并等待同类应答
    ///
    /// 穿插的文本消息转发到日志；同步启动后发出的请求（如 pause）
    /// 可能与在途的数据包交错，这些数据包直接丢弃。
    fn request(&self, kind: PacketKind, body: &[u8]) -> Result<Vec<u8>, DriverError> {
        let mut packet = BytesMut::new();
        packet::encode_packet(kind, body, &mut packet)?;
        self.transport.send(&packet).map_err(map_transport)?;

        loop {
            let (reply_kind, reply_body) = self.read_packet()?;
            match reply_kind {
                k if k == kind => return Ok(reply_body),
                PacketKind::TextMessage => self.log_text_message(&reply_body),
                PacketKind::DataPackage => {
                    trace!("discarding in-flight data package while awaiting {kind:?} reply");
                },
                other => {
                    return Err(ProtocolError::UnexpectedPacket {
                        expected: kind,
                        actual: other,
                    }
                    .into());
                },
            }
        }
    }

    /// 读取一个完整报文（持读锁，保证包头与载荷连续）
    fn read_packet(&self) -> Result<(PacketKind, Vec<u8>), DriverError> {
        let _guard = self.read_guard.lock();
        let mut header = [0u8; HEADER_SIZE];
        self.transport
            .recv_exact(&mut header)
            .map_err(map_transport)?;
        let header = PacketHeader::decode(header)?;
        let mut body = vec![0u8; header.body_len];
        self.transport
            .recv_exact(&mut body)
            .map_err(map_transport)?;
        Ok((header.kind, body))
    }

    /// 控制器端文本消息转发到 tracing
    fn log_text_message(&self, body: &[u8]) {
        match handshake::decode_text_message(body) {
            Ok((TextLevel::Exception | TextLevel::Error, message)) => {
                error!("controller: {message}");
            },
            Ok((TextLevel::Warning, message)) => warn!("controller: {message}"),
            Ok((TextLevel::Info, message)) => info!("controller: {message}"),
            Err(e) => warn!("unreadable controller text message: {e}"),
        }
    }
}
