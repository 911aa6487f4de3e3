//! 内存双工传输（mock feature）
//!
//! 用 crossbeam 通道模拟一条可断开重连的字节流连接。`MockListener`
//! 扮演控制器侧的监听端，每次客户端 `connect` 都会递送一个新的
//! [`MockPeer`]，模拟控制器据此服务一个会话周期，断开后可再次
//! `accept` —— 与真实 TCP 的生命周期一致，供重连路径测试使用。

use crate::{Transport, TransportError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 等待数据时的轮询片长（用于感知本端断开）
const POLL_SLICE: Duration = Duration::from_millis(10);

struct Conn {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

pub struct MockTransport {
    accept_tx: Sender<MockPeer>,
    conn: Mutex<Option<Conn>>,
    rx_buf: Mutex<VecDeque<u8>>,
    open: AtomicBool,
    read_timeout: Mutex<Option<Duration>>,
}

pub struct MockListener {
    accept_rx: Receiver<MockPeer>,
}

/// 控制器侧的单次连接端点
pub struct MockPeer {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    buf: VecDeque<u8>,
}

/// 创建一对互联的客户端传输与监听端
pub fn mock_link() -> (MockTransport, MockListener) {
    let (accept_tx, accept_rx) = unbounded();
    (
        MockTransport {
            accept_tx,
            conn: Mutex::new(None),
            rx_buf: Mutex::new(VecDeque::new()),
            open: AtomicBool::new(false),
            read_timeout: Mutex::new(None),
        },
        MockListener { accept_rx },
    )
}

impl MockTransport {
    /// 设置读超时（`None` = 无限等待），语义与 TCP 实现一致
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        *self.read_timeout.lock() = timeout;
    }

    fn current_rx(&self) -> Result<Receiver<Vec<u8>>, TransportError> {
        self.conn
            .lock()
            .as_ref()
            .map(|c| c.rx.clone())
            .ok_or(TransportError::NotConnected)
    }
}

impl Transport for MockTransport {
    fn connect(&self, _timeout: Duration) -> Result<(), TransportError> {
        if self.open.load(Ordering::Acquire) {
            self.disconnect();
        }

        let (c2s_tx, c2s_rx) = unbounded();
        let (s2c_tx, s2c_rx) = unbounded();
        let peer = MockPeer {
            tx: s2c_tx,
            rx: c2s_rx,
            buf: VecDeque::new(),
        };
        self.accept_tx.send(peer).map_err(|_| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock listener dropped",
            ))
        })?;

        *self.conn.lock() = Some(Conn {
            tx: c2s_tx,
            rx: s2c_rx,
        });
        self.rx_buf.lock().clear();
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn disconnect(&self) {
        self.open.store(false, Ordering::Release);
        // 丢弃端点：对端读到 Disconnected，写端随即失败
        self.conn.lock().take();
    }

    fn send(&self, buf: &[u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        let tx = self
            .conn
            .lock()
            .as_ref()
            .map(|c| c.tx.clone())
            .ok_or(TransportError::NotConnected)?;
        tx.send(buf.to_vec()).map_err(|_| {
            self.open.store(false, Ordering::Release);
            TransportError::Closed
        })
    }

    fn recv_exact(&self, buf: &mut [u8]) -> Result<(), TransportError> {
        let timeout = *self.read_timeout.lock();
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            {
                let mut pending = self.rx_buf.lock();
                if pending.len() >= buf.len() {
                    for slot in buf.iter_mut() {
                        *slot = pending.pop_front().unwrap();
                    }
                    return Ok(());
                }
            }

            if !self.open.load(Ordering::Acquire) {
                return Err(TransportError::NotConnected);
            }
            let rx = self.current_rx()?;
            match rx.recv_timeout(POLL_SLICE) {
                Ok(chunk) => self.rx_buf.lock().extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            return Err(TransportError::Timeout);
                        }
                    }
                },
                Err(RecvTimeoutError::Disconnected) => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::Closed);
                },
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl MockListener {
    /// 等待客户端的下一次 `connect`
    pub fn accept(&self, timeout: Duration) -> Option<MockPeer> {
        self.accept_rx.recv_timeout(timeout).ok()
    }
}

impl MockPeer {
    /// 向客户端写入字节；客户端已断开时返回 `false`
    pub fn send(&self, bytes: &[u8]) -> bool {
        self.tx.send(bytes.to_vec()).is_ok()
    }

    /// 读取任意一段到达的数据（含内部缓冲）
    pub fn recv_some(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        if !self.buf.is_empty() {
            return Some(self.buf.drain(..).collect());
        }
        self.rx.recv_timeout(timeout).ok()
    }

    /// 精确读取 `n` 字节，超时或客户端断开返回 `None`
    pub fn recv_exact(&mut self, n: usize, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        while self.buf.len() < n {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match self.rx.recv_timeout(remaining.min(POLL_SLICE)) {
                Ok(chunk) => self.buf.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                },
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        Some(self.buf.drain(..n).collect())
    }

    /// 客户端是否已断开本次连接
    pub fn client_gone(&self) -> bool {
        // 发送空包探测：只在通道断开时失败
        self.tx.send(Vec::new()).is_err()
    }
}
