//! TCP 传输会话
//!
//! 连接建立后用 `try_clone` 拆出三个流句柄：读、写、关断。
//! 读写各自持锁，互不阻塞；`disconnect` 只碰关断句柄，因此即使
//! 接收线程正阻塞在 `read_exact` 上也能被立刻唤醒。

use crate::{Transport, TransportError};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

pub struct TcpTransport {
    host: String,
    port: u16,
    read_timeout: Option<Duration>,
    reader: Mutex<Option<TcpStream>>,
    writer: Mutex<Option<TcpStream>>,
    shutdown: Mutex<Option<TcpStream>>,
    open: AtomicBool,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: None,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            shutdown: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    /// 设置读超时（`None` = 无限等待）
    ///
    /// 超时以 [`TransportError::Timeout`] 报出；对实时流而言，一个
    /// 远超控制周期的读超时意味着控制器已经死亡。
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn peer(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    fn mark_closed(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            if let Some(stream) = self.shutdown.lock().take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }

    fn connect_any(&self, addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream, TransportError> {
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                },
            }
        }
        match last_err {
            Some(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Err(TransportError::ConnectTimeout {
                    addr: format!("{}:{}", self.host, self.port),
                    timeout,
                })
            },
            Some(e) => Err(TransportError::Io(e)),
            None => Err(TransportError::Resolve(format!("{}:{}", self.host, self.port))),
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&self, timeout: Duration) -> Result<(), TransportError> {
        if self.open.load(Ordering::Acquire) {
            self.disconnect();
        }

        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(format!("{}:{}", self.host, self.port)))?
            .collect();

        let stream = self.connect_any(&addrs, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.read_timeout)?;

        *self.reader.lock() = Some(stream.try_clone()?);
        *self.shutdown.lock() = Some(stream.try_clone()?);
        *self.writer.lock() = Some(stream);
        self.open.store(true, Ordering::Release);
        debug!("connected to {}:{}", self.host, self.port);
        Ok(())
    }

    fn disconnect(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            if let Some(stream) = self.shutdown.lock().take() {
                // 关断唤醒阻塞中的读端；句柄随 drop 释放
                let _ = stream.shutdown(Shutdown::Both);
            }
            *self.writer.lock() = None;
            debug!("disconnected from {}:{}", self.host, self.port);
        }
    }

    fn send(&self, buf: &[u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        let mut guard = self.writer.lock();
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        match stream.write_all(buf) {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(guard);
                warn!("write failed, closing connection: {e}");
                self.mark_closed();
                Err(TransportError::Io(e))
            },
        }
    }

    fn recv_exact(&self, buf: &mut [u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        let mut guard = self.reader.lock();
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        match stream.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(guard);
                if !self.open.load(Ordering::Acquire) {
                    // 本端主动断开唤醒了读
                    return Err(TransportError::NotConnected);
                }
                match e.kind() {
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                        Err(TransportError::Timeout)
                    },
                    std::io::ErrorKind::UnexpectedEof => {
                        self.mark_closed();
                        Err(TransportError::Closed)
                    },
                    _ => {
                        self.mark_closed();
                        Err(TransportError::Io(e))
                    },
                }
            },
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    fn echo_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_connect_send_recv() {
        let (listener, port) = echo_listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let transport = TcpTransport::new("127.0.0.1", port);
        transport.connect(Duration::from_secs(1)).unwrap();
        assert!(transport.is_open());

        transport.send(&[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        transport.recv_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);

        transport.disconnect();
        assert!(!transport.is_open());
        server.join().unwrap();
    }

    #[test]
    fn test_peer_close_yields_closed() {
        let (listener, port) = echo_listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream); // 对端直接关闭
        });

        let transport = TcpTransport::new("127.0.0.1", port);
        transport.connect(Duration::from_secs(1)).unwrap();
        server.join().unwrap();

        let mut buf = [0u8; 1];
        let err = transport.recv_exact(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_disconnect_unblocks_reader() {
        let (listener, port) = echo_listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let transport = Arc::new(TcpTransport::new("127.0.0.1", port));
        transport.connect(Duration::from_secs(1)).unwrap();

        let reader = {
            let transport = transport.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 1];
                transport.recv_exact(&mut buf).unwrap_err()
            })
        };

        thread::sleep(Duration::from_millis(50));
        transport.disconnect();

        let err = reader.join().unwrap();
        assert!(matches!(
            err,
            TransportError::NotConnected | TransportError::Closed | TransportError::Io(_)
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_send_while_disconnected() {
        let transport = TcpTransport::new("127.0.0.1", 1);
        let err = transport.send(&[0]).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[test]
    fn test_reconnect_replaces_streams() {
        let (listener, port) = echo_listener();
        let server = thread::spawn(move || {
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 1];
                stream.read_exact(&mut buf).unwrap();
                stream.write_all(&[buf[0] + 1]).unwrap();
            }
        });

        let transport = TcpTransport::new("127.0.0.1", port);
        for round in 0..2u8 {
            transport.connect(Duration::from_secs(1)).unwrap();
            transport.send(&[round]).unwrap();
            let mut buf = [0u8; 1];
            transport.recv_exact(&mut buf).unwrap();
            assert_eq!(buf[0], round + 1);
        }
        server.join().unwrap();
    }
}
