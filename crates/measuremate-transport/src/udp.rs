//! UDP 适配器
//!
//! WiFi 固件把每个矩阵帧作为一个独立数据报发到固定端口（默认 4210）。
//! 适配器记住最近一个发送方地址，下行命令（如果有）回发给它。

use crate::{MatAdapter, RxAdapter, SplittableAdapter, TransportError, TxAdapter};
use bytes::Bytes;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace};

/// 默认监听端口
pub const DEFAULT_UDP_PORT: u16 = 4210;

/// 默认最大数据报长度
pub const DEFAULT_MAX_DATAGRAM: usize = 256;

type SharedPeer = Arc<Mutex<Option<SocketAddr>>>;

fn load_peer(peer: &SharedPeer) -> Option<SocketAddr> {
    *peer.lock().unwrap_or_else(|e| e.into_inner())
}

fn store_peer(peer: &SharedPeer, addr: SocketAddr) {
    let mut slot = peer.lock().unwrap_or_else(|e| e.into_inner());
    if *slot != Some(addr) {
        debug!("UDP peer is now {}", addr);
        *slot = Some(addr);
    }
}

fn map_recv_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout,
        _ => TransportError::Io(e),
    }
}

fn recv_datagram(
    socket: &UdpSocket,
    buffer: &mut [u8],
    peer: &SharedPeer,
) -> Result<Bytes, TransportError> {
    let (len, from) = socket.recv_from(buffer).map_err(map_recv_error)?;
    store_peer(peer, from);
    trace!("UDP datagram: {} bytes from {}", len, from);
    Ok(Bytes::copy_from_slice(&buffer[..len]))
}

fn send_datagram(
    socket: &UdpSocket,
    payload: &[u8],
    peer: &SharedPeer,
) -> Result<(), TransportError> {
    let addr = load_peer(peer).ok_or(TransportError::NoPeer)?;
    socket.send_to(payload, addr)?;
    Ok(())
}

/// UDP 压力垫适配器
pub struct UdpMatAdapter {
    socket: UdpSocket,
    /// 下行目标地址（显式设置或取自最近的发送方）
    peer: SharedPeer,
    /// 接收缓冲区
    buffer: Vec<u8>,
}

impl UdpMatAdapter {
    /// 绑定本地地址
    ///
    /// # 参数
    /// - `addr`: 本地监听地址（如 "0.0.0.0:4210"）
    /// - `max_datagram`: 最大数据报长度，超出部分会被内核截断
    pub fn bind(addr: impl ToSocketAddrs, max_datagram: usize) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;
        debug!("UDP adapter bound to {:?}", socket.local_addr().ok());
        Ok(Self {
            socket,
            peer: Arc::new(Mutex::new(None)),
            buffer: vec![0u8; max_datagram.max(1)],
        })
    }

    /// 固定下行目标地址
    pub fn with_peer(self, peer: SocketAddr) -> Self {
        store_peer(&self.peer, peer);
        self
    }

    /// 本地绑定地址
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// 当前下行目标地址
    pub fn peer(&self) -> Option<SocketAddr> {
        load_peer(&self.peer)
    }
}

impl MatAdapter for UdpMatAdapter {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        send_datagram(&self.socket, payload, &self.peer)
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        recv_datagram(&self.socket, &mut self.buffer, &self.peer)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        // set_read_timeout 不接受零时长，零时长改用非阻塞模式
        let result = if timeout.is_zero() {
            self.socket.set_nonblocking(true)
        } else {
            self.socket
                .set_nonblocking(false)
                .and_then(|_| self.socket.set_read_timeout(Some(timeout)))
        };
        if let Err(e) = result {
            debug!("Failed to apply UDP receive timeout {:?}: {}", timeout, e);
        }
    }
}

/// UDP 接收端
pub struct UdpRxAdapter {
    socket: UdpSocket,
    peer: SharedPeer,
    buffer: Vec<u8>,
}

impl RxAdapter for UdpRxAdapter {
    fn receive(&mut self) -> Result<Bytes, TransportError> {
        recv_datagram(&self.socket, &mut self.buffer, &self.peer)
    }
}

/// UDP 发送端
pub struct UdpTxAdapter {
    socket: UdpSocket,
    peer: SharedPeer,
}

impl TxAdapter for UdpTxAdapter {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        send_datagram(&self.socket, payload, &self.peer)
    }
}

impl SplittableAdapter for UdpMatAdapter {
    type RxAdapter = UdpRxAdapter;
    type TxAdapter = UdpTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), TransportError> {
        let tx_socket = self.socket.try_clone()?;
        Ok((
            UdpRxAdapter {
                socket: self.socket,
                peer: self.peer.clone(),
                buffer: self.buffer,
            },
            UdpTxAdapter {
                socket: tx_socket,
                peer: self.peer,
            },
        ))
    }
}
