//! UDP multicast stand-in for the narrowband radio: one multicast port per frequency in the plan.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rps_core::{Event, Transport};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::Config;

const RECV_BUF_LEN: usize = 512;

type Inbox = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// A bound port and its receive task. Kept until the radio is dropped, so a retune never
/// rebinds a port whose aborted task may still own the socket.
struct Tuned {
    socket: UdpSocket,
    dest: SocketAddrV4,
    listening: Arc<AtomicBool>,
    rx_task: JoinHandle<()>,
}

/// Implements [`Transport`] over UDP multicast. Received datagrams queue in an inbox and the
/// event consumer is woken with [`Event::DataAvailable`].
pub struct UdpRadio {
    config: Config,
    runtime: Handle,
    events: mpsc::Sender<Event>,
    inbox: Inbox,
    ports: HashMap<u16, Tuned>,
    active: Option<u16>,
}

impl UdpRadio {
    pub fn new(cfg: &Config, runtime: Handle, events: mpsc::Sender<Event>) -> Self {
        Self {
            config: cfg.clone(),
            runtime,
            events,
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            ports: HashMap::new(),
            active: None,
        }
    }

    /// Port the socket is bound to, if tuned.
    #[cfg(test)]
    fn local_port(&self) -> Option<u16> {
        self.tuned()
            .and_then(|t| t.socket.local_addr().ok())
            .map(|a| a.port())
    }

    fn tuned(&self) -> Option<&Tuned> {
        self.active.and_then(|port| self.ports.get(&port))
    }

    fn port_for(&self, frequency: u32) -> Option<u16> {
        let index = self.config.channel_index(frequency)?;
        self.config
            .base_port
            .checked_add(u16::try_from(index).ok()?)
    }

    fn open(&self, port: u16) -> std::io::Result<(UdpSocket, tokio::net::UdpSocket)> {
        let group = self.config.multicast_group;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        if let Err(e) = socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED) {
            warn!("cannot join {}: {}; only unicast will be heard", group, e);
        }
        socket.set_multicast_ttl_v4(1)?;
        socket.set_multicast_loop_v4(false)?;
        socket.set_nonblocking(true)?;
        let rx = socket.try_clone()?;
        let _guard = self.runtime.enter();
        let rx = tokio::net::UdpSocket::from_std(rx)?;
        Ok((socket, rx))
    }
}

impl Transport for UdpRadio {
    fn start(&mut self, _channel: u8, frequency: u32) -> bool {
        self.stop();
        let Some(port) = self.port_for(frequency) else {
            warn!("{} Hz is not in the channel plan", frequency);
            return false;
        };
        if !self.ports.contains_key(&port) {
            let (socket, rx) = match self.open(port) {
                Ok(s) => s,
                Err(e) => {
                    warn!("cannot open port {} for {} Hz: {}", port, frequency, e);
                    return false;
                }
            };
            let listening = Arc::new(AtomicBool::new(false));
            let rx_task = self.runtime.spawn(recv_loop(
                rx,
                listening.clone(),
                self.inbox.clone(),
                self.events.clone(),
            ));
            let dest = SocketAddrV4::new(self.config.multicast_group, port);
            self.ports.insert(
                port,
                Tuned {
                    socket,
                    dest,
                    listening,
                    rx_task,
                },
            );
        }
        if let Some(t) = self.ports.get(&port) {
            t.listening.store(true, Ordering::Release);
        }
        self.active = Some(port);
        info!("listening on {} Hz (port {})", frequency, port);
        true
    }

    fn stop(&mut self) {
        let Some(port) = self.active.take() else {
            return;
        };
        if let Some(t) = self.ports.get(&port) {
            t.listening.store(false, Ordering::Release);
        }
        self.inbox.lock().clear();
        debug!("radio stopped");
    }

    fn is_running(&self) -> bool {
        self.active.is_some()
    }

    fn write(&mut self, frame: &[u8]) -> bool {
        let Some(t) = self.tuned() else {
            return false;
        };
        match t.socket.send_to(frame, t.dest) {
            Ok(_) => true,
            Err(e) => {
                trace!("send refused: {}", e);
                false
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(frame) = self.inbox.lock().pop_front() else {
            return 0;
        };
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        n
    }
}

impl Drop for UdpRadio {
    fn drop(&mut self) {
        self.stop();
        for (_, t) in self.ports.drain() {
            t.rx_task.abort();
        }
    }
}

/// Queue datagrams while listening; wake the consumer only when the inbox goes from empty to
/// non-empty, since one DataAvailable drains everything.
async fn recv_loop(
    socket: tokio::net::UdpSocket,
    listening: Arc<AtomicBool>,
    inbox: Inbox,
    events: mpsc::Sender<Event>,
) {
    let mut buf = vec![0u8; RECV_BUF_LEN];
    loop {
        let n = match socket.recv_from(&mut buf).await {
            Ok((n, from)) => {
                trace!("{} bytes from {}", n, from);
                n
            }
            Err(e) => {
                warn!("radio receive failed: {}", e);
                return;
            }
        };
        if !listening.load(Ordering::Acquire) {
            continue;
        }
        let was_empty = {
            let mut q = inbox.lock();
            let was_empty = q.is_empty();
            q.push_back(buf[..n].to_vec());
            was_empty
        };
        if was_empty && events.send(Event::DataAvailable).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FREQ: u32 = 433_920_000;

    fn radio(events: mpsc::Sender<Event>) -> UdpRadio {
        let cfg = Config {
            frequencies: vec![FREQ],
            base_port: 0,
            ..Config::default()
        };
        UdpRadio::new(&cfg, Handle::current(), events)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn frequency_outside_plan_is_refused() {
        let (tx, _rx) = mpsc::channel(8);
        let mut r = radio(tx);
        assert!(!r.start(0, 915_000_000));
        assert!(!r.is_running());
        assert!(!r.write(b"x"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn received_datagram_wakes_consumer() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut r = radio(tx);
        assert!(r.start(0, FREQ));
        let port = r.local_port().unwrap();

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        sender
            .send_to(b"Bob: RPS:BA042\r\n", (Ipv4Addr::LOCALHOST, port))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(Event::DataAvailable));
        let mut buf = [0u8; 64];
        let n = r.read(&mut buf);
        assert_eq!(&buf[..n], b"Bob: RPS:BA042\r\n");
        assert_eq!(r.read(&mut buf), 0);

        r.stop();
        assert!(!r.is_running());
    }

    fn free_port() -> u16 {
        UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn fixed_radio(plan: Vec<u32>, events: mpsc::Sender<Event>) -> (UdpRadio, u16) {
        let base_port = free_port();
        let cfg = Config {
            frequencies: plan,
            base_port,
            ..Config::default()
        };
        (UdpRadio::new(&cfg, Handle::current(), events), base_port)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retune_to_same_frequency_keeps_port() {
        let (tx, _rx) = mpsc::channel(8);
        let (mut r, port) = fixed_radio(vec![FREQ], tx);
        assert!(r.start(0, FREQ));
        for _ in 0..50 {
            r.stop();
            assert!(!r.is_running());
            assert!(r.start(0, FREQ));
        }
        assert_eq!(r.local_port(), Some(port));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retune_back_and_forth_between_frequencies() {
        const OTHER: u32 = 868_350_000;
        let (tx, _rx) = mpsc::channel(8);
        let (mut r, port) = fixed_radio(vec![FREQ, OTHER], tx);
        for _ in 0..10 {
            assert!(r.start(0, FREQ));
            assert_eq!(r.local_port(), Some(port));
            assert!(r.start(0, OTHER));
            assert_eq!(r.local_port(), Some(port + 1));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stopped_radio_drops_datagrams() {
        let (tx, mut rx) = mpsc::channel(8);
        let (mut r, port) = fixed_radio(vec![FREQ], tx);
        assert!(r.start(0, FREQ));
        r.stop();

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        sender
            .send_to(b"Bob: RPS:BA042\r\n", (Ipv4Addr::LOCALHOST, port))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut buf = [0u8; 64];
        assert_eq!(r.read(&mut buf), 0);
        assert!(rx.try_recv().is_err());

        assert!(r.start(0, FREQ));
        sender
            .send_to(b"Bob: RPS:WA042\r\n", (Ipv4Addr::LOCALHOST, port))
            .unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(Event::DataAvailable));
        let n = r.read(&mut buf);
        assert_eq!(&buf[..n], b"Bob: RPS:WA042\r\n");
    }
}
