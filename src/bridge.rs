//! # Bridge Reactor
//!
//! The single-threaded reactor loop: one `tokio::select!` multiplexes
//! readiness on the serial link, the UDP socket, the 1-second sensor timer
//! and process signals. All component state is mutated between readiness
//! events, so nothing needs locking.
//!
//! Data flow: serial bytes → framer → (decode: RC debounce, identity
//! logging) → aggregator → UDP datagram, with the injector topping up the
//! pending buffer after each flush. The return direction bypasses the
//! aggregator: inbound datagrams are inspected for logging only and written
//! straight to the serial link.
//!
//! Transport faults are fatal: there is no reconnect logic, a broken link
//! ends the loop and restart is the process supervisor's job.

use std::fs;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time::{interval, Duration};
use tokio_serial::SerialStream;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregatePolicy, Aggregator, Flush};
use crate::config::Config;
use crate::debounce::{DebounceEngine, ScriptRunner};
use crate::error::Result;
use crate::mavlink::decoder::{decode_heartbeat_autopilot, decode_rc_channels};
use crate::mavlink::framer::Framer;
use crate::mavlink::protocol::{Packet, PacketHeader, MSG_ID_HEARTBEAT};
use crate::serial;
use crate::telemetry::inbox::MessageInbox;
use crate::telemetry::injector::TelemetryInjector;
use crate::telemetry::link_health::LinkHealthMonitor;
use crate::telemetry::temperature::TemperatureProbe;

/// Largest datagram either direction will carry
const MAX_DATAGRAM: usize = 9000;

/// Serial read chunk size
const SERIAL_CHUNK: usize = 4096;

/// Inbound datagrams at or below this length are dropped as noise
const MIN_INBOUND_LEN: usize = 6;

/// Test message the SIGUSR1 hook drops into the inbox
const TEST_MESSAGE: &str = "Hello_From_OpenIPC";

/// The assembled bridge, one per process.
pub struct Bridge {
    serial: SerialStream,
    socket: UdpSocket,
    out_addr: SocketAddr,
    listen_enabled: bool,
    policy: AggregatePolicy,
    framer: Framer,
    aggregator: Aggregator,
    debounce: DebounceEngine<ScriptRunner>,
    injector: TelemetryInjector,
    probe: TemperatureProbe,
    inbox_path: std::path::PathBuf,
    started: Instant,
    serial_reads: u64,
    serial_bytes: u64,
    version_logged: bool,
    fc_identified: bool,
}

impl Bridge {
    /// Open every link and assemble the components.
    ///
    /// # Errors
    ///
    /// Returns an error when the serial port cannot be opened, an address
    /// does not parse, or the UDP socket cannot be bound.
    pub async fn new(config: &Config) -> Result<Self> {
        let serial = serial::open(&config.serial.port, config.serial.baud_rate)?;

        let out_addr = config.out_addr()?;
        let in_addr = config.in_addr()?;
        let socket = UdpSocket::bind(in_addr).await?;
        let listen_enabled = in_addr.port() != 0;
        if listen_enabled {
            info!(%in_addr, "listening for return traffic");
        }

        let policy = AggregatePolicy::from_raw(config.aggregation.aggregate);
        match policy {
            AggregatePolicy::RawPassThrough => info!("no parsing, raw UART to UDP only"),
            AggregatePolicy::PacketCount(n) => info!(packets = n, "aggregating packets in packs"),
            AggregatePolicy::ByteThreshold(n) => info!(bytes = n, "aggregating packets by bytes"),
        }

        let folder = &config.telemetry.folder;
        let inbox = MessageInbox::new(folder);
        let inbox_path = inbox.path().to_path_buf();
        let link_health = config
            .telemetry
            .link_health
            .then(|| LinkHealthMonitor::new(folder));
        let injector = TelemetryInjector::new(inbox, link_health, config.telemetry.temperature);

        let probe = if config.telemetry.temperature {
            TemperatureProbe::detect()
        } else {
            TemperatureProbe::disabled()
        };

        let started = Instant::now();
        let debounce = DebounceEngine::new(
            config.rc.channel,
            config.rc.wait_after_command_ms,
            config.rc.persist_period_ms,
            0,
            ScriptRunner::new(folder),
        );
        if config.rc.channel == 0 {
            info!("rc channel monitoring disabled");
        } else {
            info!(channel = config.rc.channel, "monitoring rc channel");
        }

        Ok(Self {
            serial,
            socket,
            out_addr,
            listen_enabled,
            policy,
            framer: Framer::new(),
            aggregator: Aggregator::new(policy),
            debounce,
            injector,
            probe,
            inbox_path,
            started,
            serial_reads: 0,
            serial_bytes: 0,
            version_logged: false,
            fc_identified: false,
        })
    }

    /// Milliseconds since the bridge started (monotonic)
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Run the reactor until a signal or a transport fault ends it.
    pub async fn run(mut self) -> Result<()> {
        let mut serial_buf = [0u8; SERIAL_CHUNK];
        let mut udp_buf = [0u8; MAX_DATAGRAM];

        let mut sensor_timer = interval(Duration::from_secs(1));
        let mut sigusr1: Signal = signal(SignalKind::user_defined1())?;

        loop {
            tokio::select! {
                read = self.serial.read(&mut serial_buf) => {
                    match read {
                        Ok(0) => {
                            info!("serial connection closed");
                            break;
                        }
                        Ok(n) => self.on_serial_chunk(&serial_buf[..n]).await?,
                        Err(e) => {
                            warn!(error = %e, "serial read failed");
                            return Err(e.into());
                        }
                    }
                }

                received = self.socket.recv_from(&mut udp_buf), if self.listen_enabled => {
                    let (n, _) = received?;
                    self.on_inbound_datagram(&udp_buf[..n]).await?;
                }

                _ = sensor_timer.tick() => {
                    self.probe.poll();
                }

                _ = sigusr1.recv() => {
                    info!("sending test mavlink msg");
                    if let Err(e) = fs::write(&self.inbox_path, TEST_MESSAGE) {
                        warn!(error = %e, "could not write test message");
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    break;
                }
            }
        }

        info!(
            reads = self.serial_reads,
            bytes = self.serial_bytes,
            flushes = self.aggregator.flushes(),
            "bridge stopped"
        );
        Ok(())
    }

    /// One serial read's worth of bytes.
    async fn on_serial_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.serial_reads += 1;
        self.serial_bytes += chunk.len() as u64;

        // If the link carries garbage only, give some feedback to diagnose
        if !self.version_logged && self.serial_reads % 10 == 3 {
            info!(
                reads = self.serial_reads,
                bytes = self.serial_bytes,
                "no packets recognized yet"
            );
        }

        if !self.policy.parses_stream() {
            self.socket.send_to(chunk, self.out_addr).await?;
            return Ok(());
        }

        for packet in self.framer.push(chunk) {
            self.inspect_packet(&packet);
            for flush in self.aggregator.on_packet(&packet) {
                self.transmit(flush).await?;
            }
        }
        Ok(())
    }

    /// Identity logging and per-message decoding for a forwarded packet.
    fn inspect_packet(&mut self, packet: &Packet) {
        let header = &packet.header;

        if !self.version_logged {
            self.version_logged = true;
            info!(
                version = %header.version(),
                system_id = header.system_id(),
                "detected MAVLink stream"
            );
        }
        self.injector.set_system_id(header.system_id());

        debug!(
            dir = ">>",
            version = %header.version(),
            sender = format_args!("{}/{}", header.system_id(), header.component_id()),
            seq = header.sequence(),
            msg_id = header.message_id(),
            "packet"
        );

        if header.message_id() == MSG_ID_HEARTBEAT && !self.fc_identified {
            self.fc_identified = true;
            let autopilot = decode_heartbeat_autopilot(packet.payload());
            info!(autopilot = autopilot.label(), "flight controller type");
        }

        if let Some(channels) = decode_rc_channels(packet) {
            debug!(count = channels.count(), values = ?channels.values(), "rc channels");
            self.debounce.on_channels(&channels, self.now_ms());
        }
    }

    /// Send one flush and let the injector top up the emptied buffer.
    async fn transmit(&mut self, flush: Flush) -> Result<()> {
        self.socket.send_to(&flush.bytes, self.out_addr).await?;
        debug!(
            packets = flush.packets,
            bytes = flush.bytes.len(),
            reason = ?flush.reason,
            "flush sent"
        );

        let injected = self
            .injector
            .after_flush(self.probe.last(), self.now_ms());
        self.aggregator.append_injected(&injected);
        Ok(())
    }

    /// Return-direction datagram: inspect for logging, write to the serial
    /// link verbatim.
    async fn on_inbound_datagram(&mut self, datagram: &[u8]) -> Result<()> {
        if datagram.len() <= MIN_INBOUND_LEN {
            return Ok(());
        }

        if let Some(header) = PacketHeader::parse(datagram) {
            debug!(
                dir = "<<",
                version = %header.version(),
                sender = format_args!("{}/{}", header.system_id(), header.component_id()),
                seq = header.sequence(),
                msg_id = header.message_id(),
                "packet"
            );
        }

        self.serial.write_all(datagram).await?;
        self.serial.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_bounds() {
        // Inbound datagrams must clear the minimum MAVLink header
        assert_eq!(MIN_INBOUND_LEN, 6);
        assert!(MAX_DATAGRAM >= crate::aggregator::PENDING_CAPACITY);
    }

    #[tokio::test]
    async fn test_bridge_rejects_missing_serial_device() {
        let mut config = Config::default();
        config.serial.port = "/dev/nonexistent_uart_42".to_string();

        assert!(Bridge::new(&config).await.is_err());
    }
}
