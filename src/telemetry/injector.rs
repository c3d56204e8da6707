//! # Telemetry Injector
//!
//! Appends synthetic telemetry to the pending buffer right after each
//! flush, so injected packets always ride inside an outgoing batch and
//! obey the same framing invariants as forwarded traffic.
//!
//! Three independent producers are consulted, each at most once per
//! second:
//! - operator text messages from the inbox file,
//! - dropped-packet reports from the link health monitor,
//! - the latest board temperature sample.

use tracing::debug;

use crate::mavlink::encoder::{MavEncoder, SEVERITY_WARNING};
use crate::telemetry::inbox::MessageInbox;
use crate::telemetry::link_health::LinkHealthMonitor;

/// Minimum gap between two messages from the same producer, milliseconds
const PRODUCER_INTERVAL_MS: u64 = 1000;

/// Tracks one producer's rate limit window
#[derive(Debug, Default, Clone, Copy)]
struct RateLimit {
    last_at: Option<u64>,
}

impl RateLimit {
    /// Claim the window if it is open; the claim sticks even when the
    /// producer then has nothing to say, which caps collaborator I/O at
    /// the same 1 Hz
    fn try_claim(&mut self, now_ms: u64) -> bool {
        match self.last_at {
            Some(last) if now_ms.saturating_sub(last) < PRODUCER_INTERVAL_MS => false,
            _ => {
                self.last_at = Some(now_ms);
                true
            }
        }
    }
}

/// Builds the synthetic bytes appended after a flush.
pub struct TelemetryInjector {
    encoder: MavEncoder,
    inbox: MessageInbox,
    link_health: Option<LinkHealthMonitor>,
    temperature_enabled: bool,
    message_limit: RateLimit,
    health_limit: RateLimit,
    temperature_limit: RateLimit,
}

impl TelemetryInjector {
    /// Create an injector.
    ///
    /// # Arguments
    ///
    /// * `inbox` - Operator message inbox (always consulted)
    /// * `link_health` - Drop-count monitor, `None` when monitoring is off
    /// * `temperature_enabled` - Whether temperature samples are injected
    pub fn new(
        inbox: MessageInbox,
        link_health: Option<LinkHealthMonitor>,
        temperature_enabled: bool,
    ) -> Self {
        Self {
            encoder: MavEncoder::default(),
            inbox,
            link_health,
            temperature_enabled,
            message_limit: RateLimit::default(),
            health_limit: RateLimit::default(),
            temperature_limit: RateLimit::default(),
        }
    }

    /// Adopt the system id observed on the flight controller stream so
    /// injected packets are attributed to the vehicle
    pub fn set_system_id(&mut self, system_id: u8) {
        self.encoder.set_system_id(system_id);
    }

    /// Collect whatever the producers have to say, as ready-to-append
    /// frame bytes. Called immediately after each flush; an empty result
    /// means nothing to inject this cycle.
    pub fn after_flush(&mut self, temperature: Option<f32>, now_ms: u64) -> Vec<u8> {
        let mut out = Vec::new();

        if self.message_limit.try_claim(now_ms) {
            if let Some(text) = self.inbox.take_message() {
                out.extend_from_slice(&self.encoder.statustext(SEVERITY_WARNING, &text));
            }
        }

        if let Some(monitor) = &self.link_health {
            if self.health_limit.try_claim(now_ms) {
                if let Some(dropped) = monitor.drain_dropped() {
                    let text = format!("{} video pckts dropped!", dropped);
                    debug!(dropped, "reporting link health to ground");
                    out.extend_from_slice(&self.encoder.statustext(SEVERITY_WARNING, &text));
                }
            }
        }

        if self.temperature_enabled && self.temperature_limit.try_claim(now_ms) {
            if let Some(celsius) = temperature {
                let centi = (celsius * 100.0) as i16;
                out.extend_from_slice(&self.encoder.raw_imu_temperature(0, centi));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::decoder::{decode_raw_imu_temperature, decode_statustext};
    use crate::mavlink::framer::Framer;
    use crate::mavlink::protocol::{MSG_ID_RAW_IMU, MSG_ID_STATUSTEXT};
    use crate::telemetry::link_health::LOG_FILE;
    use std::fs;
    use tempfile::tempdir;

    fn injector(dir: &std::path::Path, health: bool, temp: bool) -> TelemetryInjector {
        TelemetryInjector::new(
            MessageInbox::new(dir),
            health.then(|| LinkHealthMonitor::new(dir)),
            temp,
        )
    }

    #[test]
    fn test_nothing_pending_injects_nothing() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), true, true);
        assert!(inj.after_flush(None, 0).is_empty());
    }

    #[test]
    fn test_operator_message_round_trip() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), false, false);
        fs::write(dir.path().join("mavlink.msg"), "camera ready").unwrap();

        let bytes = inj.after_flush(None, 0);
        let packets = Framer::new().push(&bytes);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.message_id(), MSG_ID_STATUSTEXT);

        let (_, text) = decode_statustext(packets[0].payload());
        assert_eq!(text, "camera ready");
    }

    #[test]
    fn test_link_health_round_trip() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), true, false);
        fs::write(
            dir.path().join(LOG_FILE),
            "UDP rxq overflow: 12 packets dropped\n",
        )
        .unwrap();

        let bytes = inj.after_flush(None, 0);
        let packets = Framer::new().push(&bytes);
        assert_eq!(packets.len(), 1);

        let (_, text) = decode_statustext(packets[0].payload());
        assert_eq!(text, "12 video pckts dropped!");
    }

    #[test]
    fn test_temperature_round_trip() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), false, true);

        let bytes = inj.after_flush(Some(42.5), 0);
        let packets = Framer::new().push(&bytes);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.message_id(), MSG_ID_RAW_IMU);
        assert_eq!(decode_raw_imu_temperature(packets[0].payload()), 4250);
    }

    #[test]
    fn test_producer_rate_limit_one_per_second() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), false, true);

        // Many flushes inside one second: only the first injects
        let mut injections = 0;
        for now in (0..1000).step_by(50) {
            if !inj.after_flush(Some(30.0), now).is_empty() {
                injections += 1;
            }
        }
        assert_eq!(injections, 1);

        // The next second admits exactly one more
        assert!(!inj.after_flush(Some(30.0), 1000).is_empty());
        assert!(inj.after_flush(Some(30.0), 1500).is_empty());
    }

    #[test]
    fn test_link_health_rate_limit_survives_empty_log() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), true, false);
        let log = dir.path().join(LOG_FILE);

        // First window claims with nothing to report
        assert!(inj.after_flush(None, 0).is_empty());

        // A report arriving later in the same window stays queued
        fs::write(&log, "UDP rxq overflow: 5 packets dropped\n").unwrap();
        assert!(inj.after_flush(None, 400).is_empty());
        assert!(!inj.after_flush(None, 1100).is_empty());
    }

    #[test]
    fn test_producers_combine_in_order() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), true, true);
        fs::write(dir.path().join("mavlink.msg"), "hi").unwrap();
        fs::write(
            dir.path().join(LOG_FILE),
            "UDP rxq overflow: 3 packets dropped\n",
        )
        .unwrap();

        let bytes = inj.after_flush(Some(20.0), 0);
        let packets = Framer::new().push(&bytes);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].header.message_id(), MSG_ID_STATUSTEXT);
        assert_eq!(packets[1].header.message_id(), MSG_ID_STATUSTEXT);
        assert_eq!(packets[2].header.message_id(), MSG_ID_RAW_IMU);
    }

    #[test]
    fn test_adopted_system_id_applies_to_injected_packets() {
        let dir = tempdir().unwrap();
        let mut inj = injector(dir.path(), false, true);
        inj.set_system_id(9);

        let bytes = inj.after_flush(Some(20.0), 0);
        let packets = Framer::new().push(&bytes);
        assert_eq!(packets[0].header.system_id(), 9);
    }
}
