//! # Board Temperature Probe
//!
//! Two SoC families are supported, detected at startup:
//!
//! - **SigmaStar**: a sysfs node exposing `Temperature <value>` text.
//! - **HiSilicon/Goke**: no sysfs node; the T-Sensor register bank is
//!   memory-mapped from `/dev/mem` and the cyclic capture mode is enabled
//!   once through MISC_CTRL45.
//!
//! Either way the probe is polled on the reactor's 1-second timer and keeps
//! the latest sample; an unreadable source simply yields no sample and is
//! never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info, warn};

/// SigmaStar sysfs temperature node
pub const SIGMASTAR_TEMP_PATH: &str = "/sys/devices/virtual/mstar/msys/TEMP_R";

/// HiSilicon/Goke T-Sensor register bank physical base
const HISI_TSENSOR_BASE: u64 = 0x1202_8000;

/// Mapped window size
const HISI_TSENSOR_LEN: usize = 0x1_0000;

/// MISC_CTRL45 offset (capture configuration)
const HISI_MISC_CTRL45: usize = 0xB4;

/// Temperature sample register offset
const HISI_TEMP_SAMPLE: usize = 0xBC;

/// Temperature backend selected at startup
enum Backend {
    SigmaStar(PathBuf),
    HiSilicon(MmapMut),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SigmaStar(path) => f.debug_tuple("SigmaStar").field(path).finish(),
            Self::HiSilicon(_) => f.debug_tuple("HiSilicon").finish(),
        }
    }
}

/// Latest-value temperature probe.
#[derive(Debug)]
pub struct TemperatureProbe {
    backend: Option<Backend>,
    last: Option<f32>,
}

impl TemperatureProbe {
    /// Probe that never yields a sample (temperature injection off)
    pub fn disabled() -> Self {
        Self {
            backend: None,
            last: None,
        }
    }

    /// Detect the SoC's temperature source.
    ///
    /// SigmaStar is preferred when its sysfs node answers; otherwise the
    /// HiSilicon register bank is mapped and armed. Detection failure
    /// leaves a probe that yields nothing.
    pub fn detect() -> Self {
        if let Some(value) = read_sigmastar(Path::new(SIGMASTAR_TEMP_PATH)) {
            info!(%value, "found SigmaStar temperature sensor");
            return Self {
                backend: Some(Backend::SigmaStar(PathBuf::from(SIGMASTAR_TEMP_PATH))),
                last: Some(value),
            };
        }

        match map_hisi_tsensor() {
            Ok(mmap) => {
                info!("using HiSilicon/Goke T-Sensor register");
                Self {
                    backend: Some(Backend::HiSilicon(mmap)),
                    last: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "no temperature source available");
                Self::disabled()
            }
        }
    }

    /// Probe reading a SigmaStar-style sysfs node at a custom path
    pub fn sigmastar(path: &Path) -> Self {
        Self {
            backend: Some(Backend::SigmaStar(path.to_path_buf())),
            last: None,
        }
    }

    /// Refresh the latest sample; called from the 1-second timer
    pub fn poll(&mut self) {
        let sample = match &mut self.backend {
            None => None,
            Some(Backend::SigmaStar(path)) => read_sigmastar(path),
            Some(Backend::HiSilicon(mmap)) => Some(read_hisi_sample(&*mmap)),
        };

        if let Some(value) = sample {
            if self.last.is_none() {
                info!(%value, "temperature reading");
            }
            self.last = Some(value);
        }
    }

    /// Latest temperature in degrees Celsius, if any source ever answered
    pub fn last(&self) -> Option<f32> {
        self.last
    }
}

/// Parse `Temperature <value>` out of the sysfs node's text
fn parse_sigmastar(text: &str) -> Option<f32> {
    let rest = &text[text.find("Temperature")? + "Temperature".len()..];
    rest.split_whitespace().next()?.parse().ok()
}

fn read_sigmastar(path: &Path) -> Option<f32> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            debug!(path = %path.display(), "no temperature data");
            return None;
        }
    };
    parse_sigmastar(&text)
}

/// Map the T-Sensor bank and arm cyclic capture via MISC_CTRL45:
/// bit 31 enables the sensor, bit 30 selects cyclic mode, bits 27:20 hold
/// the capture period N where T = N * 2 ms.
fn map_hisi_tsensor() -> std::io::Result<MmapMut> {
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/mem")?;

    let mut mmap = unsafe {
        MmapOptions::new()
            .offset(HISI_TSENSOR_BASE)
            .len(HISI_TSENSOR_LEN)
            .map_mut(&file)?
    };

    let ctrl: u32 = (1 << 31) | (1 << 30) | (50 << 20);
    unsafe {
        let reg = mmap.as_mut_ptr().add(HISI_MISC_CTRL45) as *mut u32;
        reg.write_volatile(ctrl);
    }

    Ok(mmap)
}

/// Sample the capture register and convert per the datasheet formula
fn read_hisi_sample(mmap: &MmapMut) -> f32 {
    let raw = unsafe {
        let reg = mmap.as_ptr().add(HISI_TEMP_SAMPLE) as *const u32;
        reg.read_volatile()
    };
    let code = (raw & 0xFFFF) as f32;
    (code - 117.0) / 798.0 * 165.0 - 40.0
}
