//! # Link Health Monitor
//!
//! The wifibroadcast transmitter's output is redirected into a log file in
//! the working folder. Lines like
//!
//! ```text
//! UDP rxq overflow: 45 packets dropped
//! ```
//!
//! are parsed for their leading numeric token and summed into a
//! dropped-packet total the ground station gets told about. The file is
//! truncated after each read so counts are per-interval; deleting it would
//! break the console redirection writing to it.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Log file name inside the working folder
pub const LOG_FILE: &str = "wfb.log";

/// Line marker identifying a drop report
const DROP_MARKER: &str = "packets dropped";

/// Max lines parsed in one pass; past this the exact count is not worth the
/// stall and the saturating sentinel is reported instead
const MAX_LINES_PER_PASS: usize = 30;

/// Saturating sentinel reported when the log is too long to parse
pub const SATURATED_DROP_COUNT: u32 = 9999;

/// Parses and truncates the radio stack's log file.
#[derive(Debug, Clone)]
pub struct LinkHealthMonitor {
    path: PathBuf,
}

impl LinkHealthMonitor {
    /// Monitor reading from the bridge's working folder
    pub fn new(folder: &Path) -> Self {
        Self {
            path: folder.join(LOG_FILE),
        }
    }

    /// Dropped packets accumulated since the last call.
    ///
    /// Returns `None` when the file is missing, unreadable or carries no
    /// drop reports; `Some(SATURATED_DROP_COUNT)` when there was too much
    /// to parse. The file is truncated after a successful read.
    pub fn drain_dropped(&self) -> Option<u32> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(_) => {
                debug!(path = %self.path.display(), "no link health log");
                return None;
            }
        };

        let mut total: u32 = 0;
        let mut lines_parsed = 0usize;
        let mut saturated = false;

        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "log read failed");
                    break;
                }
            };

            lines_parsed += 1;
            if lines_parsed > MAX_LINES_PER_PASS {
                saturated = true;
                break;
            }

            if line.contains(DROP_MARKER) {
                if let Some(count) = first_numeric_token(&line) {
                    total = total.saturating_add(count);
                }
            }
        }

        if lines_parsed == 0 {
            return None;
        }

        // Truncate, not delete: the writer keeps its open handle
        if let Err(e) = fs::File::create(&self.path) {
            warn!(path = %self.path.display(), error = %e, "log truncate failed");
        }

        if saturated {
            return Some(SATURATED_DROP_COUNT);
        }
        (total > 0).then_some(total)
    }
}

/// First whitespace-separated token that starts with a digit, parsed leniently
fn first_numeric_token(line: &str) -> Option<u32> {
    line.split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(|token| {
            token
                .trim_end_matches(|c: char| !c.is_ascii_digit())
                .parse()
                .ok()
        })
}
