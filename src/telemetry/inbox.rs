//! # Operator Message Inbox
//!
//! Other processes on the camera signal a pending ground-bound text message
//! by writing a small file into the working folder. The bridge picks the
//! text up, deletes the file and sends the message inside the next batch.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::mavlink::protocol::MAX_STATUSTEXT_LEN;

/// Inbox file name inside the working folder
pub const INBOX_FILE: &str = "mavlink.msg";

/// File-based operator message inbox.
#[derive(Debug, Clone)]
pub struct MessageInbox {
    path: PathBuf,
}

impl MessageInbox {
    /// Inbox living in the bridge's working folder
    pub fn new(folder: &Path) -> Self {
        Self {
            path: folder.join(INBOX_FILE),
        }
    }

    /// Path of the inbox file (used by the SIGUSR1 test-message hook)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the pending message, if any.
    ///
    /// Reads at most the STATUSTEXT text cap and deletes the file after a
    /// successful non-empty read. A missing file is the common case and
    /// means "no message"; an empty file is logged and left alone.
    pub fn take_message(&self) -> Option<String> {
        let mut file = fs::File::open(&self.path).ok()?;

        let mut buf = [0u8; MAX_STATUSTEXT_LEN];
        let read = match file.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "inbox read failed");
                return None;
            }
        };

        if read == 0 {
            warn!(path = %self.path.display(), "inbox file is empty");
            return None;
        }

        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not delete inbox file");
        }

        let text = String::from_utf8_lossy(&buf[..read]).trim_end().to_string();
        debug!(text = %text, "operator message taken from inbox");
        Some(text)
    }
}
