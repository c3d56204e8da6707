//! # RC Channel Debounce Engine
//!
//! Watches one operator-selected RC channel and turns "the channel settled
//! at a new value" into a rate-limited external command invocation.
//!
//! State machine per reading: `Idle` (no candidate) → `Settling` (candidate
//! seen, waiting for persistence) → `Committed` (value accepted, command
//! dispatched). A candidate must stay within the settle threshold for the
//! configured persist period before it can commit, and a committed value
//! must differ from the previous one by more than the threshold to count as
//! an operator action at all.
//!
//! The very first would-be commit after process start is suppressed: right
//! after startup the engine always receives *some* channel value, and
//! acting on it would fire the command script on every boot.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::mavlink::decoder::ChannelSet;

/// Channel movement below this is jitter, not an operator action
pub const SETTLE_THRESHOLD: u16 = 32;

/// Dispatches the external command for a committed channel value.
///
/// Fire-and-forget: implementations must not block the reactor and the
/// command's exit status is not observed.
pub trait CommandRunner {
    fn run(&self, channel: u8, value: u16);
}

/// Runs `channels.sh <channel> <value>` from the configured working folder.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    script: PathBuf,
}

impl ScriptRunner {
    /// Command script living in the bridge's working folder
    pub fn new(folder: &Path) -> Self {
        Self {
            script: folder.join("channels.sh"),
        }
    }
}

impl CommandRunner for ScriptRunner {
    fn run(&self, channel: u8, value: u16) {
        // Spawned detached; the child outlives the handle and is never waited on.
        match tokio::process::Command::new(&self.script)
            .arg(channel.to_string())
            .arg(value.to_string())
            .spawn()
        {
            Ok(_) => info!(script = %self.script.display(), channel, value, "command dispatched"),
            Err(e) => warn!(script = %self.script.display(), error = %e, "command spawn failed"),
        }
    }
}

/// Debounce state for the single monitored channel.
///
/// Created at startup with no committed value and lives for the process
/// lifetime; mutated only by [`DebounceEngine::on_channels`].
#[derive(Debug, Clone, Copy)]
struct DebounceState {
    last_committed_value: u16,
    candidate_value: u16,
    candidate_since: u64,
    last_command_at: u64,
    commands_issued: u32,
}

/// Turns channel sets into rate-limited external commands.
pub struct DebounceEngine<R: CommandRunner> {
    /// 1-based channel to watch; 0 disables monitoring entirely
    channel: u8,
    /// Minimum gap between committed commands, milliseconds
    wait_after_command: u64,
    /// How long a candidate must persist before committing, milliseconds
    persist_period: u64,
    runner: R,
    state: DebounceState,
}

impl<R: CommandRunner> DebounceEngine<R> {
    /// Create an engine.
    ///
    /// # Arguments
    ///
    /// * `channel` - 1-based channel number to monitor, 0 to disable
    /// * `wait_after_command` - Rate limit between commands, milliseconds
    /// * `persist_period` - Required candidate stability, milliseconds; 0
    ///   skips the settling stage entirely
    /// * `now_ms` - Startup timestamp, so the rate limit covers boot time
    /// * `runner` - Command dispatcher
    pub fn new(
        channel: u8,
        wait_after_command: u64,
        persist_period: u64,
        now_ms: u64,
        runner: R,
    ) -> Self {
        Self {
            channel,
            wait_after_command,
            persist_period,
            runner,
            state: DebounceState {
                last_committed_value: 0,
                candidate_value: 0,
                candidate_since: 0,
                last_command_at: now_ms,
                commands_issued: 0,
            },
        }
    }

    /// Whether monitoring is active at all
    pub fn enabled(&self) -> bool {
        self.channel != 0
    }

    /// Commands committed so far (the suppressed first commit included)
    pub fn commands_issued(&self) -> u32 {
        self.state.commands_issued
    }

    /// Evaluate one new channel set.
    ///
    /// Transition rules, in order:
    /// 1. within the rate-limit window → ignore the reading entirely
    /// 2. value far from the candidate → new candidate, start settling
    /// 3. candidate not yet persisted → keep waiting
    /// 4. persisted but close to the last committed value → discard
    /// 5. otherwise commit and dispatch (first commit ever: suppressed)
    pub fn on_channels(&mut self, channels: &ChannelSet, now_ms: u64) {
        if !self.enabled() {
            return;
        }

        if now_ms.saturating_sub(self.state.last_command_at) < self.wait_after_command {
            return;
        }

        let value = channels.channel(self.channel);

        if value.abs_diff(self.state.candidate_value) > SETTLE_THRESHOLD && self.persist_period > 0 {
            self.state.candidate_value = value;
            self.state.candidate_since = now_ms;
            debug!(channel = self.channel, value, "new candidate, settling");
            return;
        }

        if now_ms.saturating_sub(self.state.candidate_since) < self.persist_period {
            return;
        }

        if value.abs_diff(self.state.last_committed_value) < SETTLE_THRESHOLD {
            return;
        }

        self.state.candidate_value = value;
        self.state.last_committed_value = value;
        self.state.last_command_at = now_ms;

        // Startup always delivers some channel value; the first commit is
        // presumed noise, counted but never executed.
        if self.state.commands_issued > 0 {
            self.runner.run(self.channel, value);
        } else {
            info!(channel = self.channel, value, "first channel commit suppressed");
        }
        self.state.commands_issued += 1;
    }
}
