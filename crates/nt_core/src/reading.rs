use std::time::Duration;

/// How often accumulated reading time is pushed to the server.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Stopped,
    Running,
    /// Running, but the reader is away (terminal lost focus).
    Paused,
}

/// Counts reading seconds for one article and tracks what is still unreported.
#[derive(Debug, Clone)]
pub struct ReadingClock {
    status: TimerStatus,
    session_seconds: u64,
    total_seconds: u64,
    reported_seconds: u64,
}

impl ReadingClock {
    pub fn new(initial_total: u64) -> Self {
        Self {
            status: TimerStatus::Stopped,
            session_seconds: 0,
            total_seconds: initial_total,
            reported_seconds: 0,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn session_seconds(&self) -> u64 {
        self.session_seconds
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub fn start(&mut self) {
        self.status = TimerStatus::Running;
    }

    pub fn stop(&mut self) {
        self.status = TimerStatus::Stopped;
    }

    pub fn toggle(&mut self) {
        match self.status {
            TimerStatus::Stopped => self.start(),
            TimerStatus::Running | TimerStatus::Paused => self.stop(),
        }
    }

    /// Focus lost. A stopped clock stays stopped.
    pub fn pause(&mut self) {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
        }
    }

    /// Focus regained.
    pub fn resume(&mut self) {
        if self.status == TimerStatus::Paused {
            self.status = TimerStatus::Running;
        }
    }

    /// One second elapsed.
    pub fn tick(&mut self) {
        if self.status == TimerStatus::Running {
            self.session_seconds += 1;
            self.total_seconds += 1;
        }
    }

    pub fn unreported(&self) -> u64 {
        self.session_seconds - self.reported_seconds
    }

    /// Takes the seconds not yet sent to the server, marking them as sent.
    pub fn take_delta(&mut self) -> Option<u64> {
        let delta = self.unreported();
        if delta == 0 {
            return None;
        }
        self.reported_seconds = self.session_seconds;
        Some(delta)
    }

    /// Gives back a delta whose report failed so it goes out with the next one.
    pub fn restore(&mut self, delta: u64) {
        self.reported_seconds = self.reported_seconds.saturating_sub(delta);
    }
}

/// `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
