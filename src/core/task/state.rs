use serde::{Serialize, Deserialize};
use std::fmt;
use std::time::Duration;

/// 引擎报告的任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Active,
    Waiting,
    Paused,
    Error,
    Complete,
    Removed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Active => "active",
            TaskState::Waiting => "waiting",
            TaskState::Paused => "paused",
            TaskState::Error => "error",
            TaskState::Complete => "complete",
            TaskState::Removed => "removed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(TaskState::Active),
            "waiting" => Some(TaskState::Waiting),
            "paused" => Some(TaskState::Paused),
            "error" => Some(TaskState::Error),
            "complete" => Some(TaskState::Complete),
            "removed" => Some(TaskState::Removed),
            _ => None,
        }
    }

    /// complete / error / removed 之后不会再有进度
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Error | TaskState::Removed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 轮询循环的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherState {
    Created,
    Polling,
    Stopping,
    Completing,
    Failing,
    Terminated,
}

/// 轮询间隔，最小 100 毫秒
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollInterval(Duration);

impl PollInterval {
    pub const MIN: Duration = Duration::from_millis(100);

    pub fn new(interval: Duration) -> Self {
        PollInterval(interval.max(Self::MIN))
    }

    /// 接受整数或小数秒
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return PollInterval(Self::MIN);
        }
        Self::new(Duration::from_secs_f64(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        PollInterval(Duration::from_secs(1))
    }
}

impl From<Duration> for PollInterval {
    fn from(value: Duration) -> Self {
        PollInterval::new(value)
    }
}
