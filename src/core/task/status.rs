//! 引擎原始状态到 `DownloadStatus` 快照的投影

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{EngineError, EngineResult};
use super::state::TaskState;

/// `aria2.tellStatus` 返回的原始结构，数值字段均为字符串
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatus {
    pub gid: String,
    pub status: String,
    #[serde(default)]
    pub total_length: String,
    #[serde(default)]
    pub completed_length: String,
    #[serde(default)]
    pub download_speed: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub files: Vec<RawFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFile {
    #[serde(default)]
    pub path: String,
}

/// 单次轮询得到的完整状态快照，构造后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub gid: String,
    pub state: TaskState,
    /// 字节/秒
    pub speed: u64,
    /// 0.0 - 100.0
    pub progress: f64,
    /// 进度条用的整数百分比
    pub percent: u8,
    pub total_length: u64,
    pub completed_length: u64,
    pub files: Vec<PathBuf>,
    pub eta: Option<Duration>,
    pub error_message: Option<String>,
}

impl DownloadStatus {
    pub fn from_raw(raw: RawStatus) -> EngineResult<Self> {
        let state = TaskState::parse(&raw.status)
            .ok_or_else(|| EngineError::transport(format!("未知任务状态: {}", raw.status)))?;

        let total_length = parse_number(&raw.total_length);
        let mut completed_length = parse_number(&raw.completed_length);
        if total_length > 0 {
            completed_length = completed_length.min(total_length);
        }
        let speed = parse_number(&raw.download_speed);

        let progress = if total_length > 0 {
            (completed_length as f64 / total_length as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let eta = if speed > 0 && total_length > 0 {
            Some(Duration::from_secs((total_length - completed_length) / speed))
        } else {
            None
        };

        let error_message = match (raw.error_code.as_deref(), raw.error_message) {
            (_, Some(msg)) if !msg.is_empty() => Some(msg),
            (Some(code), _) if code != "0" => Some(format!("错误码 {}", code)),
            _ => None,
        };

        Ok(Self {
            gid: raw.gid,
            state,
            speed,
            progress,
            percent: progress as u8,
            total_length,
            completed_length,
            files: raw
                .files
                .into_iter()
                .filter(|f| !f.path.is_empty())
                .map(|f| PathBuf::from(f.path))
                .collect(),
            eta,
            error_message,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn speed_string(&self) -> String {
        format!("{}/s", human_bytes(self.speed))
    }

    pub fn progress_string(&self) -> String {
        format!("{:.2}%", self.progress)
    }

    pub fn total_length_string(&self) -> String {
        human_bytes(self.total_length)
    }

    pub fn completed_length_string(&self) -> String {
        human_bytes(self.completed_length)
    }

    pub fn eta_string(&self) -> String {
        match self.eta {
            Some(eta) => format_eta(eta.as_secs()),
            None => "-".to_string(),
        }
    }
}

fn parse_number(value: &str) -> u64 {
    value.trim().parse::<u64>().unwrap_or(0)
}

/// 以 1024 为底的可读大小
pub fn human_bytes(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = size as f64;
    let mut unit_index = 0;

    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit_index])
    }
}

pub fn format_eta(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
