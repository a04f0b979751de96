mod progress;

use std::fmt;
use std::path::PathBuf;
pub use progress::{format_status_line, ProgressManager};

use crate::core::task::status::human_bytes;

pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

pub fn print_error(message: &str) {
    println!("✗ {}", message);
}

/// 一次下载结束后的摘要
pub struct DownloadSummary {
    pub id: String,
    pub files: Vec<PathBuf>,
    pub total_size: u64,
    pub elapsed_time: std::time::Duration,
    pub failed: bool,
    pub attempts: usize,
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n下载摘要:")?;
        writeln!(f, "任务: {}", self.id)?;
        for file in &self.files {
            writeln!(f, "文件: {}", file.display())?;
        }
        writeln!(f, "总大小: {}", human_bytes(self.total_size))?;
        writeln!(f, "耗时: {:.2}秒", self.elapsed_time.as_secs_f64())?;
        if self.attempts > 1 {
            writeln!(f, "尝试次数: {}", self.attempts)?;
        }
        writeln!(f, "结果: {}", if self.failed { "失败" } else { "成功" })?;
        Ok(())
    }
}
