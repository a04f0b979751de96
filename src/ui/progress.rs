use std::sync::Arc;
use tokio::sync::Mutex;
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::task::messages::ChunkEvent;
use crate::core::task::status::{human_bytes, DownloadStatus};

const PERCENT_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}";
const BYTES_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";

// 结构体：ProgressManager
// 用于管理下载进度条
pub struct ProgressManager {
    progress_bars: Arc<Mutex<Vec<ProgressBar>>>,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        ProgressManager {
            progress_bars: Arc::new(Mutex::new(Vec::new())),
        }
    }

    // 引擎任务的进度条，按百分比显示，返回索引
    pub async fn add_task_bar(&self, gid: &str) -> usize {
        let pb = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template(PERCENT_TEMPLATE) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(gid.to_string());
        self.push(pb).await
    }

    // 分块下载的进度条，按字节显示，返回索引
    pub async fn add_byte_bar(&self, name: &str) -> usize {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(BYTES_TEMPLATE) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(name.to_string());
        self.push(pb).await
    }

    async fn push(&self, pb: ProgressBar) -> usize {
        let mut bars = self.progress_bars.lock().await;
        bars.push(pb);
        bars.len() - 1
    }

    // 用一次完整快照刷新进度条
    pub async fn apply_status(&self, index: usize, status: &DownloadStatus) {
        if let Some(pb) = self.progress_bars.lock().await.get(index) {
            pb.set_position(status.percent as u64);
            pb.set_message(format_status_line(status));
        }
    }

    // 分块下载事件：重试时进度归零
    pub async fn apply_chunk_event(&self, index: usize, event: &ChunkEvent) {
        if let Some(pb) = self.progress_bars.lock().await.get(index) {
            match event {
                ChunkEvent::TotalSize(total) => {
                    pb.set_length(*total);
                    pb.set_position(0);
                }
                ChunkEvent::Progress(delta) => pb.inc(*delta),
                ChunkEvent::Retrying { attempt, reason } => {
                    pb.set_position(0);
                    pb.set_message(format!("第 {} 次尝试 ({})", attempt, reason));
                }
                ChunkEvent::Finished { failed } => {
                    let msg = if *failed { "下载失败" } else { "下载完成" };
                    pb.finish_with_message(msg);
                }
            }
        }
    }

    pub async fn finish(&self, index: usize, failed: bool) {
        if let Some(pb) = self.progress_bars.lock().await.get(index) {
            if failed {
                pb.abandon_with_message("已停止");
            } else {
                pb.finish_with_message("下载完成");
            }
        }
    }
}

/// 进度 | 速度 | 已完成/总大小 | ETA
pub fn format_status_line(status: &DownloadStatus) -> String {
    format!(
        "{} | {} | {}/{} | ETA:{}",
        status.progress_string(),
        status.speed_string(),
        human_bytes(status.completed_length),
        human_bytes(status.total_length),
        status.eta_string()
    )
}
