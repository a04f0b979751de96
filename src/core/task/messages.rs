use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::status::DownloadStatus;

/// 轮询器发给订阅者的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WatchEvent {
    /// 每轮轮询的完整快照
    Status(DownloadStatus),
    /// 轮询结束，`failed` 为真表示取消、出错或被移除
    Finished { gid: String, failed: bool },
}

/// 分块下载器发给订阅者的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkEvent {
    /// 响应声明的总大小，每次尝试都会重新发送
    TotalSize(u64),
    /// 本块写入的字节数
    Progress(u64),
    /// 上一次尝试失败，即将开始第 `attempt` 次尝试，计数应归零
    Retrying { attempt: usize, reason: String },
    /// 唯一的终止信号
    Finished { failed: bool },
}

pub type WatchSender = UnboundedSender<WatchEvent>;
pub type WatchReceiver = UnboundedReceiver<WatchEvent>;
pub type ChunkSender = UnboundedSender<ChunkEvent>;
pub type ChunkReceiver = UnboundedReceiver<ChunkEvent>;
