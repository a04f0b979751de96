//! 不经过引擎的单文件分块下载
//!
//! 每次尝试都会截断目标文件重新开始，失败时按退避策略重试，
//! 无论尝试多少次都只发出一个 `ChunkEvent::Finished`。

pub mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::Config;
use crate::core::error::{EngineError, EngineResult};
use crate::core::task::messages::{ChunkEvent, ChunkReceiver, ChunkSender};
use crate::core::task::retry::{RetryContext, RetryStats, RetryStrategy};

pub use source::{ByteSource, HttpSource, SourceResponse};

/// 一次分块下载
#[derive(Debug, Clone)]
pub struct ChunkedDownloadJob {
    pub uri: String,
    pub destination: PathBuf,
    /// 总尝试次数（含第一次）
    pub retry_budget: usize,
    /// 本次尝试已写入的字节数
    pub downloaded: u64,
    /// 最近一次响应声明的总大小
    pub total: Option<u64>,
    pub last_error: Option<String>,
}

impl ChunkedDownloadJob {
    pub fn new(uri: impl Into<String>, destination: impl Into<PathBuf>, retry_budget: usize) -> Self {
        Self {
            uri: uri.into(),
            destination: destination.into(),
            retry_budget: retry_budget.max(1),
            downloaded: 0,
            total: None,
            last_error: None,
        }
    }
}

/// 分块下载结果
#[derive(Debug)]
pub struct ChunkedOutcome {
    pub job: ChunkedDownloadJob,
    pub failed: bool,
    pub stats: RetryStats,
}

pub struct ChunkedDownloader {
    source: Arc<dyn ByteSource>,
    strategy: RetryStrategy,
    chunk_size: usize,
    read_timeout: Duration,
}

impl ChunkedDownloader {
    pub fn new(config: &Config) -> EngineResult<Self> {
        Ok(Self::with_source(Arc::new(HttpSource::new(config)?), config))
    }

    pub fn with_source(source: Arc<dyn ByteSource>, config: &Config) -> Self {
        Self {
            source,
            strategy: RetryStrategy::from_config(config),
            chunk_size: config.chunk_size.max(1),
            read_timeout: Duration::from_secs(config.timeout),
        }
    }

    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// 在独立的 tokio 任务上运行
    pub fn spawn(self: Arc<Self>, job: ChunkedDownloadJob) -> (JoinHandle<ChunkedOutcome>, ChunkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut job = job;
            let (failed, stats) = self.run(&mut job, &tx).await;
            ChunkedOutcome { job, failed, stats }
        });
        (handle, rx)
    }

    /// 下载到目标文件，返回 (是否失败, 重试统计)
    pub async fn run(&self, job: &mut ChunkedDownloadJob, events: &ChunkSender) -> (bool, RetryStats) {
        let mut ctx = RetryContext::new(self.strategy.clone().with_attempts(job.retry_budget));
        log::info!("开始下载: {} -> {}", job.uri, job.destination.display());

        let mut file = match open_destination(&job.destination).await {
            Ok(file) => file,
            Err(e) => {
                log::error!("无法打开目标文件 {}: {}", job.destination.display(), e);
                job.last_error = Some(e.to_string());
                let _ = events.send(ChunkEvent::Finished { failed: true });
                return (true, ctx.get_retry_stats());
            }
        };

        let failed = loop {
            let attempt = ctx.begin_attempt();
            match self.attempt(job, &mut file, attempt, events).await {
                Ok(()) => {
                    log::info!("下载完成: {} ({} 字节, 第 {} 次尝试)", job.uri, job.downloaded, attempt);
                    break false;
                }
                Err(error) => {
                    log::warn!("下载 {} 第 {} 次尝试失败: {}", job.uri, attempt, error);
                    job.last_error = Some(error.to_string());
                    if !ctx.should_retry(&error) {
                        log::error!("下载失败: {} ({})", job.uri, error);
                        break true;
                    }
                    let delay = ctx.record_failure(&error);
                    log::info!("将在 {:?} 后重试下载 (第 {} 次尝试)", delay, attempt + 1);
                    let _ = events.send(ChunkEvent::Retrying {
                        attempt: attempt + 1,
                        reason: error.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        };

        let _ = events.send(ChunkEvent::Finished { failed });
        (failed, ctx.get_retry_stats())
    }

    async fn attempt(
        &self,
        job: &mut ChunkedDownloadJob,
        file: &mut File,
        attempt: usize,
        events: &ChunkSender,
    ) -> EngineResult<()> {
        if attempt > 1 {
            file.set_len(0).await?;
            file.rewind().await?;
        }
        job.downloaded = 0;

        let response = timeout(self.read_timeout, self.source.open(&job.uri))
            .await
            .map_err(|_| EngineError::Timeout)??;
        job.total = response.content_length;
        let _ = events.send(ChunkEvent::TotalSize(response.content_length.unwrap_or(0)));

        let mut body = response.body;
        while let Some(item) = timeout(self.read_timeout, body.next())
            .await
            .map_err(|_| EngineError::Timeout)?
        {
            let mut bytes = item?;
            while !bytes.is_empty() {
                let chunk = bytes.split_to(bytes.len().min(self.chunk_size));
                file.write_all(&chunk).await?;
                job.downloaded += chunk.len() as u64;
                let _ = events.send(ChunkEvent::Progress(chunk.len() as u64));
            }
        }
        file.flush().await?;

        match response.content_length {
            Some(expected) if job.downloaded != expected => Err(EngineError::Incomplete {
                expected,
                actual: job.downloaded,
            }),
            _ => Ok(()),
        }
    }
}

async fn open_destination(path: &Path) -> EngineResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(File::create(path).await?)
}
