//! 单个任务的轮询器
//!
//! 状态流转：`Created → Polling → (Stopping | Completing | Failing) → Terminated`。
//! 每轮查询一次引擎状态，非终止状态时把完整快照发给订阅者，然后按间隔休眠。
//! 循环结束后调用 `EngineService::finalize`，用户停止或查询出错都按取消处理。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::messages::{WatchEvent, WatchReceiver, WatchSender};
use super::service::EngineService;
use super::state::{PollInterval, TaskState, WatcherState};
use super::status::DownloadStatus;
use crate::core::error::{EngineError, EngineResult};

/// 轮询结束后的结果
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOutcome {
    pub gid: String,
    /// 观察到的终止状态，取消或出错时为 None
    pub final_state: Option<TaskState>,
    pub cancelled: bool,
    pub failed: bool,
    pub error: Option<String>,
}

/// 轮询任务与调用方共享的状态
struct WatcherShared {
    stop: AtomicBool,
    wake: Notify,
    error: Mutex<Option<String>>,
    interval: Mutex<PollInterval>,
    status: Mutex<DownloadStatus>,
    state: Mutex<WatcherState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WatcherShared {
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn is_cancelled(&self) -> bool {
        self.stop_requested() || lock(&self.error).is_some()
    }

    fn set_state(&self, state: WatcherState) {
        *lock(&self.state) = state;
    }
}

pub struct TaskWatcher {
    gid: String,
    uris: Vec<String>,
    service: Arc<EngineService>,
    shared: Arc<WatcherShared>,
    events: Option<WatchSender>,
    handle: Option<JoinHandle<WatchOutcome>>,
}

impl TaskWatcher {
    /// 提交任务并记录初始状态，此时尚未开始轮询
    pub async fn create(
        service: Arc<EngineService>,
        uris: Vec<String>,
        interval: PollInterval,
    ) -> EngineResult<(Self, WatchReceiver)> {
        let gid = service.submit(uris.clone()).await?;

        let initial = match service.query_status(&gid).await {
            Ok(status) => status,
            Err(e) => {
                log::error!("获取任务 {} 初始状态失败: {}", gid, e);
                service.finalize(&gid, true).await?;
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(WatcherShared {
            stop: AtomicBool::new(false),
            wake: Notify::new(),
            error: Mutex::new(None),
            interval: Mutex::new(interval),
            status: Mutex::new(initial),
            state: Mutex::new(WatcherState::Created),
        });

        Ok((
            Self { gid, uris, service, shared, events: Some(tx), handle: None },
            rx,
        ))
    }

    /// 在独立的 tokio 任务上开始轮询，只能调用一次
    pub fn start(&mut self) -> bool {
        let Some(events) = self.events.take() else {
            return false;
        };
        self.shared.set_state(WatcherState::Polling);
        log::info!("开始监视任务 {}: {:?}", self.gid, self.uris);

        let gid = self.gid.clone();
        let service = Arc::clone(&self.service);
        let shared = Arc::clone(&self.shared);
        self.handle = Some(tokio::spawn(poll_loop(gid, service, shared, events)));
        true
    }

    /// 先在引擎侧暂停，再通知轮询循环退出
    pub async fn stop(&self) {
        log::info!("停止监视任务 {}", self.gid);
        self.service.pause(&self.gid).await;
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }

    /// 等待轮询结束
    pub async fn join(&mut self) -> EngineResult<WatchOutcome> {
        let handle = self.handle.take().ok_or(EngineError::Cancelled)?;
        handle.await.map_err(|e| {
            log::error!("任务 {} 的轮询异常结束: {}", self.gid, e);
            EngineError::Cancelled
        })
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    /// 用户请求停止或轮询出错
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.shared.error).clone()
    }

    pub fn interval(&self) -> Duration {
        lock(&self.shared.interval).as_duration()
    }

    /// 下一次休眠开始生效
    pub fn set_interval(&self, interval: impl Into<PollInterval>) {
        *lock(&self.shared.interval) = interval.into();
    }

    pub fn status(&self) -> DownloadStatus {
        lock(&self.shared.status).clone()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        lock(&self.shared.status).files.clone()
    }

    pub fn state(&self) -> WatcherState {
        *lock(&self.shared.state)
    }
}

async fn poll_loop(
    gid: String,
    service: Arc<EngineService>,
    shared: Arc<WatcherShared>,
    events: WatchSender,
) -> WatchOutcome {
    let mut final_state = None;

    while !shared.stop_requested() {
        let status = match service.query_status(&gid).await {
            Ok(status) => status,
            Err(e) => {
                log::error!("查询任务 {} 状态失败: {}", gid, e);
                *lock(&shared.error) = Some(e.to_string());
                break;
            }
        };

        if status.is_terminal() {
            final_state = Some(status.state);
            *lock(&shared.status) = status;
            break;
        }
        if shared.stop_requested() {
            break;
        }

        log::debug!(
            "任务 {}: {} {} {} ETA {}",
            gid,
            status.state,
            status.progress_string(),
            status.speed_string(),
            status.eta_string()
        );
        *lock(&shared.status) = status.clone();
        let _ = events.send(WatchEvent::Status(status));

        let interval = lock(&shared.interval).as_duration();
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shared.wake.notified() => {}
        }
    }

    let cancelled = shared.is_cancelled();
    let next_state = if shared.stop_requested() {
        WatcherState::Stopping
    } else if final_state == Some(TaskState::Complete) {
        WatcherState::Completing
    } else {
        WatcherState::Failing
    };
    shared.set_state(next_state);

    if let Err(e) = service.finalize(&gid, cancelled).await {
        log::error!("任务 {} 收尾失败: {}", gid, e);
    }

    let failed = cancelled || final_state != Some(TaskState::Complete);
    if failed {
        log::warn!("任务 {} 结束 (状态: {:?}, 取消: {})", gid, final_state, cancelled);
    } else {
        log::info!("任务 {} 下载完成", gid);
    }

    shared.set_state(WatcherState::Terminated);
    let _ = events.send(WatchEvent::Finished { gid: gid.clone(), failed });

    WatchOutcome {
        gid,
        final_state,
        cancelled,
        failed,
        error: lock(&shared.error).clone(),
    }
}
