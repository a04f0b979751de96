//! `task` 模块包含了与单个下载任务相关的所有逻辑
//!
//! 主要包括：
//! - `state`: 任务状态 `TaskState`、轮询器状态与轮询间隔
//! - `status`: 引擎状态快照 `DownloadStatus`
//! - `registry`: gid 登记表
//! - `service`: 引擎服务 `EngineService`
//! - `watcher`: 单任务轮询器 `TaskWatcher`
//! - `messages`: 发给订阅者的事件
//! - `retry`: 重试逻辑

pub mod state;
pub mod status;
pub mod registry;
pub mod service;
pub mod watcher;
pub mod messages;
pub mod retry;

// 导出核心组件，方便外部使用
pub use state::{PollInterval, TaskState, WatcherState};
pub use status::{DownloadStatus, RawStatus};
pub use registry::{TaskEntry, TaskRegistry};
pub use service::EngineService;
pub use watcher::{TaskWatcher, WatchOutcome};
pub use messages::{ChunkEvent, WatchEvent};
pub use self::retry::{RetryStrategy, RetryContext, RetryStats};
