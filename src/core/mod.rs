//! Core: 引擎控制、任务轮询、分块下载与错误处理等核心逻辑模块

pub mod chunked;
pub mod engine;
pub mod error;
pub mod task;

// 只导出主流程和其它模块实际用到的类型
pub use chunked::{ChunkedDownloadJob, ChunkedDownloader};
pub use error::{EngineError, EngineResult};
pub use task::{DownloadStatus, EngineService, TaskWatcher};
