//! aria2ctl: aria2 下载引擎控制器
//!
//! - `core::engine`: 引擎进程管理与 JSON-RPC 客户端
//! - `core::task`: 任务登记、状态查询与轮询
//! - `core::chunked`: 不依赖引擎的分块 HTTP 下载
//! - `ui`: 终端进度显示
//! - `cli` / `config`: 命令行与配置文件

pub mod cli;
pub mod config;
pub mod core;
pub mod ui;
pub mod utils;
