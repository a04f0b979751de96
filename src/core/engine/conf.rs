//! aria2.conf 与会话文件

use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::config::{Config, RPC_LISTEN_PORT};
use crate::core::error::EngineResult;

pub const CONF_FILE_NAME: &str = "aria2.conf";
pub const SESSION_FILE_NAME: &str = "aria2.session";

/// 写入数据目录后的文件位置
#[derive(Debug, Clone)]
pub struct EngineFiles {
    pub conf_path: PathBuf,
    pub session_path: PathBuf,
    pub download_dir: PathBuf,
}

impl EngineFiles {
    /// 启动 aria2c 的命令行参数
    pub fn launch_args(&self) -> Vec<String> {
        vec![
            format!("--conf-path={}", self.conf_path.display()),
            format!("--input-file={}", self.session_path.display()),
            format!("--save-session={}", self.session_path.display()),
            format!("--dir={}", self.download_dir.display()),
        ]
    }
}

/// 引擎配置，每次启动前根据当前 `Config` 重新生成
#[derive(Debug, Clone)]
pub struct EngineConf {
    pub max_connection_per_server: usize,
    pub max_concurrent_downloads: usize,
    pub split: usize,
    pub min_split_size: String,
    pub rpc_secret: Option<String>,
    data_dir: PathBuf,
    download_dir: PathBuf,
}

impl EngineConf {
    pub fn from_config(config: &Config) -> Self {
        let secret = config.rpc_secret.trim();
        Self {
            max_connection_per_server: config.thread_count,
            max_concurrent_downloads: config.max_concurrent_downloads,
            split: config.split,
            min_split_size: config.min_split_size.clone(),
            rpc_secret: if secret.is_empty() { None } else { Some(secret.to_string()) },
            data_dir: config.data_dir(),
            download_dir: PathBuf::from(&config.download_dir),
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            "file-allocation=falloc".to_string(),
            "continue=true".to_string(),
            format!("max-concurrent-downloads={}", self.max_concurrent_downloads),
            format!("min-split-size={}", self.min_split_size),
            format!("split={}", self.split),
            "disable-ipv6=false".to_string(),
            "enable-http-pipelining=false".to_string(),
            format!("max-connection-per-server={}", self.max_connection_per_server),
            "enable-rpc=true".to_string(),
            "rpc-allow-origin-all=true".to_string(),
            "rpc-listen-all=true".to_string(),
            "event-poll=select".to_string(),
            format!("rpc-listen-port={}", RPC_LISTEN_PORT),
            "force-save=false".to_string(),
        ];
        if let Some(secret) = &self.rpc_secret {
            lines.push(format!("rpc-secret={}", secret));
        }
        let mut content = lines.join("\n");
        content.push('\n');
        content
    }

    /// 写入 aria2.conf（覆盖），会话文件不存在时创建（不截断已有内容）
    pub fn write(&self) -> EngineResult<EngineFiles> {
        fs::create_dir_all(&self.data_dir)?;
        let download_dir = absolute(&self.download_dir)?;
        fs::create_dir_all(&download_dir)?;

        let conf_path = self.data_dir.join(CONF_FILE_NAME);
        fs::write(&conf_path, self.render())?;

        let session_path = self.data_dir.join(SESSION_FILE_NAME);
        OpenOptions::new().create(true).append(true).open(&session_path)?;

        log::debug!("已写入引擎配置: {}", conf_path.display());
        Ok(EngineFiles { conf_path, session_path, download_dir })
    }
}

fn absolute(path: &Path) -> EngineResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}
