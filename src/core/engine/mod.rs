//! 下载引擎（aria2c）相关：RPC 接口、配置文件生成与进程管理

pub mod conf;
pub mod process;
pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::config::{Config, RPC_LISTEN_PORT};
use crate::core::error::EngineResult;
use crate::core::task::status::RawStatus;

pub use conf::{EngineConf, EngineFiles};
pub use process::EngineProcessManager;
pub use rpc::RpcClient;

/// 引擎 RPC 调用接口，控制器只通过这里与 aria2 交互
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// 引擎是否在线以此为准
    async fn get_version(&self) -> EngineResult<String>;

    /// 提交一组镜像地址，返回 gid
    async fn add_uris(&self, uris: &[String]) -> EngineResult<String>;

    async fn tell_status(&self, gid: &str) -> EngineResult<RawStatus>;

    /// 活动任务的 gid
    async fn tell_active(&self) -> EngineResult<Vec<String>>;

    /// 等待队列中的 gid
    async fn tell_waiting(&self, offset: usize, num: usize) -> EngineResult<Vec<String>>;

    async fn pause(&self, gid: &str) -> EngineResult<()>;

    async fn remove(&self, gid: &str) -> EngineResult<()>;

    async fn force_remove(&self, gid: &str) -> EngineResult<()>;

    /// 清除已停止任务的结果记录
    async fn remove_download_result(&self, gid: &str) -> EngineResult<()>;

    async fn purge_download_result(&self) -> EngineResult<()>;

    async fn shutdown(&self) -> EngineResult<()>;
}

/// RPC 连接参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConnection {
    pub host: String,
    pub port: u16,
    pub secret: Option<String>,
}

impl EngineConnection {
    pub fn from_config(config: &Config) -> Self {
        let secret = config.rpc_secret.trim();
        Self {
            host: config.rpc_host.clone(),
            port: RPC_LISTEN_PORT,
            secret: if secret.is_empty() { None } else { Some(secret.to_string()) },
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/jsonrpc", self.host, self.port)
    }

    /// 需要放在参数首位的令牌
    pub fn token(&self) -> Option<String> {
        self.secret.as_ref().map(|s| format!("token:{}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_from_config() {
        let mut config = Config::default();
        let conn = EngineConnection::from_config(&config);
        assert_eq!(conn.endpoint(), "http://127.0.0.1:6800/jsonrpc");
        assert_eq!(conn.token(), None);

        config.rpc_secret = "s3cret".to_string();
        let conn = EngineConnection::from_config(&config);
        assert_eq!(conn.token().as_deref(), Some("token:s3cret"));
    }
}
