use thiserror::Error;
use std::io;

/// 控制器与分块下载器共用的错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("下载引擎不可用: {0}")]
    EngineUnavailable(String),

    #[error("任务仍在进行中，拒绝重复提交: {0}")]
    DuplicateActiveTask(String),

    #[error("网络错误: {0}")]
    NetworkTransient(#[source] reqwest::Error),

    #[error("读取超时")]
    Timeout,

    #[error("响应不完整: 预期 {expected} 字节, 实际 {actual} 字节")]
    Incomplete {
        expected: u64,
        actual: u64,
    },

    #[error("服务器错误: HTTP {0}")]
    ServerError(u16),

    #[error("RPC 调用失败 ({code}): {message}")]
    Rpc {
        code: i64,
        message: String,
    },

    #[error("RPC 响应无效: {0}")]
    RpcTransport(String),

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("无效的URL: {0}")]
    InvalidUri(String),

    #[error("未知任务: {0}")]
    UnknownTask(String),

    #[error("无效的轮询间隔: {0}")]
    InvalidInterval(String),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("任务被取消")]
    Cancelled,
}

impl EngineError {
    /// 分块下载器据此决定是否再尝试一次
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::NetworkTransient(e) => match e.status() {
                Some(status) => status.is_server_error(),
                // 重定向、解码等错误再试也不会成功
                None => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            },
            EngineError::Timeout | EngineError::Incomplete { .. } => true,
            EngineError::ServerError(code) => (500..600).contains(code),
            _ => false,
        }
    }

    /// 结构性错误：立即上报，不重试，也不触发重启
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::EngineUnavailable(_)
                | EngineError::DuplicateActiveTask(_)
                | EngineError::InvalidConfig(_)
                | EngineError::InvalidUri(_)
        )
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        EngineError::EngineUnavailable(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        EngineError::RpcTransport(msg.into())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        // 地址无法构成请求
        if e.is_builder() {
            return EngineError::InvalidUri(e.to_string());
        }
        EngineError::NetworkTransient(e)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(EngineError::Timeout.is_retryable());
        assert!(EngineError::ServerError(503).is_retryable());
        assert!(EngineError::Incomplete { expected: 10, actual: 4 }.is_retryable());
        assert!(!EngineError::ServerError(404).is_retryable());
        assert!(!EngineError::Io(io::Error::new(io::ErrorKind::Other, "disk")).is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_url_not_retryable() {
        let err: EngineError = reqwest::Client::new()
            .get("not-a-url")
            .send()
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::InvalidUri(_)));
        assert!(!err.is_retryable());
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        // 端口 1 上没有服务
        let client = reqwest::Client::builder().no_proxy().build().expect("创建客户端失败");
        let err: EngineError = client
            .get("http://127.0.0.1:1/file.bin")
            .send()
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::NetworkTransient(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(EngineError::unavailable("aria2c").is_fatal());
        assert!(EngineError::DuplicateActiveTask("2089b05ecca3d829".to_string()).is_fatal());
        assert!(!EngineError::Timeout.is_fatal());
        assert!(!EngineError::Rpc { code: 1, message: "x".to_string() }.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::Rpc { code: 1, message: "GID not found".to_string() };
        assert_eq!(err.to_string(), "RPC 调用失败 (1): GID not found");
        assert_eq!(EngineError::ServerError(502).to_string(), "服务器错误: HTTP 502");
    }
}
