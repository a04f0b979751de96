use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;

use crate::config::Config;
use crate::core::error::{EngineError, EngineResult};

/// 一次请求得到的响应体
pub struct SourceResponse {
    /// 响应声明的总长度
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, EngineResult<Bytes>>,
}

/// 字节来源，每次调用都发起一次全新的请求
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn open(&self, uri: &str) -> EngineResult<SourceResponse>;
}

/// 基于 reqwest 的流式 GET
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &Config) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn open(&self, uri: &str) -> EngineResult<SourceResponse> {
        let response = self.client.get(uri).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::ServerError(status.as_u16()));
        }

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(EngineError::from))
            .boxed();
        Ok(SourceResponse { content_length, body })
    }
}
