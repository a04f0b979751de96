//! aria2 JSON-RPC 客户端（HTTP POST /jsonrpc）

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::{EngineApi, EngineConnection};
use crate::core::error::{EngineError, EngineResult};
use crate::core::task::status::RawStatus;
use crate::utils::validator::is_valid_gid;

/// 控制类调用的超时
const RPC_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct GidOnly {
    gid: String,
}

pub struct RpcClient {
    connection: EngineConnection,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(connection: EngineConnection) -> EngineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self { connection, http })
    }

    /// 组装请求体，令牌存在时放在参数首位
    fn build_request(&self, method: &str, params: Vec<Value>) -> Value {
        let mut full_params = Vec::with_capacity(params.len() + 1);
        if let Some(token) = self.connection.token() {
            full_params.push(Value::String(token));
        }
        full_params.extend(params);

        json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": full_params,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> EngineResult<T> {
        let body = self.build_request(method, params);
        log::debug!("RPC 请求: {}", method);

        let response = self
            .http
            .post(self.connection.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::transport(format!("{} 请求失败: {}", method, e)))?;

        // aria2 对业务错误同样返回 JSON（HTTP 400），先按 JSON 解析
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::transport(format!("{} 读取响应失败: {}", method, e)))?;

        parse_response(method, &text).map_err(|e| match e {
            EngineError::RpcTransport(msg) if !status.is_success() => {
                EngineError::transport(format!("HTTP {}: {}", status.as_u16(), msg))
            }
            other => other,
        })
    }
}

fn parse_response<T: DeserializeOwned>(method: &str, text: &str) -> EngineResult<T> {
    let response: RpcResponse<T> = serde_json::from_str(text)
        .map_err(|e| EngineError::transport(format!("{} 响应解析失败: {}", method, e)))?;

    if let Some(err) = response.error {
        return Err(EngineError::Rpc { code: err.code, message: err.message });
    }
    response
        .result
        .ok_or_else(|| EngineError::transport(format!("{} 响应缺少 result", method)))
}

/// 引擎已不认识该 gid（结果已被清除或引擎重启过）
fn not_found_as_unknown(gid: &str, error: EngineError) -> EngineError {
    match error {
        EngineError::Rpc { ref message, .. } if message.contains("is not found") => {
            EngineError::UnknownTask(gid.to_string())
        }
        other => other,
    }
}

#[async_trait]
impl EngineApi for RpcClient {
    async fn get_version(&self) -> EngineResult<String> {
        #[derive(Deserialize)]
        struct Version {
            version: String,
        }
        let v: Version = self.call("aria2.getVersion", vec![]).await?;
        Ok(v.version)
    }

    async fn add_uris(&self, uris: &[String]) -> EngineResult<String> {
        let gid: String = self.call("aria2.addUri", vec![json!(uris)]).await?;
        if !is_valid_gid(&gid) {
            return Err(EngineError::transport(format!("引擎返回了无效的 gid: {}", gid)));
        }
        Ok(gid)
    }

    async fn tell_status(&self, gid: &str) -> EngineResult<RawStatus> {
        self.call("aria2.tellStatus", vec![json!(gid)])
            .await
            .map_err(|e| not_found_as_unknown(gid, e))
    }

    async fn tell_active(&self) -> EngineResult<Vec<String>> {
        let list: Vec<GidOnly> = self.call("aria2.tellActive", vec![json!(["gid"])]).await?;
        Ok(list.into_iter().map(|g| g.gid).collect())
    }

    async fn tell_waiting(&self, offset: usize, num: usize) -> EngineResult<Vec<String>> {
        let list: Vec<GidOnly> = self
            .call("aria2.tellWaiting", vec![json!(offset), json!(num), json!(["gid"])])
            .await?;
        Ok(list.into_iter().map(|g| g.gid).collect())
    }

    async fn pause(&self, gid: &str) -> EngineResult<()> {
        let _: String = self.call("aria2.pause", vec![json!(gid)]).await?;
        Ok(())
    }

    async fn remove(&self, gid: &str) -> EngineResult<()> {
        let _: String = self.call("aria2.remove", vec![json!(gid)]).await?;
        Ok(())
    }

    async fn force_remove(&self, gid: &str) -> EngineResult<()> {
        let _: String = self.call("aria2.forceRemove", vec![json!(gid)]).await?;
        Ok(())
    }

    async fn remove_download_result(&self, gid: &str) -> EngineResult<()> {
        let _: String = self.call("aria2.removeDownloadResult", vec![json!(gid)]).await?;
        Ok(())
    }

    async fn purge_download_result(&self) -> EngineResult<()> {
        let _: String = self.call("aria2.purgeDownloadResult", vec![]).await?;
        Ok(())
    }

    async fn shutdown(&self) -> EngineResult<()> {
        let _: String = self.call("aria2.shutdown", vec![]).await?;
        Ok(())
    }
}
