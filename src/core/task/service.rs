//! 下载引擎服务：任务提交、状态查询与资源回收

use std::sync::Arc;

use super::registry::TaskRegistry;
use super::state::TaskState;
use super::status::DownloadStatus;
use crate::config::Config;
use crate::core::engine::{EngineApi, EngineConnection, EngineProcessManager, RpcClient};
use crate::core::error::{EngineError, EngineResult};

/// 进程内唯一的引擎服务，由所有轮询器共享
pub struct EngineService {
    api: Arc<dyn EngineApi>,
    process: EngineProcessManager,
    registry: TaskRegistry,
}

impl EngineService {
    /// 使用 JSON-RPC 客户端连接本地引擎
    pub fn new(config: &Config) -> EngineResult<Self> {
        let api: Arc<dyn EngineApi> = Arc::new(RpcClient::new(EngineConnection::from_config(config))?);
        Ok(Self::with_api(config, api))
    }

    pub fn with_api(config: &Config, api: Arc<dyn EngineApi>) -> Self {
        Self {
            process: EngineProcessManager::new(Arc::clone(&api), config.clone()),
            api,
            registry: TaskRegistry::new(),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub async fn is_running(&self) -> bool {
        self.process.is_alive().await
    }

    pub async fn ensure_running(&self) -> EngineResult<()> {
        self.process.ensure_running().await
    }

    /// 提交一组镜像地址；同一 gid 仍在活动时拒绝
    pub async fn submit(&self, uris: Vec<String>) -> EngineResult<String> {
        if uris.is_empty() {
            return Err(EngineError::InvalidUri("未提供任何URL".to_string()));
        }

        self.process.ensure_running().await?;
        let gid = self.api.add_uris(&uris).await?;

        if self.registry.contains(&gid) {
            let raw = self.api.tell_status(&gid).await?;
            let still_active = TaskState::parse(&raw.status)
                .map(|state| !state.is_terminal())
                .unwrap_or(false);
            if still_active {
                log::warn!("任务 {} 仍在进行中，拒绝重复提交", gid);
                return Err(EngineError::DuplicateActiveTask(gid));
            }
        }

        log::info!("已提交任务 {}: {:?}", gid, uris);
        self.registry.insert(&gid, uris);
        Ok(gid)
    }

    /// 查询状态；任务完成时从登记表中移除
    pub async fn query_status(&self, gid: &str) -> EngineResult<DownloadStatus> {
        let status = DownloadStatus::from_raw(self.api.tell_status(gid).await?)?;
        if status.state == TaskState::Complete && self.registry.evict(gid) {
            log::info!("任务 {} 已完成", gid);
        }
        Ok(status)
    }

    /// 尽力暂停，失败只记录日志
    pub async fn pause(&self, gid: &str) -> bool {
        match self.api.pause(gid).await {
            Ok(()) => {
                log::info!("已暂停任务 {}", gid);
                true
            }
            Err(e) => {
                log::warn!("暂停任务 {} 失败: {}", gid, e);
                false
            }
        }
    }

    /// 轮询结束后的收尾，重复调用没有额外效果
    ///
    /// 取消时强制移除；正常结束时只回收已停止任务的结果记录。
    /// 同一次提交的引擎侧回收只会发生一次。
    pub async fn finalize(&self, gid: &str, cancelled: bool) -> EngineResult<()> {
        if cancelled {
            self.registry.evict(gid);
            if !self.registry.claim_reclaim(gid) {
                return Ok(());
            }
            if let Err(e) = self.api.force_remove(gid).await {
                log::warn!("强制移除任务 {} 失败: {}，尝试清除结果记录", gid, e);
                if let Err(e) = self.api.remove_download_result(gid).await {
                    log::warn!("清除任务 {} 结果记录失败: {}", gid, e);
                }
            } else {
                log::info!("已强制移除任务 {}", gid);
            }
            return Ok(());
        }

        let status = DownloadStatus::from_raw(self.api.tell_status(gid).await?)?;
        if !status.is_terminal() {
            log::debug!("任务 {} 仍处于 {} 状态，暂不回收", gid, status.state);
            return Ok(());
        }

        self.registry.evict(gid);
        if !self.registry.claim_reclaim(gid) {
            return Ok(());
        }
        match self.api.remove_download_result(gid).await {
            Ok(()) => log::info!("已回收任务 {} ({})", gid, status.state),
            Err(e) => log::warn!("回收任务 {} 失败: {}", gid, e),
        }
        log::debug!("剩余待回收任务 {} 个", self.registry.pending_reclaims());
        Ok(())
    }

    /// 移除引擎中的全部任务但不关闭引擎
    ///
    /// `force` 为 false 时走 `aria2.remove`，引擎会先完成收尾动作再移除。
    pub async fn remove_all(&self, force: bool) -> EngineResult<usize> {
        if !self.process.is_alive().await {
            log::info!("引擎未运行，没有可移除的任务");
            return Ok(0);
        }
        let removed = self.process.remove_all(force).await?;
        self.registry.clear();
        log::info!("已移除 {} 个任务 (强制: {})", removed, force);
        Ok(removed)
    }

    /// 移除全部任务、关闭引擎并清空登记表
    pub async fn shutdown_all(&self) -> EngineResult<()> {
        self.process.shutdown_all().await?;
        let cleared = self.registry.clear();
        if !cleared.is_empty() {
            log::info!("已清空 {} 个登记任务", cleared.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::mock::MockEngine;
    use tokio_test::{assert_err, assert_ok};

    const GID: &str = "2089b05ecca3d829";

    fn service(mock: &Arc<MockEngine>) -> Arc<EngineService> {
        let api: Arc<dyn EngineApi> = mock.clone();
        Arc::new(EngineService::with_api(&Config::default(), api))
    }

    fn uris() -> Vec<String> {
        vec!["https://example.com/a.zip".to_string(), "https://mirror.example.com/a.zip".to_string()]
    }

    #[tokio::test]
    async fn test_submit_registers_gid() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        let service = service(&mock);

        let gid = assert_ok!(service.submit(uris()).await);
        assert_eq!(gid, GID);
        assert_eq!(service.registry().get(GID).map(|e| e.uris.len()), Some(2));
        assert_eq!(mock.count("add_uris"), 1);
    }

    #[tokio::test]
    async fn test_submit_empty_rejected() {
        let mock = Arc::new(MockEngine::new());
        let service = service(&mock);
        let err = assert_err!(service.submit(vec![]).await);
        assert!(matches!(err, EngineError::InvalidUri(_)));
        assert_eq!(mock.count("add_uris"), 0);
    }

    #[tokio::test]
    async fn test_duplicate_active_submission_rejected() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.push_gid(GID);
        mock.script(GID, &[("active", 100, 10)]);
        let service = service(&mock);

        assert_ok!(service.submit(uris()).await);
        let err = assert_err!(service.submit(uris()).await);
        assert!(matches!(err, EngineError::DuplicateActiveTask(ref gid) if gid == GID));
        assert!(service.registry().contains(GID));
    }

    #[tokio::test]
    async fn test_resubmit_after_error_accepted() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.push_gid(GID);
        mock.script(GID, &[("error", 100, 10)]);
        let service = service(&mock);

        assert_ok!(service.submit(uris()).await);
        assert_ok!(service.submit(uris()).await);
        assert_eq!(service.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_query_status_evicts_on_complete() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.script(GID, &[("active", 100, 50), ("complete", 100, 100)]);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        let first = assert_ok!(service.query_status(GID).await);
        assert_eq!(first.state, TaskState::Active);
        assert!(service.registry().contains(GID));

        let second = assert_ok!(service.query_status(GID).await);
        assert_eq!(second.state, TaskState::Complete);
        assert_eq!(second.percent, 100);
        assert!(!service.registry().contains(GID));
    }

    #[tokio::test]
    async fn test_finalize_cancelled_force_removes_once() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        assert_ok!(service.finalize(GID, true).await);
        assert_ok!(service.finalize(GID, true).await);
        assert_eq!(mock.count("force_remove"), 1);
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_cancelled_falls_back_to_result_removal() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.set_fail_force_remove(true);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        assert_ok!(service.finalize(GID, true).await);
        assert_eq!(mock.count("force_remove"), 1);
        assert_eq!(mock.count("remove_download_result"), 1);
    }

    #[tokio::test]
    async fn test_finalize_concurrent_reclaims_once() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.script(GID, &[("complete", 100, 100)]);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.finalize(GID, false).await })
            })
            .collect();
        for handle in handles {
            assert_ok!(handle.await.expect("任务 panic"));
        }

        assert_eq!(mock.count("remove_download_result"), 1);
        assert_eq!(mock.count("force_remove"), 0);
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_after_completed_query_reclaims_once() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.script(GID, &[("complete", 100, 100)]);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        assert_ok!(service.query_status(GID).await);
        assert_eq!(service.registry().pending_reclaims(), 1);

        assert_ok!(service.finalize(GID, false).await);
        assert_ok!(service.finalize(GID, false).await);
        assert_eq!(mock.count("remove_download_result"), 1);
        assert_eq!(service.registry().pending_reclaims(), 0);
    }

    #[tokio::test]
    async fn test_remove_all_graceful_keeps_engine() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.set_active(&[GID]);
        mock.set_waiting(&["bbbbbbbbbbbbbbbb"]);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        assert_eq!(assert_ok!(service.remove_all(false).await), 2);
        assert_eq!(mock.count("remove:"), 2);
        assert_eq!(mock.count("force_remove"), 0);
        assert_eq!(mock.count("purge_download_result"), 1);
        assert_eq!(mock.count("shutdown"), 0);
        assert!(service.registry().is_empty());
        assert!(service.is_running().await);
    }

    #[tokio::test]
    async fn test_remove_all_when_offline_is_noop() {
        let mock = Arc::new(MockEngine::offline());
        let service = service(&mock);
        assert_eq!(assert_ok!(service.remove_all(true).await), 0);
        assert_eq!(mock.count("tell_active"), 0);
    }

    #[tokio::test]
    async fn test_finalize_skips_running_task() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.script(GID, &[("active", 100, 10)]);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        assert_ok!(service.finalize(GID, false).await);
        assert!(service.registry().contains(GID));
        assert_eq!(mock.count("remove_download_result"), 0);
    }

    #[tokio::test]
    async fn test_pause_is_best_effort() {
        let mock = Arc::new(MockEngine::new());
        let service = service(&mock);
        assert!(service.pause(GID).await);

        mock.set_alive(false);
        assert!(!service.pause(GID).await);
    }

    #[tokio::test]
    async fn test_shutdown_all_clears_registry() {
        let mock = Arc::new(MockEngine::new());
        mock.push_gid(GID);
        mock.set_active(&[GID]);
        let service = service(&mock);
        assert_ok!(service.submit(uris()).await);

        assert_ok!(service.shutdown_all().await);
        assert!(service.registry().is_empty());
        assert_eq!(mock.count("shutdown"), 1);
        assert!(!service.is_running().await);

        // 引擎已关闭，再次调用不产生任何 RPC 副作用
        assert_ok!(service.shutdown_all().await);
        assert_eq!(mock.count("shutdown"), 1);
    }
}
