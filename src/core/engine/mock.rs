//! 测试用的引擎替身：按脚本返回状态并记录调用

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::EngineApi;
use crate::core::error::{EngineError, EngineResult};
use crate::core::task::status::RawStatus;

#[derive(Default)]
pub struct MockEngine {
    alive: AtomicBool,
    fail_status: AtomicBool,
    fail_force_remove: AtomicBool,
    gid_counter: AtomicUsize,
    next_gids: Mutex<VecDeque<String>>,
    statuses: Mutex<HashMap<String, VecDeque<RawStatus>>>,
    active: Mutex<Vec<String>>,
    waiting: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.alive.store(true, Ordering::SeqCst);
        mock
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_fail_status(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_force_remove(&self, fail: bool) {
        self.fail_force_remove.store(fail, Ordering::SeqCst);
    }

    /// 下一次 add_uris 返回的 gid
    pub fn push_gid(&self, gid: &str) {
        self.next_gids.lock().expect("gid 锁").push_back(gid.to_string());
    }

    /// 依次返回的状态，最后一个会一直重复
    pub fn script(&self, gid: &str, steps: &[(&str, u64, u64)]) {
        let queue = steps
            .iter()
            .map(|(status, total, completed)| raw_status(gid, status, *total, *completed))
            .collect();
        self.statuses.lock().expect("状态锁").insert(gid.to_string(), queue);
    }

    pub fn set_active(&self, gids: &[&str]) {
        *self.active.lock().expect("活动锁") = gids.iter().map(|g| g.to_string()).collect();
    }

    pub fn set_waiting(&self, gids: &[&str]) {
        *self.waiting.lock().expect("等待锁") = gids.iter().map(|g| g.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("调用锁").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn call(&self, name: String) {
        self.calls.lock().expect("调用锁").push(name);
    }

    fn ensure_alive(&self) -> EngineResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::transport("connection refused"))
        }
    }
}

pub fn raw_status(gid: &str, status: &str, total: u64, completed: u64) -> RawStatus {
    RawStatus {
        gid: gid.to_string(),
        status: status.to_string(),
        total_length: total.to_string(),
        completed_length: completed.to_string(),
        download_speed: if status == "active" { "1024".to_string() } else { "0".to_string() },
        ..Default::default()
    }
}

#[async_trait]
impl EngineApi for MockEngine {
    async fn get_version(&self) -> EngineResult<String> {
        self.call("get_version".to_string());
        self.ensure_alive()?;
        Ok("1.37.0".to_string())
    }

    async fn add_uris(&self, uris: &[String]) -> EngineResult<String> {
        self.ensure_alive()?;
        let gid = self.next_gids.lock().expect("gid 锁").pop_front().unwrap_or_else(|| {
            format!("{:016x}", self.gid_counter.fetch_add(1, Ordering::SeqCst) + 1)
        });
        self.call(format!("add_uris:{}:{}", gid, uris.len()));
        Ok(gid)
    }

    async fn tell_status(&self, gid: &str) -> EngineResult<RawStatus> {
        self.call(format!("tell_status:{}", gid));
        self.ensure_alive()?;
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(EngineError::transport("tellStatus 失败"));
        }
        let mut statuses = self.statuses.lock().expect("状态锁");
        let queue = statuses
            .get_mut(gid)
            .ok_or_else(|| EngineError::UnknownTask(gid.to_string()))?;
        let status = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        status.ok_or_else(|| EngineError::transport("空脚本"))
    }

    async fn tell_active(&self) -> EngineResult<Vec<String>> {
        self.call("tell_active".to_string());
        self.ensure_alive()?;
        Ok(self.active.lock().expect("活动锁").clone())
    }

    async fn tell_waiting(&self, offset: usize, num: usize) -> EngineResult<Vec<String>> {
        self.call("tell_waiting".to_string());
        self.ensure_alive()?;
        Ok(self.waiting.lock().expect("等待锁").iter().skip(offset).take(num).cloned().collect())
    }

    async fn pause(&self, gid: &str) -> EngineResult<()> {
        self.call(format!("pause:{}", gid));
        self.ensure_alive()
    }

    async fn remove(&self, gid: &str) -> EngineResult<()> {
        self.call(format!("remove:{}", gid));
        self.ensure_alive()
    }

    async fn force_remove(&self, gid: &str) -> EngineResult<()> {
        self.call(format!("force_remove:{}", gid));
        self.ensure_alive()?;
        if self.fail_force_remove.load(Ordering::SeqCst) {
            return Err(EngineError::Rpc { code: 1, message: format!("Active Download not found for GID#{}", gid) });
        }
        Ok(())
    }

    async fn remove_download_result(&self, gid: &str) -> EngineResult<()> {
        self.call(format!("remove_download_result:{}", gid));
        self.ensure_alive()
    }

    async fn purge_download_result(&self) -> EngineResult<()> {
        self.call("purge_download_result".to_string());
        self.ensure_alive()
    }

    async fn shutdown(&self) -> EngineResult<()> {
        self.call("shutdown".to_string());
        self.ensure_alive()?;
        self.set_alive(false);
        Ok(())
    }
}
