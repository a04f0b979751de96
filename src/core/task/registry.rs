//! gid -> 源地址 的登记表，判断任务是否仍在引擎中活动的唯一依据

use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// 已提交任务
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub uris: Vec<String>,
    pub submitted_at: DateTime<Local>,
}

#[derive(Default)]
struct RegistryInner {
    tasks: HashMap<String, TaskEntry>,
    /// 已移出登记表、尚未回收引擎侧资源的 gid
    pending_reclaim: HashSet<String>,
}

#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // 持锁期间不会 panic，中毒后的数据仍然一致
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 插入或覆盖
    pub fn insert(&self, gid: &str, uris: Vec<String>) {
        let mut inner = self.lock();
        inner.pending_reclaim.remove(gid);
        inner.tasks.insert(
            gid.to_string(),
            TaskEntry { uris, submitted_at: Local::now() },
        );
    }

    pub fn contains(&self, gid: &str) -> bool {
        self.lock().tasks.contains_key(gid)
    }

    pub fn get(&self, gid: &str) -> Option<TaskEntry> {
        self.lock().tasks.get(gid).cloned()
    }

    /// 只有第一次调用返回 true，被移出的 gid 进入待回收集合
    pub fn evict(&self, gid: &str) -> bool {
        let mut inner = self.lock();
        let evicted = inner.tasks.remove(gid).is_some();
        if evicted {
            inner.pending_reclaim.insert(gid.to_string());
        }
        evicted
    }

    /// 申请回收引擎侧资源的权利，同一次提交只有一个调用者能拿到
    pub fn claim_reclaim(&self, gid: &str) -> bool {
        self.lock().pending_reclaim.remove(gid)
    }

    /// 待回收的 gid 数量
    pub fn pending_reclaims(&self) -> usize {
        self.lock().pending_reclaim.len()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// 清空并返回被移除的 gid
    pub fn clear(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.pending_reclaim.clear();
        inner.tasks.drain().map(|(gid, _)| gid).collect()
    }
}
