//! aria2c 进程的启动、就绪检测与关闭

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::{EngineApi, EngineConf, EngineFiles};
use crate::config::Config;
use crate::core::error::{EngineError, EngineResult};

/// 就绪检测的轮询间隔
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// tellWaiting 单次拉取数量
const WAITING_PAGE_SIZE: usize = 1000;

pub struct EngineProcessManager {
    api: Arc<dyn EngineApi>,
    config: Config,
    child: Mutex<Option<Child>>,
}

impl EngineProcessManager {
    pub fn new(api: Arc<dyn EngineApi>, config: Config) -> Self {
        Self { api, config, child: Mutex::new(None) }
    }

    /// 版本调用成功即视为在线
    pub async fn is_alive(&self) -> bool {
        match self.api.get_version().await {
            Ok(version) => {
                log::debug!("引擎在线，版本 {}", version);
                true
            }
            Err(e) => {
                log::debug!("引擎未响应: {}", e);
                false
            }
        }
    }

    /// 引擎不在线时写入配置、启动进程并等待就绪
    pub async fn ensure_running(&self) -> EngineResult<()> {
        if self.is_alive().await {
            return Ok(());
        }

        log::info!("引擎未运行，准备启动");
        let files = EngineConf::from_config(&self.config).write()?;
        let program = resolve_engine_binary(&self.config)?;
        self.launch(&program, &files)?;
        self.wait_until_ready().await
    }

    fn launch(&self, program: &Path, files: &EngineFiles) -> EngineResult<()> {
        log::info!("启动引擎: {} {:?}", program.display(), files.launch_args());
        let mut command = Command::new(program);
        command
            .args(files.launch_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);

        let child = command
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    EngineError::unavailable(format!("无法执行 {}: {}", program.display(), e))
                }
                _ => EngineError::Io(e),
            })?;

        log::debug!("引擎进程 pid={}", child.id());
        *self.lock_child() = Some(child);
        Ok(())
    }

    async fn wait_until_ready(&self) -> EngineResult<()> {
        let timeout = Duration::from_millis(self.config.startup_timeout_ms);
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_alive().await {
                log::info!("引擎已就绪");
                return Ok(());
            }
            if let Some(status) = self.exited_child() {
                return Err(EngineError::unavailable(format!("引擎进程已退出: {}", status)));
            }
            if Instant::now() >= deadline {
                return Err(EngineError::unavailable(format!(
                    "等待 {} 毫秒后引擎仍未响应",
                    timeout.as_millis()
                )));
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    fn lock_child(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 已启动的子进程若已退出，返回其退出状态
    fn exited_child(&self) -> Option<std::process::ExitStatus> {
        let mut guard = self.lock_child();
        let status = guard.as_mut().and_then(|child| child.try_wait().ok().flatten());
        if status.is_some() {
            *guard = None;
        }
        status
    }

    /// 移除引擎中的所有任务并清除结果记录
    pub async fn remove_all(&self, force: bool) -> EngineResult<usize> {
        let mut gids = self.api.tell_active().await?;
        gids.extend(self.api.tell_waiting(0, WAITING_PAGE_SIZE).await?);

        for gid in &gids {
            let result = if force {
                self.api.force_remove(gid).await
            } else {
                self.api.remove(gid).await
            };
            if let Err(e) = result {
                log::warn!("移除任务 {} 失败: {}", gid, e);
            }
        }
        self.api.purge_download_result().await?;
        Ok(gids.len())
    }

    /// 强制移除全部任务后关闭引擎，引擎不在线时什么也不做
    pub async fn shutdown_all(&self) -> EngineResult<bool> {
        if !self.is_alive().await {
            log::info!("引擎未运行，无需关闭");
            return Ok(false);
        }

        let removed = self.remove_all(true).await?;
        log::info!("已移除 {} 个任务，正在关闭引擎", removed);
        self.api.shutdown().await?;
        self.reap_child().await;
        Ok(true)
    }

    /// 回收本进程启动的子进程，避免残留僵尸进程
    async fn reap_child(&self) {
        let deadline = Instant::now() + Duration::from_millis(self.config.startup_timeout_ms);
        loop {
            let running = self.lock_child().is_some();
            if !running {
                return;
            }
            if self.exited_child().is_some() {
                log::debug!("引擎进程已退出");
                return;
            }
            if Instant::now() >= deadline {
                log::warn!("引擎进程在关闭后仍未退出");
                return;
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }
}

/// 引擎放在独立的进程组中，终端的 Ctrl-C 不会传给它
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// 按配置或平台约定定位 aria2c
pub fn resolve_engine_binary(config: &Config) -> EngineResult<PathBuf> {
    let configured = config.engine_binary.trim();
    if !configured.is_empty() {
        let path = PathBuf::from(configured);
        if path.components().count() > 1 || path.is_absolute() {
            if path.is_file() {
                return Ok(path);
            }
            return Err(EngineError::unavailable(format!("找不到引擎程序: {}", path.display())));
        }
        return find_in_path(configured)
            .ok_or_else(|| EngineError::unavailable(format!("PATH 中找不到 {}", configured)));
    }

    platform_default_binary(config)
}

#[cfg(target_os = "windows")]
fn platform_default_binary(config: &Config) -> EngineResult<PathBuf> {
    let path = config.data_dir().join("aria2c.exe");
    if path.is_file() {
        Ok(path)
    } else {
        Err(EngineError::unavailable(format!("找不到引擎程序: {}", path.display())))
    }
}

#[cfg(target_os = "macos")]
fn platform_default_binary(_config: &Config) -> EngineResult<PathBuf> {
    let path = PathBuf::from("/usr/local/bin/aria2c");
    if path.is_file() {
        return Ok(path);
    }
    find_in_path("aria2c")
        .ok_or_else(|| EngineError::unavailable("找不到 aria2c，请先通过 Homebrew 安装"))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_default_binary(_config: &Config) -> EngineResult<PathBuf> {
    find_in_path("aria2c").ok_or_else(|| EngineError::unavailable("PATH 中找不到 aria2c，请先安装"))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(target_os = "windows") {
            let exe = dir.join(format!("{}.exe", name));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
