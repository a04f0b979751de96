use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::core::error::{EngineError, EngineResult};
use crate::core::task::state::PollInterval;
use crate::utils::validator;

/// 引擎 RPC 固定监听端口
pub const RPC_LISTEN_PORT: u16 = 6800;

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// aria2c 可执行文件路径，留空则按平台推断
    pub engine_binary: String,
    /// 引擎数据目录（aria2.conf 与 aria2.session 所在位置）
    pub data_dir: String,
    /// 默认下载目录
    pub download_dir: String,
    /// RPC 主机
    pub rpc_host: String,
    /// RPC 密钥，留空表示不启用
    pub rpc_secret: String,
    /// 每个服务器的最大连接数（max-connection-per-server）
    pub thread_count: usize,
    /// 引擎最大并发下载数
    pub max_concurrent_downloads: usize,
    /// 单文件分片数
    pub split: usize,
    /// 最小分片大小
    pub min_split_size: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 引擎启动等待时间（毫秒）
    pub startup_timeout_ms: u64,
    /// 重试次数
    pub retry_count: usize,
    /// 重试延迟（毫秒）
    pub retry_delay_ms: u64,
    /// 最大重试延迟（毫秒）
    pub retry_max_delay_ms: u64,
    /// 网络超时时间（秒）
    pub timeout: u64,
    /// 分块大小（字节）
    pub chunk_size: usize,
    /// User-Agent
    pub user_agent: String,
    /// 日志文件
    pub log_file: String,
    /// 日志级别
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_binary: String::new(),
            data_dir: "./aria2".to_string(),
            download_dir: "./downloads".to_string(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_secret: String::new(),
            thread_count: 8,
            max_concurrent_downloads: 5,
            split: 64,
            min_split_size: "5M".to_string(),
            poll_interval_ms: 1000,
            startup_timeout_ms: 5000,
            retry_count: 3,
            retry_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            timeout: 10,
            chunk_size: 4096,
            user_agent: "aria2ctl/0.1".to_string(),
            log_file: "logs/aria2ctl.log".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 加载配置文件，不存在或格式错误时写入默认配置
    pub fn load(path: &str) -> EngineResult<Self> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            match toml::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    log::warn!("配置文件格式错误: {}，将使用默认配置", e);
                    let config = Config::default();
                    config.save_with_tutorial(path)?;
                    Ok(config)
                }
            }
        } else {
            let config = Config::default();
            config.save_with_tutorial(path)?;
            Ok(config)
        }
    }

    /// 保存带教程的配置文件（唯一写入方法）
    pub fn save_with_tutorial(&self, path: &str) -> EngineResult<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidConfig(format!("无法序列化配置: {}", e)))?;
        let full_content = format!("{}\n\n{}", Config::generate_tutorial_content(), config_content);
        fs::write(path, full_content)?;
        Ok(())
    }

    fn generate_tutorial_content() -> String {
        r#"# aria2ctl 配置文件
# ====================
#
# TOML 格式。命令行参数会覆盖这里的设置，优先级：命令行 > 配置文件 > 默认值
#
# 使用示例：
#   aria2ctl get https://example.com/file.zip              # 交给 aria2 下载
#   aria2ctl -t 16 get https://example.com/file.zip        # 每服务器 16 个连接
#   aria2ctl fetch https://example.com/aria2.zip -o a.zip  # 不经过 aria2 的分块下载
#   aria2ctl shutdown                                      # 关闭引擎
#
# ==================== 引擎设置 ====================
#
# engine_binary      aria2c 路径，留空按平台推断（Windows: <data_dir>/aria2c.exe，
#                    macOS: /usr/local/bin/aria2c，其他: PATH 中的 aria2c）
# data_dir           aria2.conf 与 aria2.session 存放目录
# thread_count       每个服务器的最大连接数，1-16
# rpc_secret         RPC 密钥，留空表示不启用；RPC 端口固定为 6800
#
# ==================== 轮询与重试 ====================
#
# poll_interval_ms   状态轮询间隔，最小 100
# retry_count        分块下载的尝试次数
# timeout            分块下载的连接/读取超时（秒）
#
# ==================== 故障排除 ====================
#
# 问题：提示下载引擎不可用
# 解决：安装 aria2，或将 engine_binary 指向 aria2c
#
# 问题：经常下载失败
# 解决：增加 retry_count 或 timeout 值"#
            .to_string()
    }

    /// 验证配置
    pub fn validate(&self) -> EngineResult<()> {
        validator::validate_thread_count(self.thread_count)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        if self.max_concurrent_downloads == 0 {
            return Err(EngineError::InvalidConfig("最大并发下载数必须大于0".to_string()));
        }
        if self.split == 0 {
            return Err(EngineError::InvalidConfig("分片数必须大于0".to_string()));
        }
        if self.poll_interval_ms < PollInterval::MIN.as_millis() as u64 {
            return Err(EngineError::InvalidConfig("轮询间隔不能小于 100 毫秒".to_string()));
        }
        if self.retry_count == 0 {
            return Err(EngineError::InvalidConfig("重试次数必须大于0".to_string()));
        }
        if self.timeout == 0 {
            return Err(EngineError::InvalidConfig("超时时间必须大于0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(EngineError::InvalidConfig("分块大小必须大于0".to_string()));
        }
        if self.rpc_host.trim().is_empty() {
            return Err(EngineError::InvalidConfig("RPC 主机不能为空".to_string()));
        }
        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(dir) = &args.download_dir {
            if !dir.is_empty() {
                self.download_dir = dir.clone();
            }
        }
        if let Some(thread_count) = args.thread_count {
            self.thread_count = thread_count;
        }
        if let Some(interval) = args.interval {
            self.poll_interval_ms = PollInterval::from_secs_f64(interval).as_duration().as_millis() as u64;
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn poll_interval(&self) -> PollInterval {
        PollInterval::new(Duration::from_millis(self.poll_interval_ms))
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 引擎程序: {}\n\
            - 数据目录: {}\n\
            - 下载目录: {}\n\
            - RPC: {}:{}\n\
            - 每服务器连接数: {}\n\
            - 并发数: {}\n\
            - 轮询间隔: {} 毫秒\n\
            - 重试次数: {}",
            if self.engine_binary.is_empty() { "自动" } else { self.engine_binary.as_str() },
            self.data_dir,
            self.download_dir,
            self.rpc_host,
            RPC_LISTEN_PORT,
            self.thread_count,
            self.max_concurrent_downloads,
            self.poll_interval_ms,
            self.retry_count,
        )
    }
}
