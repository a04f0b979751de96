//! CLI: 命令行接口和参数解析模块
//!
//! ## 主要功能
//!
//! - 命令行参数解析和验证
//! - 配置文件路径管理
//! - URL 列表处理（命令行参数和文件）
//! - 配置文件编辑器集成
//!
//! ## 支持的命令
//!
//! - 引擎下载：`aria2ctl get <url> [<mirror>...]`
//! - 批量地址：`aria2ctl get -f urls.txt`
//! - 直接下载：`aria2ctl fetch <url> -o out.bin`
//! - 清空任务：`aria2ctl clear [--force]`
//! - 关闭引擎：`aria2ctl shutdown`
//! - 编辑配置：`aria2ctl -e`
//!
//! ## 平台支持
//!
//! - Windows: `%APPDATA%/aria2ctl/aria2ctl.toml`
//! - macOS: `~/Library/Application Support/aria2ctl/aria2ctl.toml`
//! - Linux: `~/.config/aria2ctl/aria2ctl.toml`

use clap::{Parser, Subcommand};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::core::error::{EngineError, EngineResult};
use crate::utils::validator;

/// 构建时写入的 git 提交
pub const BUILD_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// 构建时间
pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/aria2ctl/aria2ctl.toml", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/aria2ctl/aria2ctl.toml", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/aria2ctl/aria2ctl.toml", home)
    }
}

/// 打开配置文件编辑器
pub fn open_config_in_editor(config_path: &str) {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("notepad").arg(config_path).status().ok();
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg("-e").arg(config_path).status().ok();
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // 优先 xdg-open，否则 nano
        if std::process::Command::new("xdg-open").arg(config_path).status().is_err() {
            let _ = std::process::Command::new("nano").arg(config_path).status();
        }
    }
}

/// aria2ctl 命令行参数
///
/// 示例用法：
///   aria2ctl get https://example.com/file.zip https://mirror.example.com/file.zip
///   aria2ctl -i 0.5 get https://example.com/file.zip
///   aria2ctl fetch https://example.com/installer.exe -o installer.exe
///   aria2ctl clear --force
///   aria2ctl shutdown
///
/// 更多用法请加 --help 查看
#[derive(Parser, Debug, Clone)]
#[command(
    name = "aria2ctl",
    author = "panzhifu",
    version = env!("CARGO_PKG_VERSION"),
    about = "一个用 Rust 编写的 aria2 下载引擎控制器",
    long_about = "自动启动本地 aria2 引擎、提交下载并实时显示进度；引擎不可用时可直接分块下载单个文件。\n\n示例：\n  aria2ctl get https://example.com/file.zip\n  aria2ctl -e\n  aria2ctl -c /path/to/aria2ctl.toml get https://example.com/file.zip\n  aria2ctl fetch https://example.com/installer.exe -o installer.exe\n"
)]
pub struct Args {
    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, global = true, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    /// 编辑配置文件（-e 或 --edit）
    #[arg(short = 'e', long = "edit", help = "用系统默认编辑器打开配置文件并退出。")]
    pub edit_config: bool,

    /// 每个服务器的连接数
    #[arg(long, short = 't', global = true, help = "每个服务器的连接数（1-16），覆盖配置文件中的设置。")]
    pub thread_count: Option<usize>,

    /// 指定下载目录
    #[arg(long, short = 'd', global = true, help = "指定下载目录，覆盖配置文件中的设置。")]
    pub download_dir: Option<String>,

    /// 轮询间隔（秒）
    #[arg(long, short = 'i', global = true, help = "状态轮询间隔（秒），可以是小数，最小 0.1。")]
    pub interval: Option<f64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// 通过引擎下载，多个地址视为同一文件的镜像
    Get {
        /// 要下载的URL列表
        uris: Vec<String>,

        /// 包含URL列表的文件路径
        #[arg(short, long, help = "包含URL列表的文件路径，每行一个URL。")]
        file: Option<String>,
    },
    /// 不经过引擎，直接分块下载单个文件
    Fetch {
        uri: String,

        /// 保存路径，默认为下载目录下的同名文件
        #[arg(short, long)]
        output: Option<String>,

        /// 总尝试次数
        #[arg(short, long)]
        retries: Option<usize>,
    },
    /// 移除引擎中的全部任务，引擎继续运行
    Clear {
        /// 立即强制移除，不等待引擎的收尾动作
        #[arg(long)]
        force: bool,
    },
    /// 移除引擎中的全部任务并关闭引擎
    Shutdown,
}

impl Args {
    pub fn parse_args() -> EngineResult<(Self, Config)> {
        let args = Args::parse();

        // --edit 逻辑
        if args.edit_config {
            if !Path::new(&args.config).exists() {
                Config::default().save_with_tutorial(&args.config)?;
            }
            open_config_in_editor(&args.config);
            std::process::exit(0);
        }

        let config = args.load_config()?;
        Ok((args, config))
    }

    /// 加载或创建配置文件，合并命令行参数后验证
    pub fn load_config(&self) -> EngineResult<Config> {
        if let Some(interval) = self.interval {
            validator::validate_interval(interval)
                .map_err(|e| EngineError::InvalidInterval(e.to_string()))?;
        }

        // 不存在时写入带教程的默认配置
        let mut config = Config::load(&self.config)?;

        // 合并命令行参数到配置
        config.merge_from_args(self);

        config.validate()?;
        Ok(config)
    }

    /// `get` 子命令的地址：命令行参数在前，文件中的在后
    pub fn collect_uris(&self) -> EngineResult<Vec<String>> {
        let Some(Command::Get { uris: given, file }) = &self.command else {
            return Ok(Vec::new());
        };
        let mut uris = given.clone();

        if let Some(file_path) = file {
            let content = fs::read_to_string(file_path)?;
            // 按行读取URL，忽略空行和注释
            for line in content.lines() {
                let line = line.trim();
                if !line.is_empty() && !line.starts_with('#') {
                    uris.push(line.to_string());
                }
            }
        }

        validator::validate_urls(&uris).map_err(|e| EngineError::InvalidUri(e.to_string()))?;
        Ok(uris)
    }

    /// `fetch` 子命令的地址与保存路径，未指定 -o 时保存到下载目录
    pub fn fetch_target(&self, config: &Config) -> EngineResult<(String, PathBuf)> {
        let Some(Command::Fetch { uri, output, .. }) = &self.command else {
            return Err(EngineError::InvalidUri("未提供任何URL".to_string()));
        };
        if !validator::is_valid_url(uri) {
            return Err(EngineError::InvalidUri(uri.clone()));
        }

        let destination = match output {
            Some(path) => {
                validator::validate_output_path(path)
                    .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
                PathBuf::from(path)
            }
            None => Path::new(&config.download_dir).join(extract_filename_from_url(uri)),
        };
        Ok((uri.clone(), destination))
    }
}

/// 从URL中提取文件名
pub fn extract_filename_from_url(uri: &str) -> String {
    let name = url::Url::parse(uri).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|name| !name.is_empty())
    });

    // 如果无法从URL提取，使用默认名称
    name.unwrap_or_else(|| format!("download_{}", chrono::Utc::now().timestamp()))
}

// 测试模块
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_with_mirrors() {
        let args = Args::try_parse_from([
            "aria2ctl",
            "get",
            "https://example.com/file.zip",
            "https://mirror.example.com/file.zip",
        ])
        .expect("解析失败");
        assert_eq!(args.collect_uris().expect("应有地址").len(), 2);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "aria2ctl", "get", "https://example.com/a.zip", "-t", "4", "-i", "0.5", "-d", "/tmp/dl",
        ])
        .expect("解析失败");
        assert_eq!(args.thread_count, Some(4));
        assert_eq!(args.interval, Some(0.5));
        assert_eq!(args.download_dir.as_deref(), Some("/tmp/dl"));
    }

    #[test]
    fn test_fetch_arguments() {
        let args = Args::try_parse_from([
            "aria2ctl", "fetch", "https://example.com/setup.exe", "-o", "setup.exe", "-r", "5",
        ])
        .expect("解析失败");
        assert_eq!(
            args.command,
            Some(Command::Fetch {
                uri: "https://example.com/setup.exe".to_string(),
                output: Some("setup.exe".to_string()),
                retries: Some(5),
            })
        );
    }

    #[test]
    fn test_clear_force_flag() {
        let args = Args::try_parse_from(["aria2ctl", "clear"]).expect("解析失败");
        assert_eq!(args.command, Some(Command::Clear { force: false }));
        let args = Args::try_parse_from(["aria2ctl", "clear", "--force"]).expect("解析失败");
        assert_eq!(args.command, Some(Command::Clear { force: true }));
    }

    #[test]
    fn test_config_created_and_merged() {
        let dir = tempdir().expect("创建临时目录失败");
        let config_path = dir.path().join("conf").join("aria2ctl.toml").display().to_string();
        let args = Args::try_parse_from([
            "aria2ctl", "-c", config_path.as_str(), "-t", "12", "-i", "0.05", "shutdown",
        ])
        .expect("解析失败");

        let config = args.load_config().expect("加载配置失败");
        assert!(Path::new(&config_path).exists());
        assert_eq!(config.thread_count, 12);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_invalid_thread_count_rejected() {
        let dir = tempdir().expect("创建临时目录失败");
        let config_path = dir.path().join("aria2ctl.toml").display().to_string();
        let args = Args::try_parse_from(["aria2ctl", "-c", config_path.as_str(), "-t", "32", "shutdown"])
            .expect("解析失败");
        assert!(matches!(args.load_config(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let args = Args::try_parse_from(["aria2ctl", "--interval=-1", "shutdown"]).expect("解析失败");
        assert!(matches!(args.load_config(), Err(EngineError::InvalidInterval(_))));
    }

    #[test]
    fn test_url_file_parsing() {
        let dir = tempdir().expect("创建临时目录失败");
        let url_file = dir.path().join("urls.txt");
        let content = "# 这是一个注释\nhttps://example.com/file1.zip\n\nhttps://example.com/file2.zip\n";
        fs::write(&url_file, content).expect("写入失败");

        let args = Args::try_parse_from(["aria2ctl", "get", "-f", url_file.to_str().expect("路径")])
            .expect("解析失败");
        let urls = args.collect_uris().expect("读取失败");
        assert_eq!(urls, vec![
            "https://example.com/file1.zip".to_string(),
            "https://example.com/file2.zip".to_string(),
        ]);
    }

    #[test]
    fn test_fetch_target_validation() {
        let config = Config { download_dir: "/tmp/dl".to_string(), ..Config::default() };

        let args = Args::try_parse_from(["aria2ctl", "fetch", "https://example.com/pkg/setup.exe"])
            .expect("解析失败");
        let (uri, destination) = args.fetch_target(&config).expect("应通过验证");
        assert_eq!(uri, "https://example.com/pkg/setup.exe");
        assert_eq!(destination, Path::new("/tmp/dl").join("setup.exe"));

        let bad = Args::try_parse_from(["aria2ctl", "fetch", "not-a-url"]).expect("解析失败");
        assert!(matches!(bad.fetch_target(&config), Err(EngineError::InvalidUri(_))));

        let blank = Args::try_parse_from(["aria2ctl", "fetch", "https://example.com/a", "-o", " "])
            .expect("解析失败");
        assert!(matches!(blank.fetch_target(&config), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_extract_filename_from_url() {
        assert_eq!(extract_filename_from_url("https://example.com/a/b/file.zip"), "file.zip");
        assert!(extract_filename_from_url("https://example.com/").starts_with("download_"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let args = Args::try_parse_from(["aria2ctl", "get", "not-a-url"]).expect("解析失败");
        assert!(matches!(args.collect_uris(), Err(EngineError::InvalidUri(_))));

        let empty = Args::try_parse_from(["aria2ctl", "get"]).expect("解析失败");
        assert!(empty.collect_uris().is_err());
    }
}
