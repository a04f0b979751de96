use chrono::Local; // 用于获取本地时间
use log::LevelFilter; // 用于设置日志级别
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// 解析配置中的日志级别，无法识别时使用 info
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// 超过上限时把当前日志改名为 `<path>.backup`，返回是否发生了轮转
pub fn rotate_if_needed(file_path: &str, max_size: u64) -> io::Result<bool> {
    let path = Path::new(file_path);
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_size {
        return Ok(false);
    }

    let backup_path = format!("{}.backup", file_path);
    if Path::new(&backup_path).exists() {
        fs::remove_file(&backup_path)?;
    }
    fs::rename(path, &backup_path)?;
    Ok(true)
}

/// 初始化全局日志，输出到文件，格式 `时间 [级别] - 消息`
///
/// `RUST_LOG` 存在时覆盖配置中的级别。
pub fn init_logger(file_path: &str, level: LevelFilter, max_size: u64) -> io::Result<()> {
    // 确保日志目录存在
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    rotate_if_needed(file_path, max_size)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)));

    builder
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
