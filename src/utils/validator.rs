use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// 引擎支持的地址协议
const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "ftp", "sftp"];

pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => SUPPORTED_SCHEMES.contains(&parsed.scheme()) && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// aria2 的 gid 为 16 位十六进制
pub fn is_valid_gid(gid: &str) -> bool {
    static GID_PATTERN: OnceLock<Regex> = OnceLock::new();
    GID_PATTERN
        .get_or_init(|| Regex::new(r"^[0-9a-fA-F]{16}$").expect("gid 正则无效"))
        .is_match(gid)
}

pub fn validate_thread_count(threads: usize) -> Result<()> {
    if threads == 0 || threads > 16 {
        anyhow::bail!("线程数必须在 1 到 16 之间");
    }
    Ok(())
}

/// 轮询间隔（秒），允许小数
pub fn validate_interval(secs: f64) -> Result<()> {
    if !secs.is_finite() || secs <= 0.0 {
        anyhow::bail!("轮询间隔必须为正数");
    }
    Ok(())
}

pub fn validate_output_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        anyhow::bail!("输出路径不能为空");
    }
    Ok(())
}

pub fn validate_urls(urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        anyhow::bail!("URL列表不能为空");
    }
    if let Some(bad) = urls.iter().find(|url| !is_valid_url(url)) {
        anyhow::bail!("无效的URL: {}", bad);
    }
    Ok(())
}
