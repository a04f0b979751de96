use aria2ctl::cli::{self, Command};
use aria2ctl::config::Config;
use aria2ctl::core::chunked::{ChunkedDownloadJob, ChunkedDownloader};
use aria2ctl::core::error::EngineError;
use aria2ctl::core::task::{EngineService, TaskWatcher, WatchEvent};
use aria2ctl::ui::{self, DownloadSummary, ProgressManager};
use aria2ctl::utils::logger::{init_logger, parse_level};
use crossterm::{
    cursor, execute, terminal,
    event::{self, Event, KeyCode},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TryRecvError;

const KEYBOARD_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);
const LOG_MAX_SIZE: u64 = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 解析参数和配置
    let (args, config) = match cli::Args::parse_args() {
        Ok((args, config)) => (args, config),
        Err(e) => {
            eprintln!("参数解析失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logger(&config.log_file, parse_level(&config.log_level), LOG_MAX_SIZE) {
        eprintln!("日志初始化失败: {}", e);
    }
    log::info!("程序启动 (版本 {}, 提交 {}, 构建于 {})", env!("CARGO_PKG_VERSION"), cli::BUILD_SHA, cli::BUILD_TIMESTAMP);
    log::info!("配置文件路径: {}", args.config);
    log::info!("{}", config.get_summary());

    let result = match &args.command {
        Some(Command::Get { .. }) => match args.collect_uris() {
            Ok(uris) => run_get(&config, uris).await,
            Err(e) => Err(e.into()),
        },
        Some(Command::Fetch { retries, .. }) => match args.fetch_target(&config) {
            Ok((uri, destination)) => {
                run_fetch(&config, &uri, destination, retries.unwrap_or(config.retry_count)).await
            }
            Err(e) => Err(e.into()),
        },
        Some(Command::Clear { force }) => run_clear(&config, *force).await,
        Some(Command::Shutdown) => run_shutdown(&config).await,
        None => {
            println!("{}", config.get_summary());
            println!("\n请指定子命令，使用 --help 查看用法");
            Ok(())
        }
    };

    if let Err(e) = &result {
        log::error!("执行失败: {:#}", e);
        ui::print_error(&format!("{:#}", e));
        if let Some(EngineError::EngineUnavailable(_)) = e.downcast_ref::<EngineError>() {
            println!("请安装 aria2，或在配置文件中通过 engine_binary 指定 aria2c 的位置");
        }
    }
    result
}

/// 恢复终端状态
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(std::io::stdout(), cursor::Hide)?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(std::io::stdout(), cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

/// 交给引擎下载并轮询进度
async fn run_get(config: &Config, uris: Vec<String>) -> anyhow::Result<()> {
    let started = Instant::now();
    let service = Arc::new(EngineService::new(config)?);

    let (mut watcher, mut events) = TaskWatcher::create(Arc::clone(&service), uris, config.poll_interval()).await?;
    ui::print_success(&format!("已提交任务: {}", watcher.gid()));
    watcher.start();

    println!("\n开始下载... (按 'c' 取消, 'q' 退出)");
    let progress = ProgressManager::new();
    let bar = progress.add_task_bar(watcher.gid()).await;
    progress.apply_status(bar, &watcher.status()).await;

    let mut stopping = false;
    let failed = {
        let _raw = RawModeGuard::enable()?;
        loop {
            // 处理键盘输入
            if !stopping {
                if let Ok(true) = event::poll(KEYBOARD_POLL_INTERVAL) {
                    if let Ok(Event::Key(key_event)) = event::read() {
                        if matches!(key_event.code, KeyCode::Char('c') | KeyCode::Char('q')) {
                            log::info!("用户取消任务 {}", watcher.gid());
                            watcher.stop().await;
                            stopping = true;
                        }
                    }
                }
            } else {
                tokio::time::sleep(KEYBOARD_POLL_INTERVAL).await;
            }

            // 处理轮询事件
            match events.try_recv() {
                Ok(WatchEvent::Status(status)) => progress.apply_status(bar, &status).await,
                Ok(WatchEvent::Finished { failed, .. }) => break failed,
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break true,
            }
        }
    };

    progress.finish(bar, failed).await;
    let outcome = watcher.join().await?;
    let status = watcher.status();

    println!(
        "{}",
        DownloadSummary {
            id: outcome.gid.clone(),
            files: watcher.files(),
            total_size: status.total_length,
            elapsed_time: started.elapsed(),
            failed,
            attempts: 1,
        }
    );

    if let Some(error) = outcome.error {
        anyhow::bail!("任务 {} 轮询出错: {}", outcome.gid, error);
    }
    if failed && !outcome.cancelled {
        let reason = status.error_message.unwrap_or_else(|| status.state.to_string());
        anyhow::bail!("任务 {} 下载失败: {}", outcome.gid, reason);
    }
    Ok(())
}

/// 不经过引擎的分块下载
async fn run_fetch(config: &Config, uri: &str, destination: PathBuf, retries: usize) -> anyhow::Result<()> {
    let started = Instant::now();
    let downloader = Arc::new(ChunkedDownloader::new(config)?);
    let job = ChunkedDownloadJob::new(uri, &destination, retries);
    println!("开始下载: {} -> {}", uri, destination.display());

    let progress = ProgressManager::new();
    let bar = progress.add_byte_bar(&destination.display().to_string()).await;
    let (handle, mut events) = downloader.spawn(job);
    while let Some(event) = events.recv().await {
        progress.apply_chunk_event(bar, &event).await;
    }

    let outcome = handle.await?;
    println!(
        "{}",
        DownloadSummary {
            id: outcome.job.uri.clone(),
            files: vec![outcome.job.destination.clone()],
            total_size: outcome.job.downloaded,
            elapsed_time: started.elapsed(),
            failed: outcome.failed,
            attempts: outcome.stats.attempts,
        }
    );

    if outcome.failed {
        let reason = outcome.job.last_error.unwrap_or_else(|| "未知错误".to_string());
        anyhow::bail!("下载失败: {}", reason);
    }
    Ok(())
}

async fn run_clear(config: &Config, force: bool) -> anyhow::Result<()> {
    let service = EngineService::new(config)?;
    let removed = service.remove_all(force).await?;
    ui::print_success(&format!("已移除 {} 个任务", removed));
    Ok(())
}

async fn run_shutdown(config: &Config) -> anyhow::Result<()> {
    let service = EngineService::new(config)?;
    if !service.is_running().await {
        println!("引擎未运行");
        return Ok(());
    }
    service.shutdown_all().await?;
    ui::print_success("已移除全部任务并关闭引擎");
    Ok(())
}
