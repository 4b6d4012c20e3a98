//! 日志初始化模块.
//!
//! 双输出:
//! - console: stderr, 终端下彩色, 级别由 -q/-v 控制
//! - file: 无色, 无 target, 默认 info, 可通过 -v/-vv 或 H264PACK_LOG 环境变量调整
//!
//! 日志文件输出到 $cwd/logs/{prefix}.{date}.log, 日志目录不可写时只输出到 console.
//! 库内的 `log` 记录经 tracing-log 桥接到同一个 subscriber.

use chrono::{Datelike, Local, Timelike};
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 日志目录
const LOG_DIR: &str = "logs";

/// 覆盖文件日志级别的环境变量
const LOG_ENV: &str = "H264PACK_LOG";

/// 按 -v 次数映射日志级别: 0=info, 1=debug, 2+=trace
fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// 初始化日志系统
///
/// - `file_prefix`: 日志文件前缀 (如 "h264pack")
/// - `verbosity`: 0=info, 1=debug, 2+=trace (由 -v/-vv 控制)
/// - `quiet`: console 只输出 warn 及以上
pub fn init(file_prefix: &str, verbosity: u8, quiet: bool) {
    let console_level = if quiet { "warn" } else { level_for(verbosity) };
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(ConsoleFormatter {
            ansi: std::io::stderr().is_terminal(),
        })
        .with_filter(EnvFilter::new(console_level));

    // File: 默认 info, 通过 -v 提升, H264PACK_LOG 环境变量可覆盖
    let file_layer = match build_file_appender(file_prefix) {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARD.set(guard).ok();
            let file_filter = EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
            Some(
                fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(FileFormatter)
                    .with_filter(file_filter),
            )
        }
        Err(e) => {
            eprintln!("警告: 创建日志文件失败, 只输出到控制台: {e}");
            None
        }
    };

    if Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        eprintln!("警告: 日志系统已初始化");
    }
}

fn build_file_appender(
    file_prefix: &str,
) -> Result<tracing_appender::rolling::RollingFileAppender, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(LOG_DIR)?;
    let appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .build(LOG_DIR)?;
    Ok(appender)
}

/// Console 格式: 时间戳 + 级别 + 消息, 终端下级别带颜色
struct ConsoleFormatter {
    ansi: bool,
}

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        let (color, reset) = if self.ansi {
            let color = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                _ => "\x1b[34m",
            };
            (color, "\x1b[0m")
        } else {
            ("", "")
        };
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {}{:5}{} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            color,
            meta.level(),
            reset,
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 无 target, 时间戳 + 级别 + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            event.metadata().level(),
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
