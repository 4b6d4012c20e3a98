//! h264pack - H.264 码流打包命令行工具
//!
//! 在 Annex B 码流前写入 24 字节头部 (宽高, 帧数, 帧时长, 码流长度),
//! 或检查已打包文件的头部.

mod logging;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use h264pack_format::{
    InspectReport, PackConfig, PackOptions, PackReport, SpsErrorPolicy, StreamSummary,
    inspect_file, pack_file,
};

#[derive(Parser, Debug)]
#[command(name = "h264pack", version, about = "为 H.264 Annex B 码流添加头部")]
struct Cli {
    /// 输入文件路径
    #[arg(short, long)]
    input: PathBuf,

    /// 输出文件路径 (默认: <输入文件名>_header.<扩展名>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 帧率, 用于计算每帧时长 (毫秒)
    #[arg(short = 'r', long, default_value_t = 24.0)]
    fps: f64,

    /// 量化矩阵置位时完整跳过 scaling_list
    #[arg(long = "strict-scaling-lists")]
    strict_scaling_lists: bool,

    /// 解析 SPS 前移除 emulation prevention 字节
    #[arg(long = "extract-rbsp")]
    extract_rbsp: bool,

    /// SPS 解析失败时的处理方式
    #[arg(long = "on-sps-error", value_enum, default_value_t = OnSpsError::Abort)]
    on_sps_error: OnSpsError,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 检查已打包文件的头部, 不写出文件
    #[arg(long)]
    inspect: bool,

    /// 以 JSON 格式输出结果
    #[arg(long)]
    json: bool,

    /// 控制台只输出警告和错误
    #[arg(short, long)]
    quiet: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OnSpsError {
    /// 报错退出
    Abort,
    /// 宽高按 0 处理
    Fallback,
}

impl From<OnSpsError> for SpsErrorPolicy {
    fn from(value: OnSpsError) -> Self {
        match value {
            OnSpsError::Abort => SpsErrorPolicy::Abort,
            OnSpsError::Fallback => SpsErrorPolicy::Fallback,
        }
    }
}

impl Cli {
    fn pack_options(&self) -> PackOptions {
        PackOptions {
            fps: self.fps,
            strict_scaling_list_parsing: self.strict_scaling_lists,
            extract_rbsp: self.extract_rbsp,
            sps_error_policy: self.on_sps_error.into(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init("h264pack", cli.verbose, cli.quiet);

    let result = if cli.inspect {
        run_inspect(&cli)
    } else {
        run_pack(&cli)
    };

    if let Err(e) = result {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run_pack(cli: &Cli) -> Result<()> {
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    if !cli.overwrite && output.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", output.display());
    }

    let config = PackConfig {
        input_path: cli.input.clone(),
        output_path: output,
        overwrite: cli.overwrite,
        options: cli.pack_options(),
    };
    let report = pack_file(&config).with_context(|| {
        format!(
            "打包失败: '{}' -> '{}'",
            config.input_path.display(),
            config.output_path.display()
        )
    })?;

    if report.summary.scaling_matrix_skipped {
        warn!("SPS 含自定义量化矩阵, 宽高可能不准确, 可使用 --strict-scaling-lists");
    }
    info!(
        "已写入 {} ({} 字节)",
        report.output_path.display(),
        report.bytes_written
    );

    if cli.json {
        print_json(&report)?;
    } else if !cli.quiet {
        print_pack_text(&report);
    }
    Ok(())
}

fn run_inspect(cli: &Cli) -> Result<()> {
    let report = inspect_file(&cli.input, &cli.pack_options())
        .with_context(|| format!("检查失败: '{}'", cli.input.display()))?;
    if cli.json {
        print_json(&report)?;
    } else {
        print_inspect_text(&report);
    }
    Ok(())
}

/// `dir/name.h264` → `dir/name_header.h264`
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = match input.extension() {
        Some(ext) => format!("{stem}_header.{}", ext.to_string_lossy()),
        None => format!("{stem}_header"),
    };
    input.with_file_name(file_name)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON 序列化失败")?;
    println!("{json}");
    Ok(())
}

fn print_pack_text(report: &PackReport) {
    println!("输入: {}", report.input_path.display());
    println!("输出: {}", report.output_path.display());
    println!("  分辨率:     {}x{}", report.header.width, report.header.height);
    println!("  帧数:       {}", report.header.frame_count);
    println!("  帧时长:     {} ms", report.header.frame_time_ms);
    println!("  码流大小:   {} 字节", report.header.total_size);
    print_summary_notes(&report.summary);
}

fn print_inspect_text(report: &InspectReport) {
    println!("文件: {}", report.path.display());
    println!("头部:");
    println!("  分辨率:     {}x{}", report.header.width, report.header.height);
    println!("  帧数:       {}", report.header.frame_count);
    println!("  帧时长:     {} ms", report.header.frame_time_ms);
    println!("  码流大小:   {} 字节", report.header.total_size);
    println!("码流分析:");
    println!(
        "  分辨率:     {}x{}",
        report.summary.width, report.summary.height
    );
    println!("  帧数:       {}", report.summary.frame_count);
    print_summary_notes(&report.summary);
}

fn print_summary_notes(summary: &StreamSummary) {
    if let (Some(profile), Some(level)) = (summary.profile_idc, summary.level_idc) {
        println!("  profile/level: {}/{}", profile, level);
    }
    if summary.sps_offset.is_none() {
        println!("  (未找到 SPS)");
    }
    if let Some(err) = &summary.sps_error {
        println!("  SPS 错误 (已忽略): {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("clips/cast_demo_400_496.h264")),
            PathBuf::from("clips/cast_demo_400_496_header.h264")
        );
        assert_eq!(
            default_output_path(Path::new("stream")),
            PathBuf::from("stream_header")
        );
    }

    #[test]
    fn test_cli_pack_options() {
        let cli = Cli::parse_from([
            "h264pack",
            "-i",
            "in.h264",
            "-r",
            "30",
            "--strict-scaling-lists",
            "--on-sps-error",
            "fallback",
        ]);
        let options = cli.pack_options();
        assert_eq!(options.fps, 30.0);
        assert!(options.strict_scaling_list_parsing);
        assert!(!options.extract_rbsp);
        assert_eq!(options.sps_error_policy, SpsErrorPolicy::Fallback);
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["h264pack", "--input", "in.h264", "-vv"]);
        assert_eq!(cli.pack_options(), PackOptions::default());
        assert_eq!(cli.verbose, 2);
        assert!(!cli.overwrite);
    }
}
