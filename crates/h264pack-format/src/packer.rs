//! H.264 码流打包.
//!
//! 流程:
//! 1. `analyze_stream()` - 解析第一个 SPS 得到宽高, 并统计编码 slice 数
//! 2. `pack_stream()` - 生成头部记录, 后接原始码流
//! 3. `pack_file()` - 读取输入文件, 打包后写入输出文件

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use h264pack_codec::parsers::h264::{
    NalUnitType, SpsParseOptions, count_frames, find_first_nal, parse_sps,
    remove_emulation_prevention,
};
use h264pack_core::{PackError, PackResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::header::{DEFAULT_FPS, H264Header, HEADER_SIZE};

/// SPS 解析失败时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpsErrorPolicy {
    /// 返回错误, 不生成头部
    #[default]
    Abort,
    /// 记录警告, 宽高按 0 处理
    Fallback,
}

/// 打包选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackOptions {
    /// 帧率, 用于计算每帧时长
    pub fps: f64,
    /// 量化矩阵置位时是否完整跳过 scaling_list
    pub strict_scaling_list_parsing: bool,
    /// 解析 SPS 前是否移除 emulation prevention 字节
    pub extract_rbsp: bool,
    /// SPS 解析失败时的处理策略
    pub sps_error_policy: SpsErrorPolicy,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            strict_scaling_list_parsing: false,
            extract_rbsp: false,
            sps_error_policy: SpsErrorPolicy::Abort,
        }
    }
}

impl PackOptions {
    /// 对应的 SPS 解析选项
    pub fn sps_options(&self) -> SpsParseOptions {
        SpsParseOptions {
            strict_scaling_list_parsing: self.strict_scaling_list_parsing,
        }
    }
}

/// 文件打包配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    /// 输入 Annex B 码流路径
    pub input_path: PathBuf,
    /// 输出路径
    pub output_path: PathBuf,
    /// 输出文件已存在时是否覆盖
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    #[serde(default)]
    pub options: PackOptions,
}

fn default_overwrite() -> bool {
    true
}

impl PackConfig {
    /// 使用默认选项创建配置 (允许覆盖输出)
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            overwrite: true,
            options: PackOptions::default(),
        }
    }
}

/// 码流分析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// 图像宽度, 无 SPS 或 SPS 解析失败 (Fallback) 时为 0
    pub width: u32,
    /// 图像高度, 无 SPS 或 SPS 解析失败 (Fallback) 时为 0
    pub height: u32,
    /// 编码 slice NAL 单元数
    pub frame_count: usize,
    /// 第一个 SPS 的起始码偏移
    pub sps_offset: Option<usize>,
    pub profile_idc: Option<u8>,
    pub level_idc: Option<u8>,
    /// SPS 含量化矩阵但未读取 scaling_list
    pub scaling_matrix_skipped: bool,
    /// Fallback 策略下被忽略的 SPS 错误
    pub sps_error: Option<String>,
}

/// 打包结果: 头部记录 + 原始码流
#[derive(Debug, Clone)]
pub struct PackedStream {
    pub header: H264Header,
    pub summary: StreamSummary,
    /// 原始码流, 不做任何修改
    pub payload: Bytes,
}

impl PackedStream {
    /// 打包后总字节数
    pub fn packed_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// 写出头部和原始码流
    pub fn write_to<W: Write>(&self, writer: &mut W) -> PackResult<()> {
        writer.write_all(&self.header.to_bytes())?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    /// 合并为连续字节
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.packed_len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// 文件打包报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub header: H264Header,
    pub summary: StreamSummary,
    /// 输出文件字节数
    pub bytes_written: u64,
}

/// 已打包文件的检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub header: H264Header,
    /// 对头部之后的码流重新分析的结果
    pub summary: StreamSummary,
}

/// 分析 Annex B 码流
///
/// 宽高取自第一个 SPS; 没有 SPS 时为 (0, 0), 不视为错误.
/// 帧数独立扫描整个缓冲区得到.
pub fn analyze_stream(data: &[u8], options: &PackOptions) -> PackResult<StreamSummary> {
    let mut summary = StreamSummary {
        frame_count: count_frames(data),
        ..Default::default()
    };

    let Some(sps_nal) = find_first_nal(data, NalUnitType::Sps) else {
        debug!("H.264: 未找到 SPS, 宽高按 0 处理");
        return Ok(summary);
    };
    summary.sps_offset = Some(sps_nal.start_code_offset);

    let payload = sps_nal.payload(data);
    let rbsp: Cow<'_, [u8]> = if options.extract_rbsp {
        Cow::Owned(remove_emulation_prevention(payload))
    } else {
        Cow::Borrowed(payload)
    };

    match parse_sps(&rbsp, &options.sps_options()) {
        Ok(sps) => {
            summary.width = sps.width();
            summary.height = sps.height();
            summary.profile_idc = Some(sps.profile_idc);
            summary.level_idc = Some(sps.level_idc);
            summary.scaling_matrix_skipped = sps.scaling_matrix_skipped;
        }
        Err(err) => match options.sps_error_policy {
            SpsErrorPolicy::Abort => return Err(err),
            SpsErrorPolicy::Fallback => {
                warn!(
                    "H.264: SPS 解析失败, 宽高按 0 处理, offset={}, 错误: {}",
                    sps_nal.start_code_offset, err
                );
                summary.sps_error = Some(err.to_string());
            }
        },
    }

    debug!(
        "H.264: 码流分析完成, {}x{}, frame_count={}",
        summary.width, summary.height, summary.frame_count
    );
    Ok(summary)
}

/// 打包内存中的码流
pub fn pack_stream(data: impl Into<Bytes>, options: &PackOptions) -> PackResult<PackedStream> {
    let payload: Bytes = data.into();
    let total_size = u32::try_from(payload.len()).map_err(|_| {
        PackError::InvalidArgument(format!(
            "输入码流过大, 头部 total_size 为 u32: {} 字节",
            payload.len()
        ))
    })?;

    let summary = analyze_stream(&payload, options)?;
    let frame_count = u32::try_from(summary.frame_count).map_err(|_| {
        PackError::InvalidArgument(format!("帧数超出 u32 范围: {}", summary.frame_count))
    })?;

    let header = H264Header::new(
        summary.width,
        summary.height,
        frame_count,
        options.fps,
        total_size,
    )?;
    Ok(PackedStream {
        header,
        summary,
        payload,
    })
}

/// 读取输入文件, 打包后写入输出文件
///
/// 输入文件完整读入内存后再写出, 输入输出可以是同一路径.
pub fn pack_file(config: &PackConfig) -> PackResult<PackReport> {
    let data = fs::read(&config.input_path)?;
    debug!(
        "读取输入: {}, {} 字节",
        config.input_path.display(),
        data.len()
    );
    let packed = pack_stream(data, &config.options)?;

    let file = open_output(&config.output_path, config.overwrite)?;
    let mut writer = BufWriter::new(file);
    packed.write_to(&mut writer)?;
    writer.flush()?;

    let bytes_written = packed.packed_len() as u64;
    debug!(
        "写入输出: {}, {} 字节",
        config.output_path.display(),
        bytes_written
    );
    Ok(PackReport {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        header: packed.header,
        summary: packed.summary,
        bytes_written,
    })
}

/// 拆分已打包的数据为头部记录和码流
///
/// 头部之后的字节数必须与 total_size 一致.
pub fn unpack(data: &[u8]) -> PackResult<(H264Header, &[u8])> {
    let header = H264Header::parse(data)?;
    let payload = &data[HEADER_SIZE..];
    if payload.len() != header.total_size as usize {
        return Err(PackError::InvalidData(format!(
            "H264 头部 total_size={} 与实际码流长度 {} 不一致",
            header.total_size,
            payload.len()
        )));
    }
    Ok((header, payload))
}

/// 检查已打包文件: 读取头部并重新分析其中的码流
pub fn inspect_file(path: &Path, options: &PackOptions) -> PackResult<InspectReport> {
    let data = fs::read(path)?;
    let (header, payload) = unpack(&data)?;
    let summary = analyze_stream(payload, options)?;
    if summary.width != header.width || summary.height != header.height {
        warn!(
            "头部宽高 {}x{} 与码流分析结果 {}x{} 不一致",
            header.width, header.height, summary.width, summary.height
        );
    }
    Ok(InspectReport {
        path: path.to_path_buf(),
        header,
        summary,
    })
}

fn open_output(path: &Path, overwrite: bool) -> PackResult<File> {
    let mut opts = OpenOptions::new();
    opts.write(true);
    if overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    Ok(opts.open(path)?)
}
