//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 只解析到 frame cropping 为止, 足以推导图像宽高:
//! - Profile / Level
//! - High profile 扩展字段 (色度格式, 位深, 量化矩阵标志)
//! - 图像顺序计数 (POC) 相关字段
//! - 图像宽度和高度 (以宏块为单位, 需要 cropping 调整)
//!
//! 输入为去掉 NAL 头部字节后的 SPS 载荷. 字段必须严格按语法顺序读取,
//! 任何一个字段漏读都会使之后的所有字段错位.
//!
//! # 量化矩阵
//!
//! `seq_scaling_matrix_present_flag` 置位时, 语法要求读取 8 个 (4:4:4 为 12 个)
//! scaling_list. [`SpsParseOptions::strict_scaling_list_parsing`] 关闭时不读取这些位,
//! 结果中 [`Sps::scaling_matrix_skipped`] 为 true, 此时后续字段可能错位.

use h264pack_core::bitreader::BitReader;
use h264pack_core::{PackError, PackResult};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

/// 含 High profile 扩展字段的 profile_idc
const HIGH_PROFILE_IDCS: [u8; 4] = [100, 110, 122, 244];

/// scaling_list 的初始 last_scale/next_scale
const SCALING_LIST_START: i32 = 8;

/// SPS 解析选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpsParseOptions {
    /// 量化矩阵置位时是否完整跳过 scaling_list
    pub strict_scaling_list_parsing: bool,
}

/// SPS 解析过程的观测钩子
///
/// 每解码一个字段回调一次 `field`, 特殊情况回调 `event`.
/// 钩子不影响解析流程.
pub trait SpsTrace {
    /// 已解码字段
    fn field(&mut self, name: &'static str, value: i64);

    /// 解析过程中的特殊情况
    fn event(&mut self, _name: &'static str) {}
}

/// 将字段输出到 `log::trace!`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl SpsTrace for LogTrace {
    fn field(&mut self, name: &'static str, value: i64) {
        trace!("H.264 SPS: {} = {}", name, value);
    }

    fn event(&mut self, name: &'static str) {
        trace!("H.264 SPS: event {}", name);
    }
}

/// 按顺序收集字段 (事件以值 -1 记录)
impl SpsTrace for Vec<(&'static str, i64)> {
    fn field(&mut self, name: &'static str, value: i64) {
        self.push((name, value));
    }

    fn event(&mut self, name: &'static str) {
        self.push((name, -1));
    }
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (编码规格, 如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set 标志位 (含 reserved_zero_2bits)
    pub constraint_set_flags: u8,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4), 非 High profile 时为 1
    pub chroma_format_idc: u32,
    pub separate_colour_plane_flag: bool,
    pub bit_depth_luma_minus8: u32,
    pub bit_depth_chroma_minus8: u32,
    pub qpprime_y_zero_transform_bypass_flag: bool,
    pub seq_scaling_matrix_present_flag: bool,
    /// 量化矩阵置位但未读取 scaling_list (非严格模式)
    pub scaling_matrix_skipped: bool,
    pub log2_max_frame_num_minus4: u32,
    /// 图像顺序计数类型
    pub pic_order_cnt_type: u32,
    /// 仅 `pic_order_cnt_type == 0`
    pub log2_max_pic_order_cnt_lsb_minus4: u32,
    /// 以下 4 项仅 `pic_order_cnt_type == 1`
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub offset_for_ref_frame: Vec<i32>,
    /// 最大参考帧数
    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub frame_cropping_flag: bool,
    /// cropping 偏移
    pub crop_left: u32,
    /// cropping 偏移
    pub crop_right: u32,
    /// cropping 偏移
    pub crop_top: u32,
    /// cropping 偏移
    pub crop_bottom: u32,
    /// 图像宽度 (像素, 已应用 cropping, 最小为 0)
    width: u32,
    /// 图像高度 (像素, 已应用 cropping, 最小为 0)
    height: u32,
}

impl Sps {
    /// 图像宽度 (像素)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 图像高度 (像素)
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 图像尺寸 (宽, 高)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// 从 RBSP 数据解析 SPS, 字段输出到 `log::trace!`
pub fn parse_sps(rbsp: &[u8], options: &SpsParseOptions) -> PackResult<Sps> {
    parse_sps_with(rbsp, options, &mut LogTrace)
}

/// 从 RBSP 数据解析 SPS, 字段输出到指定的观测钩子
pub fn parse_sps_with(
    rbsp: &[u8],
    options: &SpsParseOptions,
    tracer: &mut dyn SpsTrace,
) -> PackResult<Sps> {
    let mut r = FieldReader {
        br: BitReader::new(rbsp),
        tracer,
    };

    let profile_idc = r.u(8, "profile_idc")? as u8;
    let constraint_set_flags = r.u(8, "constraint_set_flags")? as u8;
    let level_idc = r.u(8, "level_idc")? as u8;
    let sps_id = r.ue("seq_parameter_set_id")?;

    let mut chroma_format_idc = 1; // 默认 4:2:0
    let mut separate_colour_plane_flag = false;
    let mut bit_depth_luma_minus8 = 0;
    let mut bit_depth_chroma_minus8 = 0;
    let mut qpprime_y_zero_transform_bypass_flag = false;
    let mut seq_scaling_matrix_present_flag = false;
    let mut scaling_matrix_skipped = false;

    if HIGH_PROFILE_IDCS.contains(&profile_idc) {
        chroma_format_idc = r.ue("chroma_format_idc")?;
        if chroma_format_idc == 3 {
            separate_colour_plane_flag = r.flag("separate_colour_plane_flag")?;
        }
        bit_depth_luma_minus8 = r.ue("bit_depth_luma_minus8")?;
        bit_depth_chroma_minus8 = r.ue("bit_depth_chroma_minus8")?;
        qpprime_y_zero_transform_bypass_flag = r.flag("qpprime_y_zero_transform_bypass_flag")?;
        seq_scaling_matrix_present_flag = r.flag("seq_scaling_matrix_present_flag")?;

        if seq_scaling_matrix_present_flag {
            if options.strict_scaling_list_parsing {
                r.skip_seq_scaling_lists(chroma_format_idc)?;
            } else {
                warn!(
                    "H.264: SPS 含自定义量化矩阵, 未读取 scaling_list, 后续字段可能错位, sps_id={}",
                    sps_id
                );
                r.tracer.event("scaling_matrix_unparsed");
                scaling_matrix_skipped = true;
            }
        }
    }

    let log2_max_frame_num_minus4 = r.ue("log2_max_frame_num_minus4")?;
    let pic_order_cnt_type = r.ue("pic_order_cnt_type")?;

    let mut log2_max_pic_order_cnt_lsb_minus4 = 0;
    let mut delta_pic_order_always_zero_flag = false;
    let mut offset_for_non_ref_pic = 0;
    let mut offset_for_top_to_bottom_field = 0;
    let mut offset_for_ref_frame = Vec::new();
    match pic_order_cnt_type {
        0 => {
            log2_max_pic_order_cnt_lsb_minus4 = r.ue("log2_max_pic_order_cnt_lsb_minus4")?;
        }
        1 => {
            delta_pic_order_always_zero_flag = r.flag("delta_pic_order_always_zero_flag")?;
            offset_for_non_ref_pic = r.se("offset_for_non_ref_pic")?;
            offset_for_top_to_bottom_field = r.se("offset_for_top_to_bottom_field")?;
            let num_ref_frames_in_cycle = r.ue("num_ref_frames_in_pic_order_cnt_cycle")?;
            // 数量不可信, 由读取失败来终止, 不预分配
            for _ in 0..num_ref_frames_in_cycle {
                offset_for_ref_frame.push(r.se("offset_for_ref_frame")?);
            }
        }
        _ => {} // 其余类型无额外字段
    }

    let max_num_ref_frames = r.ue("max_num_ref_frames")?;
    let gaps_in_frame_num_value_allowed_flag = r.flag("gaps_in_frame_num_value_allowed_flag")?;

    // 图像尺寸 (宏块单位)
    let pic_width_in_mbs_minus1 = r.ue("pic_width_in_mbs_minus1")?;
    let pic_height_in_map_units_minus1 = r.ue("pic_height_in_map_units_minus1")?;

    let frame_mbs_only_flag = r.flag("frame_mbs_only_flag")?;
    let mut mb_adaptive_frame_field_flag = false;
    if !frame_mbs_only_flag {
        mb_adaptive_frame_field_flag = r.flag("mb_adaptive_frame_field_flag")?;
    }
    let direct_8x8_inference_flag = r.flag("direct_8x8_inference_flag")?;

    // Cropping
    let mut crop_left = 0;
    let mut crop_right = 0;
    let mut crop_top = 0;
    let mut crop_bottom = 0;
    let frame_cropping_flag = r.flag("frame_cropping_flag")?;
    if frame_cropping_flag {
        crop_left = r.ue("frame_crop_left_offset")?;
        crop_right = r.ue("frame_crop_right_offset")?;
        crop_top = r.ue("frame_crop_top_offset")?;
        crop_bottom = r.ue("frame_crop_bottom_offset")?;
    }

    let raw_width = (i64::from(pic_width_in_mbs_minus1) + 1) * 16;
    let raw_height =
        (2 - i64::from(frame_mbs_only_flag)) * (i64::from(pic_height_in_map_units_minus1) + 1) * 16;
    let width = clamp_dimension(
        raw_width - (i64::from(crop_left) + i64::from(crop_right)) * 2,
        "width",
    )?;
    let height = clamp_dimension(
        raw_height - (i64::from(crop_top) + i64::from(crop_bottom)) * 2,
        "height",
    )?;

    debug!(
        "H.264: SPS 解析完成, profile={}, level={}, sps_id={}, {}x{}",
        profile_idc, level_idc, sps_id, width, height
    );

    Ok(Sps {
        profile_idc,
        constraint_set_flags,
        level_idc,
        sps_id,
        chroma_format_idc,
        separate_colour_plane_flag,
        bit_depth_luma_minus8,
        bit_depth_chroma_minus8,
        qpprime_y_zero_transform_bypass_flag,
        seq_scaling_matrix_present_flag,
        scaling_matrix_skipped,
        log2_max_frame_num_minus4,
        pic_order_cnt_type,
        log2_max_pic_order_cnt_lsb_minus4,
        delta_pic_order_always_zero_flag,
        offset_for_non_ref_pic,
        offset_for_top_to_bottom_field,
        offset_for_ref_frame,
        max_num_ref_frames,
        gaps_in_frame_num_value_allowed_flag,
        pic_width_in_mbs_minus1,
        pic_height_in_map_units_minus1,
        frame_mbs_only_flag,
        mb_adaptive_frame_field_flag,
        direct_8x8_inference_flag,
        frame_cropping_flag,
        crop_left,
        crop_right,
        crop_top,
        crop_bottom,
        width,
        height,
    })
}

/// 跳过一个 scaling_list(size)
///
/// `next_scale` 变为 0 后列表其余项沿用 `last_scale`, 不再消耗比特.
pub fn skip_scaling_list(br: &mut BitReader, size: usize) -> PackResult<()> {
    let mut last_scale = SCALING_LIST_START;
    let mut next_scale = SCALING_LIST_START;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = br.read_se()?;
            let sum = i64::from(last_scale) + i64::from(delta_scale) + 256;
            next_scale = sum.rem_euclid(256) as i32;
        }
        if next_scale == 0 {
            break;
        }
        last_scale = next_scale;
    }
    Ok(())
}

// ============================================================
// 内部工具
// ============================================================

/// 带字段名的读取器: 截断错误携带字段名, 每个字段回调观测钩子
struct FieldReader<'a, 't> {
    br: BitReader<'a>,
    tracer: &'t mut dyn SpsTrace,
}

impl FieldReader<'_, '_> {
    fn u(&mut self, n: u32, name: &'static str) -> PackResult<u32> {
        let value = self.br.read_bits(n).map_err(|e| truncated(e, name))?;
        self.tracer.field(name, i64::from(value));
        Ok(value)
    }

    fn flag(&mut self, name: &'static str) -> PackResult<bool> {
        Ok(self.u(1, name)? == 1)
    }

    fn ue(&mut self, name: &'static str) -> PackResult<u32> {
        let value = self.br.read_ue().map_err(|e| truncated(e, name))?;
        self.tracer.field(name, i64::from(value));
        Ok(value)
    }

    fn se(&mut self, name: &'static str) -> PackResult<i32> {
        let value = self.br.read_se().map_err(|e| truncated(e, name))?;
        self.tracer.field(name, i64::from(value));
        Ok(value)
    }

    fn skip_seq_scaling_lists(&mut self, chroma_format_idc: u32) -> PackResult<()> {
        let list_count = if chroma_format_idc != 3 { 8 } else { 12 };
        for list_idx in 0..list_count {
            if !self.flag("seq_scaling_list_present_flag")? {
                continue;
            }
            let size = if list_idx < 6 { 16 } else { 64 };
            skip_scaling_list(&mut self.br, size).map_err(|e| truncated(e, "scaling_list"))?;
        }
        Ok(())
    }
}

fn truncated(err: PackError, field: &str) -> PackError {
    match err {
        PackError::Eof => {
            PackError::MalformedBitstream(format!("H.264: SPS 在读取 {} 时截断", field))
        }
        other => other,
    }
}

fn clamp_dimension(value: i64, name: &str) -> PackResult<u32> {
    u32::try_from(value.max(0)).map_err(|_| {
        PackError::InvalidData(format!("H.264: SPS {} 超出 u32 范围, value={}", name, value))
    })
}
