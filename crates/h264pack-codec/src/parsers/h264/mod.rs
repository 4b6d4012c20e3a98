//! H.264/AVC Annex B 码流解析器.
//!
//! - NAL 单元分割与类型识别
//! - SPS (Sequence Parameter Set) 解析
//! - 按 NAL 类型统计帧数

pub mod nal;
pub mod sps;

pub use nal::{
    NalUnitIter, NalUnitRef, NalUnitType, classify_nal_type, count_frames, find_first_nal,
    find_start_code, iter_nal_units, remove_emulation_prevention,
};
pub use sps::{LogTrace, Sps, SpsParseOptions, SpsTrace, parse_sps, parse_sps_with};
