//! # h264pack-codec
//!
//! H.264 Annex B 码流分析库: 起始码扫描, NAL 类型识别, SPS 解析与帧计数.
//!
//! ## 使用示例
//!
//! ```rust
//! use h264pack_codec::parsers::h264::{count_frames, find_start_code};
//!
//! let data = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x00, 0x00, 0x01, 0x41, 0x9A];
//! assert_eq!(find_start_code(&data, 0), 1);
//! assert_eq!(count_frames(&data), 2);
//! ```

pub mod parsers;

// 重导出常用类型
pub use parsers::h264::{NalUnitRef, NalUnitType, Sps, SpsParseOptions};
