//! # h264pack-format
//!
//! H264 头部记录与打包流程.
//!
//! 输出格式为 24 字节头部 ([`header::H264Header`]) 后接未修改的 Annex B 码流.

pub mod header;
pub mod packer;

// 重导出常用类型
pub use header::{H264Header, HEADER_SIZE, MAGIC};
pub use packer::{
    InspectReport, PackConfig, PackOptions, PackReport, PackedStream, SpsErrorPolicy,
    StreamSummary, analyze_stream, inspect_file, pack_file, pack_stream, unpack,
};
