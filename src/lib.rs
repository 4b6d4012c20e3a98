//! # h264pack
//!
//! 为 H.264 Annex B 码流添加 24 字节定长头部, 下游无需完整解码即可得到码流元数据.
//!
//! 头部字段: 魔数 `"H264"`, 宽, 高, 帧数, 每帧毫秒数, 原始码流字节数 (均为 u32 LE).
//!
//! # 快速开始
//!
//! ```rust
//! use h264pack::format::{PackOptions, pack_stream};
//!
//! // 只含一个 IDR slice, 没有 SPS 时宽高为 0
//! let data = vec![0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84];
//! let packed = pack_stream(data, &PackOptions::default()).unwrap();
//! assert_eq!(packed.header.frame_count, 1);
//! assert_eq!(packed.header.frame_time_ms, 42);
//! assert_eq!(packed.to_vec().len(), 24 + 7);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `h264pack-core` | 错误类型, 比特流读写, Exp-Golomb |
//! | `h264pack-codec` | 起始码扫描, NAL 类型, SPS 解析, 帧计数 |
//! | `h264pack-format` | 头部记录与打包流程 |

/// 错误类型与比特流工具
pub use h264pack_core as core;

/// H.264 码流解析
pub use h264pack_codec as codec;

/// 头部记录与打包流程
pub use h264pack_format as format;

/// 获取 h264pack 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
