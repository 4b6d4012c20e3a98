//! H264 头部记录.
//!
//! 24 字节定长, 紧接原始 Annex B 码流之前:
//!
//! | 偏移 | 字段 | 类型 |
//! |---|---|---|
//! | 0 | magic | 4 字节 ASCII `"H264"` |
//! | 4 | width | u32 LE |
//! | 8 | height | u32 LE |
//! | 12 | frame_count | u32 LE |
//! | 16 | frame_time_ms | u32 LE |
//! | 20 | total_size | u32 LE (不含头部) |

use bytes::{Buf, BufMut};
use h264pack_core::{PackError, PackResult};
use serde::{Deserialize, Serialize};

/// 头部魔数
pub const MAGIC: [u8; 4] = *b"H264";

/// 头部长度 (字节)
pub const HEADER_SIZE: usize = 24;

/// 默认帧率
pub const DEFAULT_FPS: f64 = 24.0;

/// H264 头部记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct H264Header {
    /// 图像宽度 (像素), 无 SPS 时为 0
    pub width: u32,
    /// 图像高度 (像素), 无 SPS 时为 0
    pub height: u32,
    /// 编码 slice NAL 单元数 (类型 1 和 5)
    pub frame_count: u32,
    /// 每帧时长 (毫秒)
    pub frame_time_ms: u32,
    /// 原始码流字节数 (不含头部)
    pub total_size: u32,
}

impl H264Header {
    /// 创建头部记录, 帧时长由帧率换算
    pub fn new(
        width: u32,
        height: u32,
        frame_count: u32,
        fps: f64,
        total_size: u32,
    ) -> PackResult<Self> {
        Ok(Self {
            width,
            height,
            frame_count,
            frame_time_ms: frame_time_ms(fps)?,
            total_size,
        })
    }

    /// 序列化为 24 字节
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        self.write_to(&mut &mut out[..]);
        out
    }

    /// 写入到缓冲区
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&MAGIC);
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_u32_le(self.frame_count);
        buf.put_u32_le(self.frame_time_ms);
        buf.put_u32_le(self.total_size);
    }

    /// 从字节数据读取头部记录
    ///
    /// 只检查长度和魔数, 多余的字节被忽略.
    pub fn parse(bytes: &[u8]) -> PackResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(PackError::InvalidData(format!(
                "H264 头部长度不足: 需要 {} 字节, 实际 {} 字节",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let mut buf = &bytes[..HEADER_SIZE];
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(PackError::InvalidData(format!(
                "H264 头部魔数错误: {:02X?}",
                magic
            )));
        }
        Ok(Self {
            width: buf.get_u32_le(),
            height: buf.get_u32_le(),
            frame_count: buf.get_u32_le(),
            frame_time_ms: buf.get_u32_le(),
            total_size: buf.get_u32_le(),
        })
    }
}

/// 帧率换算为每帧毫秒数, 四舍六入五取偶
pub fn frame_time_ms(fps: f64) -> PackResult<u32> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(PackError::InvalidArgument(format!(
            "帧率必须为正数, fps={}",
            fps
        )));
    }
    let ms = (1000.0 / fps).round_ties_even();
    if !ms.is_finite() || ms > f64::from(u32::MAX) {
        return Err(PackError::InvalidArgument(format!(
            "帧率过小, 帧时长超出 u32 范围: fps={}",
            fps
        )));
    }
    Ok(ms as u32)
}
