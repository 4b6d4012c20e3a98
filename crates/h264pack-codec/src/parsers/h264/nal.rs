//! H.264 NAL (Network Abstraction Layer) 单元扫描.
//!
//! # Annex B 格式
//!
//! Annex B 使用起始码 (start code) 分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────┘
//! ```
//!
//! # 扫描约定
//!
//! [`find_start_code`] 先在剩余数据中整体搜索 3 字节起始码, 找不到时才搜索
//! 4 字节起始码. 4 字节起始码内部总包含一个 3 字节起始码, 因此对
//! 偏移 q 处的 `00 00 00 01`, 扫描结果为 q+1.
//!
//! NAL 类型固定取 `data[offset + 3]`, 载荷固定从 `offset + 4` 开始.
//! 在上述扫描结果下, `offset + 3` 恰好是 NAL 头部字节.

use log::debug;

/// 3 字节起始码
pub const START_CODE_3: [u8; 3] = [0x00, 0x00, 0x01];

/// 4 字节起始码
pub const START_CODE_4: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL 类型字节相对起始码偏移的距离 (按 4 字节前缀约定)
const NAL_HEADER_DISTANCE: usize = 3;

/// NAL 载荷相对起始码偏移的距离 (跳过 NAL 头部字节)
const NAL_PAYLOAD_DISTANCE: usize = 4;

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// 未知类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为计入帧数的编码切片 (类型 1 或 5)
    pub fn is_coded_slice(&self) -> bool {
        matches!(self, Self::Slice | Self::SliceIdr)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 扫描得到的 NAL 单元引用
///
/// 只记录偏移, 不复制数据. 每次扫描重新计算.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnitRef {
    /// 起始码偏移 ([`find_start_code`] 的返回值)
    pub start_code_offset: usize,
    /// 载荷起始偏移 (NAL 头部字节之后)
    pub payload_offset: usize,
    /// NAL 单元类型
    pub nal_type: NalUnitType,
}

impl NalUnitRef {
    /// NAL 头部字节的偏移
    pub fn header_offset(&self) -> usize {
        self.start_code_offset + NAL_HEADER_DISTANCE
    }

    /// 截取载荷: 从 `payload_offset` 到下一个起始码 (或数据末尾)
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let begin = self.payload_offset.min(data.len());
        let end = find_start_code(data, begin);
        &data[begin..end]
    }
}

/// 查找下一个起始码
///
/// 返回 `from` 之后第一个 `00 00 01` 的偏移; 不存在时返回第一个
/// `00 00 00 01` 的偏移; 两者都不存在时返回 `data.len()`.
pub fn find_start_code(data: &[u8], from: usize) -> usize {
    if from >= data.len() {
        return data.len();
    }
    let tail = &data[from..];
    if let Some(pos) = find_pattern(tail, &START_CODE_3) {
        return from + pos;
    }
    match find_pattern(tail, &START_CODE_4) {
        Some(pos) => from + pos,
        None => data.len(),
    }
}

/// 读取起始码之后的 NAL 类型
///
/// 按 4 字节前缀约定取 `data[offset + 3] & 0x1F`. 越界时返回 `None`.
pub fn classify_nal_type(data: &[u8], offset: usize) -> Option<NalUnitType> {
    let header = *data.get(offset.checked_add(NAL_HEADER_DISTANCE)?)?;
    Some(NalUnitType::from_type_id(header & 0x1F))
}

/// 逐个枚举 NAL 单元
pub fn iter_nal_units(data: &[u8]) -> NalUnitIter<'_> {
    NalUnitIter { data, pos: 0 }
}

/// NAL 单元迭代器
///
/// 每找到一个起始码后从 `offset + 4` 继续搜索.
/// 数据末尾的起始码若没有后续的类型字节, 则扫描结束.
pub struct NalUnitIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Iterator for NalUnitIter<'_> {
    type Item = NalUnitRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = find_start_code(self.data, self.pos);
        let Some(nal_type) = classify_nal_type(self.data, start) else {
            self.pos = self.data.len();
            return None;
        };
        self.pos = start + NAL_PAYLOAD_DISTANCE;
        Some(NalUnitRef {
            start_code_offset: start,
            payload_offset: start + NAL_PAYLOAD_DISTANCE,
            nal_type,
        })
    }
}

/// 查找第一个指定类型的 NAL 单元
pub fn find_first_nal(data: &[u8], nal_type: NalUnitType) -> Option<NalUnitRef> {
    iter_nal_units(data).find(|nal| nal.nal_type == nal_type)
}

/// 统计编码切片 (类型 1 和 5) 的个数
///
/// 扫描整个缓冲区, 不提前终止.
pub fn count_frames(data: &[u8]) -> usize {
    let mut nal_count = 0usize;
    let mut frame_count = 0usize;
    for nal in iter_nal_units(data) {
        nal_count += 1;
        if nal.nal_type.is_coded_slice() {
            frame_count += 1;
        }
    }
    debug!(
        "H.264: NAL 扫描完成, nal_count={}, frame_count={}",
        nal_count, frame_count
    );
    frame_count
}

/// 移除 emulation prevention 字节 (0x00 0x00 0x03 → 0x00 0x00)
///
/// H.264 规范要求在 RBSP 中, 如果出现连续两个 0x00,
/// 后面必须插入 0x03 以防止与起始码混淆.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let is_emulation_prevention =
            i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03;
        if is_emulation_prevention {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3; // 跳过 0x03
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    rbsp
}

fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
