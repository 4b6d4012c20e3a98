//! # h264pack-core
//!
//! h264pack 核心库, 提供错误类型与比特流读写工具.
//!
//! - [`bitreader::BitReader`]: MSB first 位读取, 含 Exp-Golomb `ue(v)`/`se(v)` 解码
//! - [`bitwriter::BitWriter`]: 对应的位写入器, 含 Exp-Golomb 编码

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{PackError, PackResult};
