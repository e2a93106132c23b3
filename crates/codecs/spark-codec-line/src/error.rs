//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 行编解码器在运行期没有任何失败路径：分帧对任意字节合法，字符集修复以替换代替报错；
//! - 唯一需要显式报告的是**构造期**的配置错误（空分隔符、未知字符集、分隔符与码元不对齐），它们代表不可恢复的误配置，
//!   必须在创建编解码器时立即失败（fail-fast），而不是拖到每次 `decode` 时才暴露。
//!
//! ## 设计要求（What）
//! - 错误类型派生 `thiserror::Error`，兼容 `std::error::Error` 生态；
//! - 每个变体对应 [`codes`] 中的稳定错误码，便于日志与告警按码聚合。

use thiserror::Error;

use crate::charset::Charset;

/// 行编解码器使用的稳定错误码集合。
///
/// 码值采用 `codec.line.<域>.<原因>` 的点分格式，与工作区其它错误码保持同一命名约定。
pub mod codes {
    /// 分隔符为空字节序列。
    pub const CONFIG_EMPTY_DELIMITER: &str = "codec.line.config.empty_delimiter";
    /// 字符集名称无法识别。
    pub const CONFIG_UNKNOWN_CHARSET: &str = "codec.line.config.unknown_charset";
    /// 分隔符长度不是源字符集码元宽度的整数倍。
    pub const CONFIG_MISALIGNED_DELIMITER: &str = "codec.line.config.misaligned_delimiter";
}

/// 构造期配置错误。
///
/// # 教案式说明
/// - **意图 (Why)**：集中描述所有“配置即错误”的情形，调用方在启动阶段即可得到明确诊断；
/// - **契约 (What)**：仅由 [`Delimiter::new`](crate::Delimiter::new)、
///   [`Charset`] 的 `FromStr` 以及各 `from_config` 构造函数返回；
///   运行期 API（`feed`/`flush`/`convert`/`encode`）永不返回该错误；
/// - **设计权衡 (Trade-offs)**：未知字符集保存原始名称的 `String` 副本，牺牲一次分配换取可读的错误消息。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    /// 分隔符为空，无法作为分帧标记。
    #[error("line delimiter must not be empty")]
    EmptyDelimiter,

    /// 字符集名称不在受支持的封闭集合内。
    #[error("unknown charset `{name}`")]
    UnknownCharset {
        /// 调用方提供的原始名称。
        name: String,
    },

    /// 分隔符长度与源字符集的码元宽度不对齐（例如 UTF-16 配合单字节 `\n`），
    /// 按字节分帧会把记录边界切在码元中间。
    #[error("delimiter of {delimiter_len} bytes is not aligned to {charset} code units")]
    MisalignedDelimiter {
        /// 配置的源字符集。
        charset: Charset,
        /// 分隔符字节长度。
        delimiter_len: usize,
    },
}

impl ConfigError {
    /// 返回稳定错误码，取值见 [`codes`]。
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::EmptyDelimiter => codes::CONFIG_EMPTY_DELIMITER,
            ConfigError::UnknownCharset { .. } => codes::CONFIG_UNKNOWN_CHARSET,
            ConfigError::MisalignedDelimiter { .. } => codes::CONFIG_MISALIGNED_DELIMITER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_per_variant() {
        assert_eq!(
            ConfigError::EmptyDelimiter.code(),
            "codec.line.config.empty_delimiter"
        );
        let unknown = ConfigError::UnknownCharset {
            name: "klingon".to_owned(),
        };
        assert_eq!(unknown.code(), codes::CONFIG_UNKNOWN_CHARSET);
        assert_eq!(unknown.to_string(), "unknown charset `klingon`");
        let misaligned = ConfigError::MisalignedDelimiter {
            charset: Charset::Utf16Le,
            delimiter_len: 1,
        };
        assert_eq!(misaligned.code(), "codec.line.config.misaligned_delimiter");
        assert_eq!(
            misaligned.to_string(),
            "delimiter of 1 bytes is not aligned to UTF-16LE code units"
        );
    }
}
