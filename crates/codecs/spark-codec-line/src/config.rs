//! 构造期配置。
//!
//! # 模块定位（Why）
//! - 配置以人类可读的字符串形式出现（分隔符、字符集名称、模板），可直接从 TOML/JSON 等配置表反序列化；
//! - 所有校验集中在构造编解码器的那一刻完成（fail-fast），运行期不再出现配置错误。
//!
//! # 使用方式（How）
//! - 代码中：`LineCodecConfig::default().with_delimiter("|").with_charset("CP1252")`；
//! - 配置文件中：以 `serde` 反序列化，未知键被拒绝，缺省键取默认值。

use serde::{Deserialize, Serialize};

use crate::charset::{Charset, EncodingProfile, MalformedPolicy};
use crate::error::ConfigError;
use crate::format::FormatTemplate;
use crate::tokenizer::Delimiter;

/// 行编解码器配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineCodecConfig {
    /// 记录分隔符，默认 `"\n"`，不得为空。
    pub delimiter: String,
    /// 源字符集名称，默认 `"UTF-8"`。
    pub charset: String,
    /// 编码侧格式模板；缺省时使用记录的默认字符串化结果。
    pub format: Option<String>,
    /// 畸形序列修复策略，默认 `replace`。
    pub on_malformed: MalformedPolicy,
}

impl Default for LineCodecConfig {
    fn default() -> Self {
        Self {
            delimiter: "\n".to_owned(),
            charset: Charset::default().name().to_owned(),
            format: None,
            on_malformed: MalformedPolicy::default(),
        }
    }
}

impl LineCodecConfig {
    /// 设置分隔符。
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// 设置源字符集名称。
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// 设置编码模板。
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// 设置畸形序列修复策略。
    pub fn with_malformed_policy(mut self, on_malformed: MalformedPolicy) -> Self {
        self.on_malformed = on_malformed;
        self
    }

    /// 校验并解析分隔符。
    pub fn delimiter(&self) -> Result<Delimiter, ConfigError> {
        Delimiter::new(&self.delimiter)
    }

    /// 校验并解析字符集配置。
    pub fn encoding_profile(&self) -> Result<EncodingProfile, ConfigError> {
        let charset: Charset = self.charset.parse()?;
        Ok(EncodingProfile::new(charset).with_policy(self.on_malformed))
    }

    /// 解析编码模板。
    pub fn format_template(&self) -> Option<FormatTemplate> {
        self.format.as_deref().map(FormatTemplate::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_newline_utf8_replace() {
        let config = LineCodecConfig::default();
        assert_eq!(config.delimiter(), Ok(Delimiter::newline()));
        assert_eq!(config.encoding_profile(), Ok(EncodingProfile::default()));
        assert_eq!(config.format_template(), None);
    }

    #[test]
    fn builder_methods_chain() {
        let config = LineCodecConfig::default()
            .with_delimiter("|")
            .with_charset("cp1252")
            .with_format("%{host}")
            .with_malformed_policy(MalformedPolicy::Escape);
        assert_eq!(config.delimiter().map(|d| d.len()), Ok(1));
        assert_eq!(
            config.encoding_profile(),
            Ok(EncodingProfile::new(Charset::Windows1252).with_policy(MalformedPolicy::Escape))
        );
        assert_eq!(
            config.format_template().map(|t| t.to_string()).as_deref(),
            Some("%{host}")
        );
    }

    #[test]
    fn invalid_values_fail_on_resolution() {
        let config = LineCodecConfig::default()
            .with_delimiter("")
            .with_charset("EBCDIC-037");
        assert_eq!(config.delimiter(), Err(ConfigError::EmptyDelimiter));
        assert!(matches!(
            config.encoding_profile(),
            Err(ConfigError::UnknownCharset { name }) if name == "EBCDIC-037"
        ));
    }
}
