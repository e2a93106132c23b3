//! 行编解码器门面：把分帧器、字符集归一化与格式模板组装成对外的解码/编码入口。
//!
//! # 结构概览（What）
//! - [`LineDecoder`]：字节块 → 文本记录序列，流结束时 `flush` 取回最后半截记录；
//! - [`LineEncoder`]：记录 → 模板渲染或默认字符串化 → 追加分隔符 → 字节输出；
//! - [`LineCodec`]：在上述两者之上接入调用方的 [`EventFactory`]，每行文本构造为一条事件。
//!
//! # 并发约束（Trade-offs）
//! - 解码侧持有分帧缓冲，只能由一条输入流独占（`&mut self`）；
//! - 编码侧不可变，可在多线程间共享。

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::charset::CharsetConverter;
use crate::config::LineCodecConfig;
use crate::error::ConfigError;
use crate::format::FormatTemplate;
use crate::record::{EventFactory, MESSAGE_FIELD, Record};
use crate::tokenizer::{BufferedTokenizer, Delimiter};

/// 解码入口：分帧 + 字符集归一化。
///
/// # 教案式说明
/// - **意图 (Why)**：对外只暴露“喂字节、拿文本”的值返回接口，不使用回调，便于独立测试；
/// - **契约 (What)**：
///   - `decode` 返回本次调用中被分隔符确认的全部记录，顺序与输入一致；
///   - 调用方需在流结束时调用 `flush` 取回未以分隔符结尾的最后一条记录；
///   - 两个操作都没有错误路径，畸形字节由归一化器修复；
/// - **执行逻辑 (How)**：`BufferedTokenizer::feed` 切出 `Bytes` 记录，逐条交给 `CharsetConverter::convert`。
#[derive(Clone, Debug, Default)]
pub struct LineDecoder {
    tokenizer: BufferedTokenizer,
    converter: CharsetConverter,
}

impl LineDecoder {
    /// 以分隔符与归一化器组装解码器。
    pub fn new(delimiter: Delimiter, converter: CharsetConverter) -> Self {
        Self {
            tokenizer: BufferedTokenizer::new(delimiter),
            converter,
        }
    }

    /// 按配置构造；分隔符为空、字符集未知，或分隔符长度不是码元宽度的整数倍时立即失败。
    ///
    /// UTF-16 源需要两字节分隔符，例如 `UTF-16LE` 配合 `"\n\0"`、`UTF-16BE` 配合 `"\0\n"`。
    /// 长度对齐只是必要条件：分帧不跟踪码元边界，跨码元恰好拼出分隔符的字节组合仍会被切开。
    pub fn from_config(config: &LineCodecConfig) -> Result<Self, ConfigError> {
        let delimiter = config.delimiter()?;
        let profile = config.encoding_profile()?;
        if !delimiter.len().is_multiple_of(profile.charset.code_unit_len()) {
            return Err(ConfigError::MisalignedDelimiter {
                charset: profile.charset,
                delimiter_len: delimiter.len(),
            });
        }
        Ok(Self::new(delimiter, CharsetConverter::new(profile)))
    }

    /// 解码一个字节块。
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        let records = self.tokenizer.feed(chunk);
        records
            .iter()
            .map(|record| self.converter.convert(record))
            .collect()
    }

    /// 取出缓冲中剩余的最后一条记录。
    pub fn flush(&mut self) -> Option<String> {
        let remainder = self.tokenizer.flush()?;
        debug!(len = remainder.len(), "line decoder flushed trailing record");
        Some(self.converter.convert(&remainder))
    }

    /// 底层分帧器。
    pub fn tokenizer(&self) -> &BufferedTokenizer {
        &self.tokenizer
    }

    /// 底层归一化器。
    pub fn converter(&self) -> &CharsetConverter {
        &self.converter
    }
}

/// 编码入口：格式化并追加分隔符。
#[derive(Clone, Debug, Default)]
pub struct LineEncoder {
    delimiter: Delimiter,
    format: Option<FormatTemplate>,
}

impl LineEncoder {
    /// 以分隔符与可选模板组装编码器。
    pub fn new(delimiter: Delimiter, format: Option<FormatTemplate>) -> Self {
        Self { delimiter, format }
    }

    /// 按配置构造；分隔符为空时立即失败。
    pub fn from_config(config: &LineCodecConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.delimiter()?, config.format_template()))
    }

    /// 编码为 `格式化文本 + 分隔符` 字节。
    pub fn encode_to_bytes<R: Record + ?Sized>(&self, record: &R) -> Bytes {
        let text = match &self.format {
            Some(template) => template.render(record),
            None => record.to_string(),
        };
        let mut out = BytesMut::with_capacity(text.len() + self.delimiter.len());
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(self.delimiter.as_bytes());
        out.freeze()
    }

    /// 编码并把结果交给输出回调，每次调用恰好回调一次。
    pub fn encode<R, F>(&self, record: &R, on_event: F)
    where
        R: Record + ?Sized,
        F: FnOnce(&R, Bytes),
    {
        let encoded = self.encode_to_bytes(record);
        on_event(record, encoded);
    }

    /// 使用中的分隔符。
    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    /// 使用中的模板。
    pub fn format(&self) -> Option<&FormatTemplate> {
        self.format.as_ref()
    }
}

/// 完整的行编解码器：解码器 + 编码器 + 调用方的事件构造能力。
///
/// # 教案式说明
/// - **意图 (Why)**：给流水线组件提供一个与输入流一一对应的对象，解码出的每行文本直接成为事件；
/// - **契约 (What)**：每条记录以 `(MESSAGE_FIELD, 文本)` 调用一次 [`EventFactory::new_event`]；
///   事件的其它字段（时间戳、来源等）由调用方在工厂内补齐；
/// - **设计权衡 (Trade-offs)**：工厂以泛型参数持有，避免虚调用；需要动态分发时可传入 `Box<dyn Fn>`。
#[derive(Clone, Debug)]
pub struct LineCodec<F> {
    decoder: LineDecoder,
    encoder: LineEncoder,
    factory: F,
}

impl<F: EventFactory> LineCodec<F> {
    /// 按配置构造编解码器，所有配置错误在此处一次性暴露。
    pub fn new(config: &LineCodecConfig, factory: F) -> Result<Self, ConfigError> {
        let decoder = LineDecoder::from_config(config)?;
        let encoder = LineEncoder::from_config(config)?;
        debug!(
            delimiter = ?decoder.tokenizer().delimiter(),
            charset = %decoder.converter().profile().charset,
            format = config.format.as_deref(),
            "line codec constructed"
        );
        Ok(Self {
            decoder,
            encoder,
            factory,
        })
    }

    /// 解码一个字节块，返回本次确认的全部事件。
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<F::Event> {
        let lines = self.decoder.decode(chunk);
        lines
            .into_iter()
            .map(|line| self.factory.new_event(MESSAGE_FIELD, line))
            .collect()
    }

    /// 流结束时取出最后一条事件。
    pub fn flush(&mut self) -> Option<F::Event> {
        let line = self.decoder.flush()?;
        Some(self.factory.new_event(MESSAGE_FIELD, line))
    }

    /// 编码一条记录并回调输出。
    pub fn encode<R, C>(&self, record: &R, on_event: C)
    where
        R: Record + ?Sized,
        C: FnOnce(&R, Bytes),
    {
        self.encoder.encode(record, on_event);
    }

    /// 解码侧。
    pub fn decoder(&self) -> &LineDecoder {
        &self.decoder
    }

    /// 编码侧。
    pub fn encoder(&self) -> &LineEncoder {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::{Charset, MalformedPolicy};

    fn message_factory() -> impl EventFactory<Event = (String, String)> {
        |field: &str, value: String| (field.to_owned(), value)
    }

    #[test]
    fn decoder_converts_each_record() {
        let mut decoder = LineDecoder::new(
            Delimiter::newline(),
            CharsetConverter::for_charset(Charset::Iso8859_1),
        );
        assert_eq!(decoder.decode(b"M\xFCnchen\nK\xF6ln"), vec!["München"]);
        assert_eq!(decoder.flush().as_deref(), Some("Köln"));
        assert_eq!(decoder.flush(), None);
    }

    #[test]
    fn decoder_from_config_rejects_bad_config() {
        let config = LineCodecConfig::default().with_charset("nope");
        assert!(matches!(
            LineDecoder::from_config(&config),
            Err(ConfigError::UnknownCharset { .. })
        ));
        let config = LineCodecConfig::default().with_delimiter("");
        assert_eq!(
            LineEncoder::from_config(&config).err(),
            Some(ConfigError::EmptyDelimiter)
        );
    }

    #[test]
    fn utf16_requires_two_byte_delimiter() {
        let config = LineCodecConfig::default().with_charset("UTF-16LE");
        assert_eq!(
            LineDecoder::from_config(&config).err(),
            Some(ConfigError::MisalignedDelimiter {
                charset: Charset::Utf16Le,
                delimiter_len: 1,
            })
        );

        let mut decoder =
            LineDecoder::from_config(&config.with_delimiter("\n\0")).expect("aligned delimiter");
        assert_eq!(decoder.decode(b"a\0\n\0b\0\n\0"), vec!["a", "b"]);
        assert_eq!(decoder.flush(), None);

        let big_endian = LineCodecConfig::default()
            .with_charset("UTF-16BE")
            .with_delimiter("\0\n");
        let mut decoder = LineDecoder::from_config(&big_endian).expect("aligned delimiter");
        assert_eq!(decoder.decode(b"\0h\0i\0\n"), vec!["hi"]);
    }

    #[test]
    fn encoder_appends_delimiter_and_calls_back_once() {
        let encoder = LineEncoder::new(Delimiter::new("|").expect("delimiter"), None);
        let mut calls = Vec::new();
        encoder.encode("hello", |record: &str, bytes| calls.push((record.to_owned(), bytes)));
        assert_eq!(calls, vec![("hello".to_owned(), Bytes::from_static(b"hello|"))]);
    }

    #[test]
    fn encoder_uses_template_when_configured() {
        let encoder = LineEncoder::new(
            Delimiter::newline(),
            Some(FormatTemplate::parse("<%{message}>")),
        );
        assert_eq!(encoder.encode_to_bytes("hi"), Bytes::from_static(b"<hi>\n"));
    }

    #[test]
    fn codec_builds_events_with_message_field() {
        let config = LineCodecConfig::default().with_malformed_policy(MalformedPolicy::Escape);
        let mut codec = LineCodec::new(&config, message_factory()).expect("valid config");
        let events = codec.decode(b"first\nsec");
        assert_eq!(events, vec![("message".to_owned(), "first".to_owned())]);
        assert!(codec.decode(&[0xD0]).is_empty());
        assert_eq!(
            codec.flush(),
            Some(("message".to_owned(), "sec\\xD0".to_owned()))
        );
        assert_eq!(codec.flush(), None);
    }
}
