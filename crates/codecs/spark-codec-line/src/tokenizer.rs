//! 增量分帧器：把任意对齐的字节块还原为按分隔符切分的完整记录。
//!
//! # 模块定位（Why）
//! - 网络读、文件读交付的字节块不会对齐到记录边界，分帧器负责跨调用暂存半截记录；
//! - 多字节分隔符可能被拆在两个字节块之间，因此必须在累计缓冲上扫描，而不是逐块独立扫描。
//!
//! # 实现策略（How）
//! - 缓冲使用 `BytesMut`，命中分隔符时 `split_to` 切出记录并冻结为 `Bytes`，记录与缓冲共享底层内存；
//! - 分隔符查找使用预编译的 `memchr::memmem::Finder`；
//! - `scan_from` 记录已确认不含分隔符起点的前缀长度，连续多次未命中时不会重复扫描旧字节，
//!   总复杂度与处理的字节数呈线性关系。
//!
//! # 契约说明（What）
//! - 缓冲中永远不含完整的“记录 + 分隔符”；
//! - `feed` 返回的记录按其结束分隔符出现的顺序排列，不含分隔符本身；
//! - `flush` 取走剩余字节并清空缓冲，重复调用幂等。

use core::fmt;

use bytes::{Bytes, BytesMut};
use memchr::memmem::Finder;
use tracing::trace;

use crate::error::ConfigError;

const NEWLINE: &[u8] = b"\n";

/// 不可变、非空的分隔符字节序列。
///
/// 默认值为单个换行符 `\n`。匹配为精确字节匹配，不支持正则或转义。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Delimiter(Bytes);

impl Delimiter {
    /// 校验并构造分隔符；空序列返回 [`ConfigError::EmptyDelimiter`]。
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        Ok(Self(Bytes::copy_from_slice(bytes)))
    }

    /// 单字节换行分隔符。
    pub fn newline() -> Self {
        Self(Bytes::from_static(NEWLINE))
    }

    /// 分隔符原始字节。
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// 分隔符长度，恒大于 0。
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::newline()
    }
}

impl fmt::Debug for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delimiter({:?})", self.0)
    }
}

/// 增量分帧器，独占一块跨调用保留的字节缓冲。
///
/// # 教案式说明
/// - **意图 (Why)**：一个实例对应一条输入流（连接、文件），负责把乱序对齐的字节块还原为整条记录；
/// - **契约 (What)**：
///   - `feed` 可接收空块、含零个/一个/多个分隔符的块，以及与缓冲尾部拼接后才构成分隔符的块；
///   - 任意字节输入都合法，不存在错误路径；
///   - 实例不支持多线程并发使用，`&mut self` 将并发访问约束在编译期；
/// - **执行逻辑 (How)**：追加 → 循环查找分隔符并切出记录 → 更新 `scan_from`；
/// - **设计权衡 (Trade-offs)**：记录以 `Bytes` 形式返回，与缓冲共享分配；若调用方长期持有记录，
///   对应的底层块不会被 `BytesMut` 复用，这是零拷贝换取的内存驻留成本。
#[derive(Clone, Debug)]
pub struct BufferedTokenizer {
    delimiter: Delimiter,
    finder: Finder<'static>,
    buffer: BytesMut,
    scan_from: usize,
}

impl BufferedTokenizer {
    /// 以给定分隔符创建空缓冲的分帧器。
    pub fn new(delimiter: Delimiter) -> Self {
        let finder = Finder::new(delimiter.as_bytes()).into_owned();
        Self {
            delimiter,
            finder,
            buffer: BytesMut::new(),
            scan_from: 0,
        }
    }

    /// 当前使用的分隔符。
    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    /// 暂存在缓冲中、尚未被分隔符确认的字节数。
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 缓冲是否为空。
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 追加一个字节块，并取出所有已被分隔符确认的完整记录。
    ///
    /// 单次调用内出现的所有分隔符都会被处理，不会在首个匹配处截断。
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);

        let delimiter_len = self.delimiter.len();
        let mut records = Vec::new();
        while let Some(offset) = self.finder.find(&self.buffer[self.scan_from..]) {
            let end = self.scan_from + offset;
            let mut frame = self.buffer.split_to(end + delimiter_len);
            frame.truncate(end);
            records.push(frame.freeze());
            self.scan_from = 0;
        }

        // 末尾不足一个分隔符长度的字节可能与下一块拼成分隔符，下次需从这里重新扫描。
        self.scan_from = self.buffer.len().saturating_sub(delimiter_len - 1);

        if !records.is_empty() {
            trace!(
                records = records.len(),
                buffered = self.buffer.len(),
                "line tokenizer extracted records"
            );
        }
        records
    }

    /// 取出缓冲中剩余的半截记录并清空缓冲。
    ///
    /// 缓冲为空时返回 `None`；连续调用两次，第二次必然返回 `None`。
    pub fn flush(&mut self) -> Option<Bytes> {
        self.scan_from = 0;
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.buffer.split().freeze())
    }
}

impl Default for BufferedTokenizer {
    fn default() -> Self {
        Self::new(Delimiter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> BufferedTokenizer {
        BufferedTokenizer::new(Delimiter::new("|").expect("non-empty delimiter"))
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        assert_eq!(Delimiter::new(b""), Err(ConfigError::EmptyDelimiter));
        assert_eq!(Delimiter::default().as_bytes(), b"\n");
    }

    #[test]
    fn feed_returns_single_line() {
        let mut tokenizer = BufferedTokenizer::default();
        let records = tokenizer.feed(b"hello world\n");
        assert_eq!(records, vec![Bytes::from_static(b"hello world")]);
        assert!(tokenizer.is_empty());
        assert_eq!(tokenizer.flush(), None);
    }

    #[test]
    fn feed_extracts_every_delimiter_in_one_call() {
        let mut tokenizer = pipe();
        let records = tokenizer.feed(b"line1|line2|line3|");
        assert_eq!(records, vec!["line1", "line2", "line3"]);
        assert_eq!(tokenizer.flush(), None);
    }

    #[test]
    fn newline_is_plain_data_under_custom_delimiter() {
        let mut tokenizer = pipe();
        let input = b"line1\nline2\nline3\n";
        assert!(tokenizer.feed(input).is_empty());
        assert_eq!(tokenizer.buffered_len(), input.len());
        assert_eq!(tokenizer.flush().as_deref(), Some(&input[..]));
    }

    #[test]
    fn empty_records_between_consecutive_delimiters() {
        let mut tokenizer = BufferedTokenizer::default();
        assert_eq!(tokenizer.feed(b"\n"), vec![Bytes::new()]);
        assert_eq!(tokenizer.feed(b"a\n\n\nb"), vec!["a", "", ""]);
        assert_eq!(tokenizer.flush().as_deref(), Some(&b"b"[..]));
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut tokenizer = BufferedTokenizer::default();
        assert!(tokenizer.feed(b"").is_empty());
        assert!(tokenizer.feed(b"abc").is_empty());
        assert!(tokenizer.feed(b"").is_empty());
        assert_eq!(tokenizer.buffered_len(), 3);
    }

    #[test]
    fn record_completed_by_later_chunk() {
        let mut tokenizer = BufferedTokenizer::default();
        assert!(tokenizer.feed(b"a").is_empty());
        assert_eq!(tokenizer.feed(b"\n"), vec!["a"]);
        assert_eq!(tokenizer.flush(), None);
    }

    #[test]
    fn multi_byte_delimiter_straddles_chunks() {
        let mut tokenizer = BufferedTokenizer::new(Delimiter::new("\r\n").expect("delimiter"));
        assert!(tokenizer.feed(b"GET / HTTP/1.1\r").is_empty());
        assert_eq!(tokenizer.feed(b"\nHost: x\r"), vec!["GET / HTTP/1.1"]);
        assert!(tokenizer.feed(b"").is_empty());
        assert_eq!(tokenizer.feed(b"\n"), vec!["Host: x"]);
        assert!(tokenizer.is_empty());
    }

    #[test]
    fn delimiter_split_one_byte_at_a_time() {
        let mut tokenizer = BufferedTokenizer::new(Delimiter::new("<END>").expect("delimiter"));
        let mut records = Vec::new();
        for byte in b"one<END>two<EN<END>" {
            records.extend(tokenizer.feed(core::slice::from_ref(byte)));
        }
        assert_eq!(records, vec!["one", "two<EN"]);
        assert_eq!(tokenizer.flush(), None);
    }

    #[test]
    fn flush_is_idempotent() {
        let mut tokenizer = BufferedTokenizer::default();
        tokenizer.feed(b"partial");
        assert_eq!(tokenizer.flush().as_deref(), Some(&b"partial"[..]));
        assert_eq!(tokenizer.flush(), None);
        assert_eq!(tokenizer.feed(b"next\n"), vec!["next"]);
    }
}
