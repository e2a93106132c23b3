#![warn(missing_docs)]

//! `spark-codec-line` 提供基于分隔符分帧、带字符集归一化的增量行编解码器。
//!
//! # 背景（Why）
//! - 行协议与日志文件以任意大小、任意对齐的字节块到达，块边界与记录边界无关；
//! - 编解码器需要跨调用暂存半截记录、按可配置分隔符切分，并容忍非 UTF-8 源编码中的畸形字节。
//!
//! # 使用概览（How）
//! - 解码：[`LineDecoder::decode`] 喂入字节块得到文本记录，流结束时调用 [`LineDecoder::flush`]；
//! - 编码：[`LineEncoder::encode`] 把记录格式化并追加分隔符，通过回调交出字节；
//! - 需要直接产出事件时使用 [`LineCodec`]，由调用方提供 [`EventFactory`]。
//!
//! ```
//! use spark_codec_line::{LineCodecConfig, LineDecoder};
//!
//! let config = LineCodecConfig::default().with_delimiter("|");
//! let mut decoder = LineDecoder::from_config(&config).expect("valid config");
//! assert_eq!(decoder.decode(b"line1|line2|li"), vec!["line1", "line2"]);
//! assert_eq!(decoder.flush().as_deref(), Some("li"));
//! ```
//!
//! # 合约说明（What）
//! - 分帧与归一化没有运行期错误：任意字节输入都会得到（可能为空的）记录序列与合法 UTF-8 文本；
//! - 配置错误（空分隔符、未知字符集、分隔符与 UTF-16 码元不对齐）只在构造时以 [`ConfigError`] 报告；
//! - 库本身只通过 `tracing` 发出事件，不安装任何日志订阅器。
//!
//! # 风险提示（Trade-offs）
//! - 分隔符为精确字节匹配，不提供转义；记录内容若可能包含分隔符，应改用长度前缀协议；
//! - 分帧缓冲不设上限，调用方需自行防御无分隔符的超长输入。

mod charset;
mod codec;
mod config;
mod error;
mod format;
mod record;
mod tokenizer;

pub use crate::charset::{Charset, CharsetConverter, Conversion, EncodingProfile, MalformedPolicy};
pub use crate::codec::{LineCodec, LineDecoder, LineEncoder};
pub use crate::config::LineCodecConfig;
pub use crate::error::{ConfigError, codes};
pub use crate::format::FormatTemplate;
pub use crate::record::{EventFactory, MESSAGE_FIELD, Record};
pub use crate::tokenizer::{BufferedTokenizer, Delimiter};
