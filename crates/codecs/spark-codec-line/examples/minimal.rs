//! 最小可运行示例：把乱序切分的 CP1252 字节流解码为事件，再把事件编码回带分隔符的字节。
//!
//! # 使用方式 (How)
//! ```bash
//! RUST_LOG=spark_codec_line=debug cargo run -p spark-codec-line --example minimal
//! ```
//!
//! # 契约说明 (What)
//! - 输入被故意切在记录中间以及多字节分隔符 `\r\n` 中间，演示跨调用暂存；
//! - 最后一段缺少分隔符，需要 `flush` 才能取回；
//! - 其中一个字节在 US-ASCII 视角下非法，这里配置为 CP1252，因此不会触发修复告警。

use std::borrow::Cow;
use std::fmt;

use spark_codec_line::{LineCodec, LineCodecConfig, Record};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 示例事件：仅保存 `message` 字段与序号。
#[derive(Debug)]
struct DemoEvent {
    sequence: usize,
    message: String,
}

impl fmt::Display for DemoEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.sequence, self.message)
    }
}

impl Record for DemoEvent {
    fn field(&self, reference: &str) -> Option<Cow<'_, str>> {
        match reference {
            "message" => Some(Cow::Borrowed(&self.message)),
            "sequence" => Some(Cow::Owned(self.sequence.to_string())),
            _ => None,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = LineCodecConfig::default()
        .with_delimiter("\r\n")
        .with_charset("CP1252")
        .with_format("[%{sequence}] %{message}");

    let counter = std::cell::Cell::new(0usize);
    let factory = |_field: &str, message: String| {
        let sequence = counter.get();
        counter.set(sequence + 1);
        DemoEvent { sequence, message }
    };
    let mut codec = LineCodec::new(&config, factory)?;

    let chunks: [&[u8]; 4] = [b"caf\xE9 ouvert\r", b"\nprix: 5 \x80\r\nder", b"nier", b" mot"];
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(codec.decode(chunk));
    }
    events.extend(codec.flush());

    for event in &events {
        codec.encode(event, |event, bytes| {
            info!(sequence = event.sequence, encoded = ?bytes, "re-encoded event");
        });
    }
    println!("[spark-codec-line/minimal] decoded {} events", events.len());
    Ok(())
}
