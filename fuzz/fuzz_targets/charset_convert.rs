#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spark_codec_line::{Charset, CharsetConverter, EncodingProfile, MalformedPolicy};

/// Fuzz 用例：任意字节在任意字符集与修复策略下归一化。
///
/// - **Why**：归一化没有失败路径，任何输入都必须得到 UTF-8 文本而不是 panic；
/// - **What**：合法 UTF-8 在 `Utf8` 下必须原样透传。
#[derive(Debug, Arbitrary)]
struct ConvertCase {
    charset: u8,
    escape: bool,
    raw: Vec<u8>,
}

fuzz_target!(|case: ConvertCase| {
    let charset = Charset::ALL[usize::from(case.charset) % Charset::ALL.len()];
    let policy = if case.escape {
        MalformedPolicy::Escape
    } else {
        MalformedPolicy::Replace
    };
    let converter = CharsetConverter::new(EncodingProfile::new(charset).with_policy(policy));
    let conversion = converter.convert_checked(&case.raw);

    if case.raw.is_empty() {
        assert!(conversion.text.is_empty());
    }
    if charset == Charset::Utf8 {
        if let Ok(valid) = std::str::from_utf8(&case.raw) {
            assert!(!conversion.malformed);
            assert_eq!(conversion.text, valid);
        }
    }
});
