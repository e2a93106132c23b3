//! 字符集归一化：把声明为某种源字符集的字节转换为合法的 UTF-8 文本。
//!
//! # 模块定位（Why）
//! - 日志文件常以 `Latin-1`、`CP1252`、`Shift_JIS` 等遗留编码写入，下游统一以 UTF-8 `String` 处理；
//! - 输入可能夹杂非法字节，归一化必须“永不失败”：以替换或转义修复，而不是把错误抛给流水线。
//!
//! # 实现策略（How）
//! - [`Charset`] 为封闭枚举，名称在构造期经 `FromStr` 解析一次，未知名称立即拒绝；
//! - UTF-8 走 `<[u8]>::utf8_chunks`，`US-ASCII` 与 `ISO-8859-1` 为逐字节映射，其余编码委托 `encoding_rs`
//!   的 WHATWG 解码器；
//! - 发生修复时通过 `tracing::warn!` 上报，日志订阅器由调用方安装。
//!
//! # 替换策略（What）
//! - [`MalformedPolicy::Replace`]：每个畸形序列替换为一个 `U+FFFD`。UTF-8 下畸形序列为“最大非法子段”，
//!   单字节编码下为单个字节，其余编码以对应 WHATWG 解码器报告的畸形序列为准；
//! - [`MalformedPolicy::Escape`]：畸形序列中的每个字节写成字面量 `\xNN`（两位大写十六进制）。

use core::fmt;
use core::str::FromStr;

use encoding_rs::{DecoderResult, Encoding};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// 受支持的源字符集封闭集合。
///
/// `Utf8` 是规范编码（“不转换”字符集）；`UsAscii` 与 `Iso8859_1` 按字节直接映射；
/// 其余变体与 `encoding_rs` 提供的 WHATWG 编码一一对应（WHATWG 的 `replacement` 伪编码除外）。
///
/// # 名称解析
/// - 先按 WHATWG 标签表（`Encoding::for_label_no_replacement`）查找，再尝试去掉 `-`、`_`、`.`、空格后的写法，
///   最后补充 `CP932`、`Windows-31J`、`macRoman` 等常见别名；
/// - 与 WHATWG 不同，`US-ASCII`、`ISO-8859-1`（及 `latin1` 等别名）解析为严格的 ASCII 与真正的 Latin-1，
///   而不是 `windows-1252`；
/// - 其余 WHATWG 别名照常生效，例如 `ISO-8859-9` 解析为 [`Charset::Windows1254`]，`UTF-16` 解析为
///   [`Charset::Utf16Le`]。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Charset {
    /// `UTF-8`，规范编码。
    #[default]
    Utf8,
    /// `US-ASCII`，`0x80` 及以上的字节均视为畸形。
    UsAscii,
    /// `ISO-8859-1`（Latin-1），每个字节映射到 `U+0000..=U+00FF`。
    Iso8859_1,
    /// `IBM866`。
    Ibm866,
    /// `ISO-8859-2`（Latin-2）。
    Iso8859_2,
    /// `ISO-8859-3`。
    Iso8859_3,
    /// `ISO-8859-4`。
    Iso8859_4,
    /// `ISO-8859-5`（西里尔）。
    Iso8859_5,
    /// `ISO-8859-6`（阿拉伯）。
    Iso8859_6,
    /// `ISO-8859-7`（希腊）。
    Iso8859_7,
    /// `ISO-8859-8`（希伯来，视觉顺序）。
    Iso8859_8,
    /// `ISO-8859-8-I`（希伯来，逻辑顺序）。
    Iso8859_8I,
    /// `ISO-8859-10`。
    Iso8859_10,
    /// `ISO-8859-13`。
    Iso8859_13,
    /// `ISO-8859-14`。
    Iso8859_14,
    /// `ISO-8859-15`（Latin-9）。
    Iso8859_15,
    /// `ISO-8859-16`。
    Iso8859_16,
    /// `KOI8-R`。
    Koi8R,
    /// `KOI8-U`。
    Koi8U,
    /// `macintosh`（Mac OS Roman）。
    Macintosh,
    /// `windows-874`（泰文，兼容 `TIS-620`）。
    Windows874,
    /// `windows-1250`。
    Windows1250,
    /// `windows-1251`。
    Windows1251,
    /// `windows-1252`。
    Windows1252,
    /// `windows-1253`。
    Windows1253,
    /// `windows-1254`（同时承接 `ISO-8859-9`）。
    Windows1254,
    /// `windows-1255`。
    Windows1255,
    /// `windows-1256`。
    Windows1256,
    /// `windows-1257`。
    Windows1257,
    /// `windows-1258`。
    Windows1258,
    /// `x-mac-cyrillic`。
    XMacCyrillic,
    /// `GBK`。
    Gbk,
    /// `gb18030`。
    Gb18030,
    /// `Big5`。
    Big5,
    /// `EUC-JP`。
    EucJp,
    /// `ISO-2022-JP`，有状态编码，转义序列在单条记录内生效。
    Iso2022Jp,
    /// `Shift_JIS`。
    ShiftJis,
    /// `EUC-KR`。
    EucKr,
    /// `UTF-16BE`，码元为 2 字节，分隔符长度必须为偶数（例如 `"\0\n"`）。
    Utf16Be,
    /// `UTF-16LE`，码元为 2 字节，分隔符长度必须为偶数（例如 `"\n\0"`）。
    Utf16Le,
    /// `x-user-defined`，`0x80..=0xFF` 映射到私用区 `U+F780..=U+F7FF`。
    XUserDefined,
}

impl Charset {
    /// 全部受支持的字符集，顺序与枚举声明一致。
    pub const ALL: &'static [Charset] = &[
        Self::Utf8,
        Self::UsAscii,
        Self::Iso8859_1,
        Self::Ibm866,
        Self::Iso8859_2,
        Self::Iso8859_3,
        Self::Iso8859_4,
        Self::Iso8859_5,
        Self::Iso8859_6,
        Self::Iso8859_7,
        Self::Iso8859_8,
        Self::Iso8859_8I,
        Self::Iso8859_10,
        Self::Iso8859_13,
        Self::Iso8859_14,
        Self::Iso8859_15,
        Self::Iso8859_16,
        Self::Koi8R,
        Self::Koi8U,
        Self::Macintosh,
        Self::Windows874,
        Self::Windows1250,
        Self::Windows1251,
        Self::Windows1252,
        Self::Windows1253,
        Self::Windows1254,
        Self::Windows1255,
        Self::Windows1256,
        Self::Windows1257,
        Self::Windows1258,
        Self::XMacCyrillic,
        Self::Gbk,
        Self::Gb18030,
        Self::Big5,
        Self::EucJp,
        Self::Iso2022Jp,
        Self::ShiftJis,
        Self::EucKr,
        Self::Utf16Be,
        Self::Utf16Le,
        Self::XUserDefined,
    ];

    /// 规范名称；WHATWG 编码沿用 `encoding_rs` 给出的名称。
    pub fn name(self) -> &'static str {
        match self.decoding() {
            Decoding::Utf8 => "UTF-8",
            Decoding::Ascii => "US-ASCII",
            Decoding::Latin1 => "ISO-8859-1",
            Decoding::Whatwg(encoding) => encoding.name(),
        }
    }

    /// 是否为规范编码（无需转换）。
    pub fn is_canonical(self) -> bool {
        matches!(self, Self::Utf8)
    }

    /// 码元宽度（字节）。UTF-16 为 2，其余均为 1。
    ///
    /// 分帧在字节层面进行，分隔符长度必须是码元宽度的整数倍，否则记录边界会落在码元中间。
    pub fn code_unit_len(self) -> usize {
        match self {
            Self::Utf16Be | Self::Utf16Le => 2,
            _ => 1,
        }
    }

    /// 对应的 `encoding_rs` 编码；`US-ASCII` 与 `ISO-8859-1` 不走 WHATWG 映射，返回 `None`。
    pub fn encoding(self) -> Option<&'static Encoding> {
        match self.decoding() {
            Decoding::Utf8 => Some(encoding_rs::UTF_8),
            Decoding::Ascii | Decoding::Latin1 => None,
            Decoding::Whatwg(encoding) => Some(encoding),
        }
    }

    fn from_encoding(encoding: &'static Encoding) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|charset| charset.encoding() == Some(encoding))
    }

    fn decoding(self) -> Decoding {
        let encoding = match self {
            Self::Utf8 => return Decoding::Utf8,
            Self::UsAscii => return Decoding::Ascii,
            Self::Iso8859_1 => return Decoding::Latin1,
            Self::Ibm866 => encoding_rs::IBM866,
            Self::Iso8859_2 => encoding_rs::ISO_8859_2,
            Self::Iso8859_3 => encoding_rs::ISO_8859_3,
            Self::Iso8859_4 => encoding_rs::ISO_8859_4,
            Self::Iso8859_5 => encoding_rs::ISO_8859_5,
            Self::Iso8859_6 => encoding_rs::ISO_8859_6,
            Self::Iso8859_7 => encoding_rs::ISO_8859_7,
            Self::Iso8859_8 => encoding_rs::ISO_8859_8,
            Self::Iso8859_8I => encoding_rs::ISO_8859_8_I,
            Self::Iso8859_10 => encoding_rs::ISO_8859_10,
            Self::Iso8859_13 => encoding_rs::ISO_8859_13,
            Self::Iso8859_14 => encoding_rs::ISO_8859_14,
            Self::Iso8859_15 => encoding_rs::ISO_8859_15,
            Self::Iso8859_16 => encoding_rs::ISO_8859_16,
            Self::Koi8R => encoding_rs::KOI8_R,
            Self::Koi8U => encoding_rs::KOI8_U,
            Self::Macintosh => encoding_rs::MACINTOSH,
            Self::Windows874 => encoding_rs::WINDOWS_874,
            Self::Windows1250 => encoding_rs::WINDOWS_1250,
            Self::Windows1251 => encoding_rs::WINDOWS_1251,
            Self::Windows1252 => encoding_rs::WINDOWS_1252,
            Self::Windows1253 => encoding_rs::WINDOWS_1253,
            Self::Windows1254 => encoding_rs::WINDOWS_1254,
            Self::Windows1255 => encoding_rs::WINDOWS_1255,
            Self::Windows1256 => encoding_rs::WINDOWS_1256,
            Self::Windows1257 => encoding_rs::WINDOWS_1257,
            Self::Windows1258 => encoding_rs::WINDOWS_1258,
            Self::XMacCyrillic => encoding_rs::X_MAC_CYRILLIC,
            Self::Gbk => encoding_rs::GBK,
            Self::Gb18030 => encoding_rs::GB18030,
            Self::Big5 => encoding_rs::BIG5,
            Self::EucJp => encoding_rs::EUC_JP,
            Self::Iso2022Jp => encoding_rs::ISO_2022_JP,
            Self::ShiftJis => encoding_rs::SHIFT_JIS,
            Self::EucKr => encoding_rs::EUC_KR,
            Self::Utf16Be => encoding_rs::UTF_16BE,
            Self::Utf16Le => encoding_rs::UTF_16LE,
            Self::XUserDefined => encoding_rs::X_USER_DEFINED,
        };
        Decoding::Whatwg(encoding)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = ConfigError;

    /// 解析字符集名称，规则见 [`Charset`] 的“名称解析”一节。
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let folded: String = name
            .chars()
            .filter(|ch| !matches!(ch, '-' | '_' | '.' | ' ' | ':'))
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        let charset = match folded.as_str() {
            "usascii" | "ascii" | "ansix341968" | "iso646us" => Some(Self::UsAscii),
            "iso88591" | "iso885911987" | "latin1" | "l1" | "cp819" | "ibm819" | "isoir100"
            | "csisolatin1" => Some(Self::Iso8859_1),
            _ => whatwg_label(name, &folded).and_then(Self::from_encoding),
        };
        charset.ok_or_else(|| ConfigError::UnknownCharset {
            name: name.to_owned(),
        })
    }
}

/// 依次尝试原始名称、折叠名称与补充别名的 WHATWG 标签查找。
fn whatwg_label(name: &str, folded: &str) -> Option<&'static Encoding> {
    let lookup = |label: &str| Encoding::for_label_no_replacement(label.as_bytes());
    lookup(name).or_else(|| lookup(folded)).or_else(|| {
        let alias = match folded {
            "utf16" | "utf16le" => "utf-16le",
            "utf16be" => "utf-16be",
            "shiftjis" | "cp932" | "windows31j" | "mskanji" => "shift_jis",
            "eucjp" | "eucjpms" => "euc-jp",
            "euckr" | "cp949" => "euc-kr",
            "cp936" => "gbk",
            "big5hkscs" => "big5",
            "koi8r" => "koi8-r",
            "koi8u" => "koi8-u",
            "iso2022jp" => "iso-2022-jp",
            "iso88598i" => "iso-8859-8-i",
            "macroman" => "macintosh",
            "maccyrillic" => "x-mac-cyrillic",
            "cp874" => "windows-874",
            other => {
                let page = other
                    .strip_prefix("windows")
                    .or_else(|| other.strip_prefix("cp"))?;
                return lookup(&format!("windows-{page}"));
            }
        };
        lookup(alias)
    })
}

/// 构造期解析出的解码路径。
#[derive(Clone, Copy, Debug)]
enum Decoding {
    Utf8,
    Ascii,
    Latin1,
    Whatwg(&'static Encoding),
}

/// 畸形字节序列的修复策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// 每个畸形序列替换为一个 `U+FFFD`。
    #[default]
    Replace,
    /// 畸形序列的每个字节写成字面量 `\xNN`。
    Escape,
}

impl MalformedPolicy {
    fn substitute(self, malformed: &[u8], out: &mut String) {
        if malformed.is_empty() {
            return;
        }
        match self {
            Self::Replace => out.push(char::REPLACEMENT_CHARACTER),
            Self::Escape => {
                for &byte in malformed {
                    out.push_str("\\x");
                    out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
                    out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]));
                }
            }
        }
    }
}

/// 归一化器的不可变配置：源字符集 + 修复策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EncodingProfile {
    /// 源字符集。
    pub charset: Charset,
    /// 畸形序列修复策略。
    pub on_malformed: MalformedPolicy,
}

impl EncodingProfile {
    /// 以默认 `Replace` 策略创建配置。
    pub fn new(charset: Charset) -> Self {
        Self {
            charset,
            on_malformed: MalformedPolicy::default(),
        }
    }

    /// 替换修复策略。
    pub fn with_policy(mut self, on_malformed: MalformedPolicy) -> Self {
        self.on_malformed = on_malformed;
        self
    }
}

/// 一次转换的结果，附带是否发生过修复。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversion {
    /// 合法 UTF-8 文本。
    pub text: String,
    /// 输入中是否存在被替换或转义的畸形序列。
    pub malformed: bool,
}

impl Conversion {
    fn clean(text: String) -> Self {
        Self {
            text,
            malformed: false,
        }
    }
}

/// 字符集归一化器。
///
/// # 教案式说明
/// - **意图 (Why)**：保证分帧器交出的每条记录都能变成合法文本，下游不再需要任何修复；
/// - **契约 (What)**：
///   - `convert` 对任意输入（含空输入、任意二进制垃圾）都返回合法 `String`，不会失败或 panic，
///     也不会静默丢弃字节：每个畸形序列都会留下替换符或转义文本；
///   - 除不可变的 [`EncodingProfile`] 外没有内部状态，可在多线程间共享、反复调用；
/// - **执行逻辑 (How)**：构造期把字符集解析为私有的 `Decoding` 路径，调用期只做一次 `match`；
/// - **设计权衡 (Trade-offs)**：合法 UTF-8 输入也会复制一次到新的 `String`，换取统一的所有权语义。
#[derive(Clone, Copy, Debug)]
pub struct CharsetConverter {
    profile: EncodingProfile,
    decoding: Decoding,
}

impl CharsetConverter {
    /// 以给定配置创建归一化器。
    pub fn new(profile: EncodingProfile) -> Self {
        Self {
            profile,
            decoding: profile.charset.decoding(),
        }
    }

    /// 以默认 `Replace` 策略创建指定字符集的归一化器。
    pub fn for_charset(charset: Charset) -> Self {
        Self::new(EncodingProfile::new(charset))
    }

    /// 当前配置。
    pub fn profile(&self) -> EncodingProfile {
        self.profile
    }

    /// 将原始字节转换为合法文本。
    pub fn convert(&self, raw: &[u8]) -> String {
        self.convert_checked(raw).text
    }

    /// 转换并返回是否发生过修复。
    pub fn convert_checked(&self, raw: &[u8]) -> Conversion {
        let policy = self.profile.on_malformed;
        let conversion = match self.decoding {
            Decoding::Utf8 => decode_utf8(raw, policy),
            Decoding::Ascii => decode_single_byte(raw, policy, |byte| {
                byte.is_ascii().then_some(char::from(byte))
            }),
            Decoding::Latin1 => decode_single_byte(raw, policy, |byte| Some(char::from(byte))),
            Decoding::Whatwg(encoding) => match policy {
                MalformedPolicy::Replace => {
                    let (text, malformed) = encoding.decode_without_bom_handling(raw);
                    Conversion {
                        text: text.into_owned(),
                        malformed,
                    }
                }
                MalformedPolicy::Escape => decode_whatwg_escaped(encoding, raw),
            },
        };

        if conversion.malformed {
            warn!(
                charset = %self.profile.charset,
                policy = ?policy,
                len = raw.len(),
                "received a record that is not valid in the configured charset; malformed sequences were substituted"
            );
        }
        conversion
    }
}

impl Default for CharsetConverter {
    fn default() -> Self {
        Self::new(EncodingProfile::default())
    }
}

fn decode_utf8(raw: &[u8], policy: MalformedPolicy) -> Conversion {
    if let Ok(text) = core::str::from_utf8(raw) {
        return Conversion::clean(text.to_owned());
    }

    let mut text = String::with_capacity(raw.len() + 2);
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
        policy.substitute(chunk.invalid(), &mut text);
    }
    Conversion {
        text,
        malformed: true,
    }
}

fn decode_single_byte(
    raw: &[u8],
    policy: MalformedPolicy,
    map: impl Fn(u8) -> Option<char>,
) -> Conversion {
    let mut text = String::with_capacity(raw.len());
    let mut malformed = false;
    for byte in raw {
        match map(*byte) {
            Some(ch) => text.push(ch),
            None => {
                malformed = true;
                policy.substitute(core::slice::from_ref(byte), &mut text);
            }
        }
    }
    Conversion { text, malformed }
}

/// 逐段驱动 WHATWG 解码器，把每个畸形序列的原始字节转义后写回输出。
fn decode_whatwg_escaped(encoding: &'static Encoding, raw: &[u8]) -> Conversion {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut text = String::new();
    let mut malformed = false;
    let mut consumed = 0;

    loop {
        let remaining = &raw[consumed..];
        let worst_case = decoder
            .max_utf8_buffer_length_without_replacement(remaining.len())
            .unwrap_or_else(|| remaining.len().saturating_mul(3));
        text.reserve(worst_case.max(4));

        let (result, read) = decoder.decode_to_string_without_replacement(remaining, &mut text, true);
        consumed += read;
        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull => continue,
            DecoderResult::Malformed(bad, trailing) => {
                malformed = true;
                let end = consumed.saturating_sub(usize::from(trailing));
                let start = end.saturating_sub(usize::from(bad));
                MalformedPolicy::Escape.substitute(&raw[start..end], &mut text);
            }
        }
    }

    Conversion { text, malformed }
}
