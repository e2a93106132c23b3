//! 外部协作者契约：记录构造（解码侧）与记录取值（编码侧）。
//!
//! 编解码器只产出纯文本、只消费可格式化的记录，事件对象如何构造、字段如何命名属于上层流水线的策略，
//! 这里通过两个窄 trait 注入。

use std::borrow::Cow;
use core::fmt;

/// 解码得到的文本写入的字段名。
pub const MESSAGE_FIELD: &str = "message";

/// 记录构造能力：把 `(字段名, 文本)` 转换为调用方自己的事件表示。
///
/// 任意 `Fn(&str, String) -> E` 闭包都自动实现该 trait。
pub trait EventFactory {
    /// 调用方的事件类型。
    type Event;

    /// 以单个字段构造一条事件。
    fn new_event(&self, field: &str, value: String) -> Self::Event;
}

impl<E, F> EventFactory for F
where
    F: Fn(&str, String) -> E,
{
    type Event = E;

    fn new_event(&self, field: &str, value: String) -> E {
        self(field, value)
    }
}

/// 编码侧的记录视图。
///
/// # 教案式说明
/// - **意图 (Why)**：编码器只需要两种能力：未配置模板时的默认字符串化，以及模板占位符的字段取值；
/// - **契约 (What)**：
///   - `Display` 输出即默认字符串化结果；
///   - `field` 接收占位符 `%{...}` 内的原文引用（例如 `host`、`[nested][field]`），
///     找不到时返回 `None`，模板会原样保留占位符；
/// - **设计权衡 (Trade-offs)**：返回 `Cow` 允许实现方零拷贝借出已有字符串，也允许即时格式化数值等字段。
pub trait Record: fmt::Display {
    /// 按引用读取字段文本。
    fn field(&self, reference: &str) -> Option<Cow<'_, str>>;
}

impl Record for str {
    /// 纯文本记录只暴露 [`MESSAGE_FIELD`]，其值为文本本身。
    fn field(&self, reference: &str) -> Option<Cow<'_, str>> {
        (reference == MESSAGE_FIELD).then_some(Cow::Borrowed(self))
    }
}

impl Record for String {
    fn field(&self, reference: &str) -> Option<Cow<'_, str>> {
        self.as_str().field(reference)
    }
}
