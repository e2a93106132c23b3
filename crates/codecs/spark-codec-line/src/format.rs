//! 编码侧格式模板：`%{field}` 占位符替换。
//!
//! # 契约说明（What）
//! - 模板由字面量与 `%{reference}` 占位符交替组成，构造时一次性解析，解析永不失败；
//! - 未闭合的 `%{` 视为普通字面量；
//! - 渲染时占位符内的引用原文交给 [`Record::field`]，取不到值的占位符原样保留。

use core::fmt;

use crate::record::Record;

const OPEN: &str = "%{";
const CLOSE: char = '}';

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// 预解析的格式模板。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FormatTemplate {
    /// 解析模板文本。
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let Some(end) = after.find(CLOSE) else {
                break;
            };
            literal.push_str(&rest[..start]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(core::mem::take(&mut literal)));
            }
            segments.push(Segment::Field(after[..end].to_owned()));
            rest = &after[end + CLOSE.len_utf8()..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: template.to_owned(),
            segments,
        }
    }

    /// 模板原文。
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 模板中的字段引用，按出现顺序排列。
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(reference) => Some(reference.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// 用记录字段渲染模板。
    pub fn render<R: Record + ?Sized>(&self, record: &R) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(reference) => match record.field(reference) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str(OPEN);
                        out.push_str(reference);
                        out.push(CLOSE);
                    }
                },
            }
        }
        out
    }
}

impl fmt::Display for FormatTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    struct Host;

    impl fmt::Display for Host {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("host=test")
        }
    }

    impl Record for Host {
        fn field(&self, reference: &str) -> Option<Cow<'_, str>> {
            match reference {
                "host" => Some(Cow::Borrowed("test")),
                "[agent][id]" => Some(Cow::Owned(42.to_string())),
                _ => None,
            }
        }
    }

    #[test]
    fn placeholders_are_resolved_from_record() {
        let template = FormatTemplate::parse("%{host} (%{[agent][id]})");
        assert_eq!(template.fields().collect::<Vec<_>>(), vec!["host", "[agent][id]"]);
        assert_eq!(template.render(&Host), "test (42)");
    }

    #[test]
    fn missing_fields_keep_placeholder_text() {
        let template = FormatTemplate::parse("%{host}:%{port}");
        assert_eq!(template.render(&Host), "test:%{port}");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let template = FormatTemplate::parse("a %{host} b %{oops");
        assert_eq!(template.fields().count(), 1);
        assert_eq!(template.render(&Host), "a test b %{oops");
    }

    #[test]
    fn template_without_placeholders_is_verbatim() {
        let template = FormatTemplate::parse("static line");
        assert_eq!(template.render(&Host), "static line");
        assert_eq!(template.to_string(), "static line");
        assert_eq!(FormatTemplate::parse("").render(&Host), "");
    }
}
