#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spark_codec_line::{BufferedTokenizer, Delimiter};

/// Fuzz 用例：一段字节流、若干切点与一个分隔符。
///
/// - **Why**：分帧结果只能取决于字节流本身，任何切分方式都必须得到同一条记录序列；
/// - **How**：先整段喂入作为基准，再按 `cuts` 把同一字节流切成多块逐块喂入，差分比较两次结果；
/// - **What**：分隔符为空时直接跳过，该配置在构造期即被拒绝。
#[derive(Debug, Arbitrary)]
struct SplitCase {
    delimiter: Vec<u8>,
    stream: Vec<u8>,
    cuts: Vec<u16>,
}

/// 返回以分隔符结尾的记录与 flush 取回的尾部。
fn run(delimiter: &Delimiter, chunks: &[&[u8]]) -> (Vec<Vec<u8>>, Option<Vec<u8>>) {
    let mut tokenizer = BufferedTokenizer::new(delimiter.clone());
    let mut records = Vec::new();
    for chunk in chunks {
        records.extend(tokenizer.feed(chunk).into_iter().map(|record| record.to_vec()));
    }
    let tail = tokenizer.flush().map(|record| record.to_vec());
    assert!(tokenizer.is_empty(), "flush 之后缓冲必须为空");
    assert_eq!(tokenizer.flush(), None);
    (records, tail)
}

fuzz_target!(|case: SplitCase| {
    let Ok(delimiter) = Delimiter::new(&case.delimiter) else {
        return;
    };

    let mut cuts: Vec<usize> = case
        .cuts
        .iter()
        .map(|cut| usize::from(*cut) % (case.stream.len() + 1))
        .collect();
    cuts.sort_unstable();

    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        chunks.push(&case.stream[start..cut]);
        start = cut;
    }
    chunks.push(&case.stream[start..]);

    let whole = run(&delimiter, &[case.stream.as_slice()]);
    let pieces = run(&delimiter, &chunks);
    assert_eq!(whole, pieces);

    // 每条记录补回分隔符，再接上尾部，必须逐字节还原输入。
    let (records, tail) = whole;
    let mut rebuilt = Vec::with_capacity(case.stream.len());
    for record in &records {
        rebuilt.extend_from_slice(record);
        rebuilt.extend_from_slice(delimiter.as_bytes());
    }
    if let Some(tail) = tail {
        assert!(!tail.is_empty(), "flush 不应返回空尾部");
        rebuilt.extend_from_slice(&tail);
    }
    assert_eq!(rebuilt, case.stream);
});
