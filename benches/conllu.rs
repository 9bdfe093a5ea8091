use deptree::conllu::{CoNLLUReader, ReaderOptions};
use deptree::writer::{WriterOptions, document_to_string};
use divan::{Bencher, black_box};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    divan::main();
}

/// A synthetic corpus: `sentences` right-branching sentences of 12 words
fn corpus(sentences: usize) -> String {
    let mut text = String::new();
    for s in 1..=sentences {
        text.push_str(&format!("# sent_id = s{}\n# text = synthetic sentence {}\n", s, s));
        for w in 1..=12 {
            let head = if w == 1 { 0 } else { w - 1 };
            text.push_str(&format!(
                "{}\tword{}\tlemma{}\tNOUN\tNN\tNumber=Sing\t{}\tdep\t_\t_\n",
                w, w, w, head
            ));
        }
        text.push('\n');
    }
    text
}

fn read_all(text: &str, parallel: bool) -> usize {
    let options = ReaderOptions {
        parallel,
        ..ReaderOptions::default()
    };
    CoNLLUReader::from_str(text)
        .with_options(options)
        .map(|doc| doc.map(|d| d.len()).unwrap_or(0))
        .sum()
}

#[divan::bench(args = [false, true])]
fn read(bencher: Bencher, parallel: bool) {
    let text = corpus(5_000);
    bencher.bench_local(|| black_box(read_all(black_box(&text), parallel)));
}

#[divan::bench]
fn write(bencher: Bencher) {
    let text = corpus(5_000);
    let document = CoNLLUReader::from_str(&text)
        .next()
        .and_then(Result::ok)
        .unwrap_or_default();
    bencher.bench_local(|| black_box(document_to_string(&document, WriterOptions::default())));
}
