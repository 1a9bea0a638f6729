use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use mucgly::parse::{ParseState, Parser};
use mucgly::script::{ScriptError, ScriptHost};
use mucgly_common::InMemoryFileSystem;
use std::path::Path;
use std::rc::Rc;

struct NullHost;

impl ScriptHost for NullHost {
    fn eval(&mut self, _: &str, _: &mut ParseState) -> Result<String, ScriptError> {
        Ok(String::new())
    }
    fn run(&mut self, _: &str, _: &mut ParseState) -> Result<(), ScriptError> {
        Ok(())
    }
    fn load(&mut self, _: &str, _: &mut ParseState) -> Result<(), ScriptError> {
        Ok(())
    }
}

fn benchmark(c: &mut Criterion) {
    let input = "plain text with no hooks at all, mostly copied through\n-<.0>-\n"
        .repeat(2_000);
    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("stream", |b| {
        b.iter(|| {
            let mut fs = InMemoryFileSystem::new();
            fs.add_file("in.txt", input.as_str());
            let fs = Rc::new(fs);
            let ps = ParseState::new(Box::new(Rc::clone(&fs)), Some(Path::new("out"))).unwrap();
            let mut parser = Parser::new(ps, NullHost);
            parser
                .process_file(Some(Path::new("in.txt")), None)
                .unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
