use criterion::{black_box, criterion_group, criterion_main, Criterion};
use patchlang::runtime::ObjectRef;
use patchlang::{lex, parse_source, Context, Libraries, Value};

const SOURCE: &str = r#"
    @version 1;
    import "strings";

    function label($item) {
        return strings.upper($item.name) + "-" + strings.repeat("*", $item.id % 3);
    }

    var $total = 0;
    foreach ($item in items) {
        $item.label = label($item);
        $total += $item.id;
    }
    summary = {count: items.length(), total: $total};
    items = items.filter(function ($item) -> $item.id % 2 == 0);
"#;

fn document() -> ObjectRef {
    let items: Vec<Value> = (0..100)
        .map(|id| {
            let item = Value::new_object();
            item.borrow_mut().insert("id".to_string(), Value::Number(id as f64));
            item.borrow_mut()
                .insert("name".to_string(), Value::string(format!("item{}", id)));
            Value::Object(item)
        })
        .collect();
    let root = Value::new_object();
    root.borrow_mut().insert("items".to_string(), Value::array(items));
    root
}

fn lexer_benchmark(c: &mut Criterion) {
    c.bench_function("lex patch", |b| {
        b.iter(|| lex(black_box(SOURCE), "bench.patch").unwrap())
    });
}

fn parser_benchmark(c: &mut Criterion) {
    c.bench_function("parse patch", |b| {
        b.iter(|| parse_source(black_box(SOURCE), "bench.patch").unwrap())
    });
}

fn evaluator_benchmark(c: &mut Criterion) {
    let program = parse_source(SOURCE, "bench.patch").unwrap();
    c.bench_function("apply patch to 100 items", |b| {
        b.iter(|| {
            let ctx = Context::new(document(), Libraries::standard());
            program.execute(black_box(&ctx)).unwrap()
        })
    });
}

criterion_group!(benches, lexer_benchmark, parser_benchmark, evaluator_benchmark);
criterion_main!(benches);
