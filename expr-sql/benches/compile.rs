//! Fresh compilation against cached replay of the same clause.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use expr_sql::{CachedExpression, Compiler, Expr, FieldMap, Query, SqlContext, Sqlite};

fn fields() -> FieldMap {
    FieldMap::new()
        .with("Document", "level", "\"doc\".\"level\"")
        .with("Document", "path", "\"doc\".\"path\"")
        .with("Document", "published", "\"doc\".\"published\"")
        .with("Document", "id", "\"doc\".\"id\"")
}

/// `x.level >= min && x.path.starts_with(prefix) && !x.published && ids.contains(x.id)`
fn clause(min: i64, prefix: &str) -> Expr {
    let x = Expr::param("x");
    Expr::lambda(
        ["x"],
        x.clone()
            .field("level")
            .ge(Expr::captured("min", min))
            .and(x.clone().field("path").invoke("starts_with", [Expr::captured("prefix", prefix)]))
            .and(!x.clone().field("published"))
            .and(Expr::captured("ids", vec![1, 2, 3, 4]).invoke("contains", [x.field("id")])),
    )
}

fn bench_compile(c: &mut Criterion) {
    let ctx = SqlContext::new(Sqlite);
    let f = fields();
    let tree = clause(2, "-1,");

    c.bench_function("compile", |b| {
        b.iter(|| {
            let mut compiler = Compiler::for_model(&ctx, "Document", &f);
            black_box(compiler.compile(black_box(&tree)).ok());
            black_box(compiler.into_parameters());
        });
    });

    let mut cell = CachedExpression::new();
    cell.wrap(tree.clone());
    if let Ok(sql) = Compiler::for_model(&ctx, "Document", &f).compile_cached(&mut cell) {
        black_box(sql);
    }
    c.bench_function("compile_cached_replay", |b| {
        b.iter(|| {
            let mut compiler = Compiler::for_model(&ctx, "Document", &f);
            black_box(compiler.compile_cached(&mut cell).ok());
            black_box(compiler.into_parameters());
        });
    });

    c.bench_function("build_where", |b| {
        b.iter(|| {
            let query = Query::for_model(&ctx, "Document", &f)
                .filter(black_box(&tree))
                .and_then(|q| q.filter(&clause(3, "-1,20")));
            black_box(query.map(Query::build).ok());
        });
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
