use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dbq::{Condition, Dialect, Query, SqlBuf, Value, Where};

/// SELECT col0, col1, ... FROM t WHERE col0 = 'v0' AND col1 = 'v1' ...
fn build_select(dialect: Dialect, n: usize) -> Query {
    let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    let mut filter = Where::new();
    for i in 0..n {
        filter = filter.field(format!("col{i}"), format!("v{i}"));
    }
    Query::new(dialect, "t")
        .and_then(|q| q.select(columns))
        .and_then(|q| q.filter(filter))
        .expect("valid benchmark query")
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/render");

    for dialect in [Dialect::MySql, Dialect::Postgres] {
        for n in [1, 10, 50] {
            let q = build_select(dialect, n);
            group.bench_with_input(
                BenchmarkId::new(format!("{dialect:?}"), n),
                &q,
                |b, q| b.iter(|| black_box(q.build())),
            );
        }
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/build_and_render");

    for n in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_select(Dialect::Postgres, n).build()));
        });
    }

    group.finish();
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/in_list");

    for n in [5, 100, 1_000] {
        let ids: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter(|| {
                let cond = Condition::eq("id", ids.clone());
                black_box(cond.build(Dialect::MySql, false))
            });
        });
    }

    group.finish();
}

fn bench_multi_row_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/multi_row_values");

    for rows in [10, 1_000] {
        let data: Vec<Vec<Value>> = (0..rows)
            .map(|i| vec![Value::Int(i), Value::from(format!("name{i}"))])
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| {
                let mut sql = SqlBuf::new("INSERT INTO t (id,name) VALUES ");
                for (i, row) in data.iter().enumerate() {
                    if i > 0 {
                        sql.push(",");
                    }
                    sql.push("(");
                    sql.push_value_list(row, false);
                    sql.push(")");
                }
                black_box(sql.build(Dialect::Postgres))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_render,
    bench_build_and_render,
    bench_in_list,
    bench_multi_row_values
);
criterion_main!(benches);
