//! Frontend throughput benchmarks.
//!
//! Measures the lexer alone, lexer + parser, and the full pipeline over a
//! synthetic batch of DDL and DML statements.
//!
//! ```sh
//! cargo bench --bench scan_parse
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sqlint::{compile, parse, scan};

fn statement_batch() -> String {
    let mut sql = String::from(
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(64) NOT NULL, \
         age INT, balance FLOAT, active BOOLEAN);\n\
         CREATE TABLE orders (id INT PRIMARY KEY, user_id INT, total FLOAT);\n",
    );
    for i in 0..200 {
        sql.push_str(&format!(
            "INSERT INTO users (id, name, age, balance, active) \
             VALUES ({}, 'user {}', {}, {}.5, TRUE);\n",
            i,
            i,
            20 + i % 50,
            i * 10
        ));
        sql.push_str(&format!(
            "SELECT u.name, COUNT(*), SUM(o.total) FROM users u \
             JOIN orders o ON o.user_id = u.id \
             WHERE u.age BETWEEN {} AND {} AND u.active \
             GROUP BY u.name HAVING COUNT(*) > 1 ORDER BY u.name LIMIT 10;\n",
            i % 30,
            40 + i % 30
        ));
    }
    sql
}

fn frontend_benches(c: &mut Criterion) {
    let sql = statement_batch();
    let mut group = c.benchmark_group("frontend");
    group.throughput(Throughput::Bytes(sql.len() as u64));

    group.bench_function("scan", |b| b.iter(|| scan(black_box(&sql))));

    group.bench_function("scan_parse", |b| {
        b.iter(|| {
            let (tokens, _) = scan(black_box(&sql));
            parse(&tokens)
        })
    });

    group.bench_function("compile", |b| b.iter(|| compile(black_box(&sql))));

    group.finish();
}

criterion_group!(benches, frontend_benches);
criterion_main!(benches);
