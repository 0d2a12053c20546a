// Fail: closure parameters must be plain names
use expr_sql::{Expr, predicate};

fn main() {
    let _: Expr = predicate!(|(a, b)| a.id == b.id);
}
