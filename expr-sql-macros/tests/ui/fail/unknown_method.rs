// Fail: a misspelled method is rejected with a suggestion
use expr_sql::{Expr, predicate};

fn main() {
    let _: Expr = predicate!(|x| x.path.start_with("-1"));
}
