// Pass: several row parameters, casts and coalescing
use expr_sql::{Expr, predicate};

fn main() {
    let _: Expr = predicate!(|n, d: &()| n.id == d.node_id && (n.level as i64) > 1);
    let _: Expr = predicate!(|n| n.parent_id.unwrap_or(-1) == -1);
}
