// Pass: string searches, membership and marker calls
use expr_sql::{Expr, TextColumnType, predicate};

fn main() {
    let ids = vec![1, 2, 3];
    let _: Expr = predicate!(|x| x.path.starts_with("-1,"));
    let _: Expr = predicate!(|x| x.alias.sql_contains("news", TextColumnType::NText));
    let _: Expr = predicate!(|x| ids.contains(&x.id));
    let _: Expr = predicate!(|x| sql_in(ids, x.id) && x.id == sql_arg("id"));
}
