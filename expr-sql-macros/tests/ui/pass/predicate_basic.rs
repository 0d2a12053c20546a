// Pass: comparisons, booleans and captured variables
use expr_sql::{Expr, predicate};

fn main() {
    let min = 2;
    let name = String::from("Home");
    let _: Expr = predicate!(|x| x.level >= min && !x.trashed);
    let _: Expr = predicate!(|x| x.name == name || x.parent_id == None);
}
