//! Compile tests for `predicate!` expansions and its error messages.
//!
//! Each file under `tests/ui/pass` must build and run; each file under
//! `tests/ui/fail` must fail with the diagnostic in its `.stderr`. Run with
//! `cargo test --test ui`.
//!
//! To update expected output after intentional changes:
//! ```
//! TRYBUILD=overwrite cargo test --test ui
//! ```

#[test]
fn ui() {
    let t = trybuild::TestCases::new();

    t.pass("tests/ui/pass/*.rs");

    // Rejected syntax
    t.compile_fail("tests/ui/fail/*.rs");
}
