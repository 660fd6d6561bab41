#[test]
fn compile_tests() {
    let t = trybuild::TestCases::new();
    t.pass("tests/pass/basic.rs");
    t.pass("tests/pass/custom_name.rs");
    t.pass("tests/pass/ranked.rs");
    t.compile_fail("tests/fail/*.rs");
}
