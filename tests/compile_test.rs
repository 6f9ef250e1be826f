mod common;

use c0_rust::model::MAGIC;
use c0_rust::processor::error::{AnalysisErrorKind, CompileError};
use c0_rust::writer::bin;
use common::{compile, execute};

#[test]
fn prints_constant_global() {
    let out = execute("const a: int = 1; fn main() -> void { putint(a); }", "");
    assert_eq!(out, "1");
}

#[test]
fn break_leaves_loop_after_one_iteration() {
    let source = r#"
        fn main() -> void {
            let i: int = 0;
            while i < 10 {
                i = i + 1;
                break;
            }
            putint(i);
        }
    "#;
    assert_eq!(execute(source, ""), "1");
}

#[test]
fn continue_skips_rest_of_body() {
    let source = r#"
        fn main() -> void {
            let i: int = 0;
            let odd: int = 0;
            while i < 10 {
                i = i + 1;
                if i / 2 * 2 == i { continue; }
                odd = odd + 1;
            }
            putint(odd);
        }
    "#;
    assert_eq!(execute(source, ""), "5");
}

#[test]
fn else_if_chain() {
    let source = r#"
        fn sign(x: int) -> int {
            if x < 0 { return -1; }
            else if x == 0 { return 0; }
            else { return 1; }
        }
        fn main() -> void {
            putint(sign(-7)); putchar(' ');
            putint(sign(0)); putchar(' ');
            putint(sign(42));
        }
    "#;
    assert_eq!(execute(source, ""), "-1 0 1");
}

#[test]
fn recursion_and_input() {
    let source = r#"
        // factorial of the number read from stdin
        fn fact(n: int) -> int {
            if n <= 1 { return 1; }
            return n * fact(n - 1);
        }
        fn main() -> void {
            putint(fact(getint()));
            putln();
        }
    "#;
    assert_eq!(execute(source, "10"), "3628800\n");
}

#[test]
fn globals_are_initialized_before_main() {
    let source = r#"
        fn twice(x: int) -> int { return x + x; }
        let g: int = twice(21);
        let zero: int;
        fn main() -> int {
            putint(g);
            putint(zero);
            return 0;
        }
    "#;
    assert_eq!(execute(source, ""), "420");
}

#[test]
fn doubles_and_casts() {
    let source = r#"
        fn main() -> void {
            let half: double = 1 as double / 2.0;
            putint((half * 10.0) as int);
            if half >= 0.5 { putstr(" yes"); }
        }
    "#;
    assert_eq!(execute(source, ""), "5 yes");
}

#[test]
fn shadowed_variables() {
    let source = r#"
        let x: int = 1;
        fn main() -> void {
            putint(x);
            let x: int = 2;
            {
                let x: int = 3;
                putint(x);
            }
            putint(x);
        }
    "#;
    assert_eq!(execute(source, ""), "132");
}

#[test]
fn string_literals_get_one_global_each() {
    let once = bin::decode(&compile("fn main() -> void { putstr(\"hi\"); }")).unwrap();
    let twice = bin::decode(&compile("fn main() -> void { putstr(\"hi\"); putstr(\"hi\"); }")).unwrap();
    assert_eq!(twice.globals.len(), once.globals.len() + 1);
}

#[test]
fn decode_reproduces_the_bytes() {
    let source = r#"
        const pi: double = 3.14;
        fn area(r: double) -> double { return pi * r * r; }
        fn main() -> void {
            let i: int = 0;
            while i < 3 { putdouble(area(i as double)); putln(); i = i + 1; }
        }
    "#;
    let bytes = compile(source);
    assert_eq!(bytes[..4], MAGIC.to_be_bytes());

    let module = bin::decode(&bytes).unwrap();
    assert_eq!(module.functions.len(), 3);
    // Float pushes decode as raw bits, which encode back to the same bytes.
    assert_eq!(bin::encode(&module), bytes);
}

#[test]
fn global_tags_follow_declaration_order() {
    let bytes = compile("let g: int; let h: int; fn main() -> void {}");
    // _start (6 bytes), g and h (8 bytes each), main (4 bytes)
    let tags = [bytes[12], bytes[23], bytes[36], bytes[49]];
    assert_eq!(tags, [0, 1, 2, 3]);
    assert_eq!(bytes[54..58], *b"main");
}

#[test]
fn errors_stop_compilation() {
    let err = c0_rust::processor::run("fn main() -> void { let x: double = 1 + 1.0; }").unwrap_err();
    let compile_err = err.downcast_ref::<CompileError>().expect("compile error");
    match compile_err {
        CompileError::Analysis(err) => assert!(matches!(err.kind, AnalysisErrorKind::TypeMismatch { .. })),
        other => panic!("unexpected {other:?}"),
    }
}
