//! Integration Test: Core Principles
//!
//! The core crate owns the terminal through exactly one writer, keeps no
//! ambient global state, never sleeps and never takes panicking shortcuts
//! outside of tests.
//!
//! **Exceptions**: test modules (`#[cfg(test)]`), the demo binary.

use architectural_enforcement::{assert_clean, find_violations, production_lines, rust_sources};

const CORE_SRC: &str = "logdeck/core/src";

#[test]
fn test_core_sources_found() {
    assert!(
        !rust_sources(CORE_SRC).is_empty(),
        "no Rust sources found under {CORE_SRC}"
    );
}

#[test]
fn test_no_direct_printing() {
    let violations = find_violations(
        CORE_SRC,
        &["println!", "print!(", "eprintln!", "eprint!(", "dbg!("],
    );
    assert_clean(
        "Only the render server writes to the terminal (use tracing for diagnostics)",
        &violations,
    );
}

#[test]
fn test_no_global_state() {
    let violations = find_violations(
        CORE_SRC,
        &["static mut", "lazy_static!", "OnceLock", "OnceCell", "thread_local!"],
    );
    assert_clean(
        "Renderer state is owned by one explicitly constructed instance",
        &violations,
    );
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_violations(CORE_SRC, &["::sleep(", ".sleep("]);
    assert_clean(
        "No sleep: the render loop waits on the command channel only",
        &violations,
    );
}

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = find_violations(CORE_SRC, &[".unwrap()", ".expect("]);
    assert_clean(
        "Production code propagates errors instead of unwrapping",
        &violations,
    );
}

#[test]
fn test_only_render_module_touches_crossterm() {
    let mut violations = Vec::new();
    for path in rust_sources(CORE_SRC) {
        if path.ends_with("render.rs") {
            continue;
        }
        for (line, code) in production_lines(&path) {
            if code.contains("crossterm") {
                violations.push(architectural_enforcement::Violation {
                    path: path.clone(),
                    line,
                    code: code.trim().to_string(),
                });
            }
        }
    }
    assert_clean("Terminal escape sequences live in render.rs", &violations);
}
