//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Library and binary code MUST NOT block a runtime thread.
//! **Required**: `tokio::net` sockets, `tokio::time::sleep`, `tokio::io::stdin`.
//!
//! Blocking calls are acceptable in test code and in non-async functions
//! that run before or outside the runtime (config loading, CLI parsing).

use architectural_enforcement::{scan_dirs, workspace_root, Rule};

const PRODUCTION_DIRS: [&str; 2] = ["duet/core/src", "duet/daemon/src"];

fn report(title: &str, rule_filter: impl Fn(Rule) -> bool, help: &[&str]) {
    let violations: Vec<_> = scan_dirs(&workspace_root(), &PRODUCTION_DIRS)
        .into_iter()
        .filter(|v| rule_filter(v.rule))
        .collect();

    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ CRITICAL: {title}\n");
    for violation in &violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in help {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[test]
fn test_production_sources_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_DIRS {
        assert!(root.join(dir).exists(), "missing source dir {dir}");
    }
}

#[test]
fn test_no_blocking_sockets() {
    report(
        "Blocking sockets found in production code!",
        |rule| rule == Rule::BlockingSocket,
        &[
            "❌ FORBIDDEN: std::net::TcpStream, std::net::TcpListener, std::net::UdpSocket",
            "✅ REQUIRED:  tokio::net::TcpStream::connect().await, tokio::net::TcpListener::bind().await",
            "✅ FINE:      std::net::{IpAddr, SocketAddr} (plain address types)",
        ],
    );
}

#[test]
fn test_no_thread_sleep() {
    report(
        "std::thread::sleep found in production code!",
        |rule| rule == Rule::ThreadSleep,
        &["✅ REQUIRED: tokio::time::sleep().await or tokio::time::timeout()"],
    );
}

#[test]
fn test_no_blocking_io_in_async() {
    report(
        "Blocking I/O inside async functions!",
        |rule| matches!(rule, Rule::BlockingFsInAsync | Rule::BlockingStdioInAsync),
        &[
            "❌ FORBIDDEN in async fn: std::fs::*, std::io::stdin(), std::io::stdout()",
            "✅ REQUIRED: tokio::fs, tokio::io::stdin()",
            "✅ ACCEPTABLE: blocking calls in non-async functions and test code",
        ],
    );
}
