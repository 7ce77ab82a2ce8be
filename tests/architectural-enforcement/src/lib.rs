//! Architectural Enforcement
//!
//! Source scanners backing the integration tests in `tests/`:
//! - No blocking sockets (`std::net::TcpStream` and friends) in library or binary code
//! - No `std::thread::sleep` outside tests
//! - No blocking stdin/stdout or `std::fs` inside `async fn`
//!
//! The scanners are line-based on purpose: they have to stay cheap and
//! dependency-free, and a false positive is fixed by moving code, not by
//! teaching the scanner Rust.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// What a violation broke
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Blocking socket type from `std::net`
    BlockingSocket,
    /// Thread sleep in production code
    ThreadSleep,
    /// Blocking file I/O inside an async function
    BlockingFsInAsync,
    /// Blocking stdin/stdout inside an async function
    BlockingStdioInAsync,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockingSocket => write!(f, "Blocking network I/O"),
            Self::ThreadSleep => write!(f, "Thread sleep"),
            Self::BlockingFsInAsync => write!(f, "Blocking file I/O in async"),
            Self::BlockingStdioInAsync => write!(f, "Blocking stdin/stdout in async"),
        }
    }
}

/// One offending line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File the line is in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Rule broken
    pub rule: Rule,
    /// Trimmed source line
    pub source: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.source
        )
    }
}

const BLOCKING_SOCKETS: [&str; 3] = ["TcpStream", "TcpListener", "UdpSocket"];

/// Workspace root, two levels above this crate
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Scan every `.rs` file under `dirs` (relative to `root`)
#[must_use]
pub fn scan_dirs(root: &Path, dirs: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for dir in dirs {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                if let Ok(content) = fs::read_to_string(entry.path()) {
                    violations.extend(scan_source(entry.path(), &content));
                }
            }
        }
    }
    violations
}

/// Scan one file's contents
#[must_use]
pub fn scan_source(path: &Path, content: &str) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let tests_start = test_module_start(&lines).unwrap_or(lines.len());
    let mut violations = Vec::new();

    for (idx, line) in lines.iter().enumerate().take(tests_start) {
        // Skip comments
        let code = line.split("//").next().unwrap_or(line);
        if code.trim().is_empty() || is_in_test_function(&lines, idx) {
            continue;
        }

        let mut flag = |rule| {
            violations.push(Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                rule,
                source: line.trim().to_string(),
            });
        };

        if uses_blocking_socket(code) {
            flag(Rule::BlockingSocket);
        }
        if code.contains("std::thread::sleep") || code.contains("thread::sleep(") {
            flag(Rule::ThreadSleep);
        }
        if is_in_async_function(&lines, idx) {
            if code.contains("std::fs::") {
                flag(Rule::BlockingFsInAsync);
            }
            if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
                flag(Rule::BlockingStdioInAsync);
            }
        }
    }

    violations
}

fn uses_blocking_socket(code: &str) -> bool {
    if BLOCKING_SOCKETS
        .iter()
        .any(|ty| code.contains(&format!("std::net::{ty}")))
    {
        return true;
    }
    // `use std::net::{IpAddr, TcpStream}` style imports
    code.trim_start().starts_with("use std::net")
        && BLOCKING_SOCKETS.iter().any(|ty| code.contains(ty))
}

/// Index of the first line of a `#[cfg(test)] mod` block
fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines.iter().enumerate().find_map(|(i, line)| {
        if line.trim() != "#[cfg(test)]" {
            return None;
        }
        let next = lines[i + 1..].iter().find(|l| !l.trim().is_empty())?;
        let next = next.trim();
        (next.starts_with("mod ") || next.starts_with("pub(crate) mod ")).then_some(i)
    })
}

/// Check if line is inside a function marked as a test
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    let mut found_fn_idx = None;
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("fn ") || line.contains(" fn ") {
            found_fn_idx = Some(i);
            break;
        }

        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }

    let Some(fn_idx) = found_fn_idx else {
        return false;
    };
    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("#[test]")
            || line.starts_with("#[tokio::test")
            || line.starts_with("#[cfg(test)]")
        {
            return true;
        }

        // Attributes and doc comments belong to this fn; anything else ends it
        if !(line.starts_with("#[") || line.starts_with("///") || line.is_empty()) {
            break;
        }
    }
    false
}

/// Check if line is inside an async function
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..=current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return true;
        }

        if (line.starts_with("fn ") || line.contains(" fn ")) && !line.contains("async") {
            return false;
        }

        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(code: &str) -> Vec<Rule> {
        scan_source(Path::new("sample.rs"), code)
            .into_iter()
            .map(|v| v.rule)
            .collect()
    }

    #[test]
    fn test_address_types_are_allowed() {
        assert!(scan("use std::net::{IpAddr, SocketAddr};\n").is_empty());
        assert!(scan("use tokio::net::TcpStream;\n").is_empty());
    }

    #[test]
    fn test_blocking_socket_detection() {
        assert_eq!(
            scan("use std::net::{SocketAddr, TcpListener};\n"),
            vec![Rule::BlockingSocket]
        );
        assert_eq!(
            scan("fn dial() {\n    let s = std::net::TcpStream::connect(addr);\n}\n"),
            vec![Rule::BlockingSocket]
        );
    }

    #[test]
    fn test_sleep_detection() {
        let code = "async fn wait() {\n    std::thread::sleep(d);\n}\n";
        assert_eq!(scan(code), vec![Rule::ThreadSleep]);
    }

    #[test]
    fn test_fs_only_flagged_in_async() {
        let sync = "fn load() {\n    let s = std::fs::read_to_string(p);\n}\n";
        assert!(scan(sync).is_empty());

        let async_code = "pub async fn load() {\n    let s = std::fs::read_to_string(p);\n}\n";
        assert_eq!(scan(async_code), vec![Rule::BlockingFsInAsync]);
    }

    #[test]
    fn test_test_code_is_exempt() {
        let code = "\
fn real() {}

#[cfg(test)]
mod tests {
    fn helper() {
        std::thread::sleep(d);
    }
}
";
        assert!(scan(code).is_empty());

        let attributed = "#[tokio::test]\nasync fn test_x() {\n    std::thread::sleep(d);\n}\n";
        assert!(scan(attributed).is_empty());
    }

    #[test]
    fn test_comments_are_ignored() {
        assert!(scan("fn f() {\n    // std::thread::sleep(d);\n}\n").is_empty());
    }

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));

        let code = vec!["fn main() {", "    let x = 1;", "}"];
        assert!(!is_in_async_function(&code, 1));
    }
}
