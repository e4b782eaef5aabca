//! Check rule text: one rule per line, blank lines and `#` comments ignored.
//!
//! Usage:
//!   rulecheck [OPTIONS] [FILE ...]
//!   rulecheck < rules.txt
//!
//! Syntax errors are reported as `path:line:col`. Rules naming no builtin rule or format
//! are reported as warnings.
//!
//! Options:
//!   --fix, -f    Rewrite each rule in canonical form (files in place, stdin to stdout).
//!   --human, -H  Human-readable output
//!
//! Set `RUST_LOG=wirerule=debug` to trace registry activity.

use std::io::{self, Read, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use wirerule::{parse, Registry, Rule};

#[derive(Clone, Copy, PartialEq)]
enum Severity {
    Error,
    Warning,
}

struct Message {
    line: usize,
    column: usize,
    severity: Severity,
    text: String,
}

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_message(path: &str, m: &Message, style: OutputStyle) {
    let severity = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    match style {
        OutputStyle::Compact => println!("{}:{}:{}: {}: {}", path, m.line, m.column, severity, m.text),
        OutputStyle::Human => {
            println!("  {} {}:{}: {}", path, m.line, m.column, m.text);
            println!("    severity: {}", severity);
        }
    }
}

fn unknown_names(rule: &Rule, registry: &Registry, out: &mut Vec<String>) {
    if !registry.contains(&rule.name) {
        out.push(rule.name.clone());
    }
    for p in &rule.params {
        if let wirerule::ast::Param::Rule(inner) = p {
            unknown_names(inner, registry, out);
        }
    }
}

/// Check every rule line; returns messages and the canonical rewrite of the source.
fn check_source(src: &str, registry: &Registry) -> (Vec<Message>, String) {
    let mut messages = Vec::new();
    let mut fixed = String::with_capacity(src.len());
    for (i, line) in src.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            fixed.push_str(line);
            fixed.push('\n');
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        match parse(trimmed) {
            Ok(rule) => {
                let mut unknown = Vec::new();
                unknown_names(&rule, registry, &mut unknown);
                for name in unknown {
                    messages.push(Message {
                        line: i + 1,
                        column: indent + 1,
                        severity: Severity::Warning,
                        text: format!("unknown rule @{}", name),
                    });
                }
                fixed.push_str(&rule.render());
            }
            Err(e) => {
                messages.push(Message {
                    line: i + 1,
                    column: indent + e.offset + 1,
                    severity: Severity::Error,
                    text: format!("{} (near `{}`)", e.message, e.fragment),
                });
                fixed.push_str(line);
            }
        }
        fixed.push('\n');
    }
    (messages, fixed)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let fix = if let Some(pos) = args.iter().position(|a| a == "--fix" || a == "-f") {
        args.remove(pos);
        true
    } else {
        false
    };
    let style = if let Some(pos) = args.iter().position(|a| a == "--human" || a == "-H") {
        args.remove(pos);
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };

    let registry = Registry::new();
    let mut total_errors = 0usize;
    let mut total_warnings = 0usize;
    let mut has_error = false;

    let mut report = |path: &str, messages: &[Message]| {
        for m in messages {
            match m.severity {
                Severity::Error => total_errors += 1,
                Severity::Warning => total_warnings += 1,
            }
            print_message(path, m, style);
        }
        messages.iter().any(|m| m.severity == Severity::Error)
    };

    if args.is_empty() {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        let (messages, fixed) = check_source(&src, &registry);
        if fix {
            io::stdout().write_all(fixed.as_bytes())?;
        }
        has_error |= report("<stdin>", &messages);
    } else {
        for path in &args {
            let path = Path::new(path);
            let src = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    has_error = true;
                    continue;
                }
            };
            let (messages, fixed) = check_source(&src, &registry);
            if fix && fixed != src {
                if let Err(e) = std::fs::write(path, &fixed) {
                    eprintln!("{}: write failed: {}", path.display(), e);
                    has_error = true;
                    continue;
                }
                eprintln!("{}: fixed", path.display());
            }
            has_error |= report(&path.display().to_string(), &messages);
        }
    }

    if total_errors > 0 || total_warnings > 0 {
        eprintln!("rulecheck: {} error(s), {} warning(s)", total_errors, total_warnings);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
