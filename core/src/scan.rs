//! file: core/src/scan.rs
//! description: verbatim task-source extraction.
//!
//! Recovers the literal text of every task definition from a raw document.
//! The result is attached to applets for provenance and diagnostics; no
//! lowering decision depends on it.
//!
use std::collections::HashMap;

/// Map each task name to the verbatim text of its definition, from the
/// `task` keyword through the matching closing brace. Brace counting skips
/// heredoc command bodies so shell text cannot unbalance the scan.
pub fn extract_task_sources(text: &str) -> HashMap<String, String> {
    let mut sources = HashMap::new();

    let mut current: Option<(String, Vec<&str>)> = None;
    let mut depth: i32 = 0;
    let mut opened = false;
    let mut in_heredoc = false;

    for line in text.lines() {
        if current.is_none() {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("task") {
                if rest.starts_with(char::is_whitespace) {
                    if let Some(name) = rest.split_whitespace().next() {
                        let name = name.trim_end_matches('{').to_string();
                        if !name.is_empty() {
                            current = Some((name, Vec::new()));
                            depth = 0;
                            opened = false;
                            in_heredoc = false;
                        }
                    }
                }
            }
        }

        let mut finished = false;
        if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
            let mut rest = line;
            loop {
                if in_heredoc {
                    match rest.find(">>>") {
                        Some(idx) => {
                            in_heredoc = false;
                            rest = &rest[idx + 3..];
                        }
                        None => break,
                    }
                } else {
                    let heredoc_at = rest.find("<<<");
                    let segment = match heredoc_at {
                        Some(idx) => &rest[..idx],
                        None => rest,
                    };
                    for c in segment.chars() {
                        match c {
                            '{' => {
                                depth += 1;
                                opened = true;
                            }
                            '}' => depth -= 1,
                            _ => {}
                        }
                    }
                    match heredoc_at {
                        Some(idx) => {
                            in_heredoc = true;
                            rest = &rest[idx + 3..];
                        }
                        None => break,
                    }
                }
            }
            finished = opened && depth == 0;
        }

        if finished {
            if let Some((name, lines)) = current.take() {
                sources.insert(name, lines.join("\n"));
            }
        }
    }

    sources
}
