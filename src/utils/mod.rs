//! Small shared helpers

pub mod time;

/// Last `lines` lines of a process's stderr, for error reporting
pub fn stderr_tail(stderr: &str, lines: usize) -> String {
    let collected: Vec<&str> = stderr.lines().rev().take(lines).collect();
    collected.into_iter().rev().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(stderr_tail(text, 2), "three\nfour");
    }

    #[test]
    fn test_stderr_tail_short_input() {
        assert_eq!(stderr_tail("only", 10), "only");
        assert_eq!(stderr_tail("", 10), "");
    }
}
