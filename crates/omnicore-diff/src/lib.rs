//! Unified-diff utility (§6 "Diff contract").
//!
//! `compute` returns the empty string iff the inputs are byte-equal, and a
//! single too-large hunk header when the combined line count would make a
//! full diff expensive to render.

use similar::TextDiff;

/// Above this combined line count, [`compute`] skips the diff entirely and
/// returns a placeholder hunk header (§6, §8 scenario 5).
const MAX_COMBINED_LINES: usize = 75_000;

fn count_lines(data: &[u8]) -> usize {
    if data.is_empty() {
        return 0;
    }
    let newlines = data.iter().filter(|&&b| b == b'\n').count();
    if data.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Compute a unified diff of `a` -> `b`. Returns `""` iff `a == b`.
///
/// If `count_lines(a) + count_lines(b) > 75_000`, returns a single hunk
/// header `@@ -1,N +1,M @@ diff too large to display` instead of running the
/// diff (§6, §8 scenario 5).
pub fn compute(a: &[u8], b: &[u8]) -> String {
    if a == b {
        return String::new();
    }

    let lines_a = count_lines(a);
    let lines_b = count_lines(b);
    if lines_a + lines_b > MAX_COMBINED_LINES {
        return format!(
            "@@ -1,{lines_a} +1,{lines_b} @@ diff too large to display"
        );
    }

    let text_a = String::from_utf8_lossy(a);
    let text_b = String::from_utf8_lossy(b);
    let diff = TextDiff::from_lines(text_a.as_ref(), text_b.as_ref());

    // TextDiff::unified_diff() prepends a "--- a\n+++ b\n" prologue; strip it
    // since the store/runtime callers only want the hunks (§6).
    let rendered = diff
        .unified_diff()
        .context_radius(3)
        .header("a", "b")
        .to_string();

    strip_prologue(&rendered)
}

fn strip_prologue(rendered: &str) -> String {
    let mut lines = rendered.lines();
    let mut peek = lines.clone();
    if peek.next().is_some_and(|l| l.starts_with("--- ")) && peek.next().is_some_and(|l| l.starts_with("+++ ")) {
        lines.next();
        lines.next();
    }
    let rest: Vec<&str> = lines.collect();
    rest.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_empty_diff() {
        assert_eq!(compute(b"same", b"same"), "");
    }

    #[test]
    fn differing_inputs_produce_nonempty_diff() {
        let out = compute(b"line one\n", b"line two\n");
        assert!(!out.is_empty());
        assert!(!out.starts_with("--- "));
    }

    #[test]
    fn bulk_fallback_above_threshold() {
        let a: String = (0..38_000).map(|i| format!("a{i}\n")).collect();
        let b: String = (0..38_000).map(|i| format!("b{i}\n")).collect();
        let out = compute(a.as_bytes(), b.as_bytes());
        assert!(out.starts_with("@@ -1,38000 +1,38000 @@ diff too large to display"));
    }

    #[test]
    fn under_threshold_runs_real_diff() {
        let a: String = (0..100).map(|i| format!("a{i}\n")).collect();
        let b: String = (0..100).map(|i| format!("b{i}\n")).collect();
        let out = compute(a.as_bytes(), b.as_bytes());
        assert!(out.contains("@@"));
        assert!(!out.contains("diff too large to display"));
    }
}
