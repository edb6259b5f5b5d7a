//! Prompt texts sent back to the chat surface.
//!
//! Templates use `{{name}}` placeholders:
//! - `{{files_report}}` / `{{summary_report}}`: attached file names
//! - `{{summary}}`: the failure summary, trimmed to `SUMMARY_EXCERPT_LINES`
//! - `{{iteration}}`: the correction cycle the prompt opens

use std::path::Path;

use handlebars::Handlebars;
use serde_json::json;

use crate::domain::ErrorBundle;
use crate::error::{FixloopError, Result};

/// Sent when the build fails with a report identical to the last one
pub const DEFAULT_NUDGE_PROMPT: &str = "The build still fails with the same errors as the \
logs I already sent. Those errors are not fixed yet. Re-check every error from the previous \
logs and send the complete corrected code.";

/// Sent with both failure artifacts attached
pub const DEFAULT_CORRECTIVE_PROMPT: &str = "The build failed (attempt {{iteration}}). \
The attached {{files_report}} lists the errors per file and {{summary_report}} summarizes \
them:\n\n{{summary}}\n\nFix every error and send the complete corrected code.";

/// Lines of the summary inlined into the corrective prompt
pub const SUMMARY_EXCERPT_LINES: usize = 40;

/// Fill the corrective template for a freshly read failure bundle.
///
/// Unknown placeholders render empty; a malformed template is an error.
pub fn render_corrective(
    template: &str,
    bundle: &ErrorBundle,
    files_report: &Path,
    summary_report: &Path,
    iteration: u32,
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    // Compiler output is plain text, keep `<` and `&` as they are
    handlebars.register_escape_fn(handlebars::no_escape);

    let context = json!({
        "files_report": file_name(files_report),
        "summary_report": file_name(summary_report),
        "iteration": iteration,
        "summary": excerpt(&bundle.summary_report, SUMMARY_EXCERPT_LINES),
    });
    handlebars
        .render_template(template, &context)
        .map_err(|e| FixloopError::Template(format!("corrective prompt: {}", e)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// First `max_lines` lines of `text`, marking the cut
fn excerpt(text: &str, max_lines: usize) -> String {
    let trimmed = text.trim_end();
    let total = trimmed.lines().count();
    if total <= max_lines {
        return trimmed.to_string();
    }
    let head: Vec<&str> = trimmed.lines().take(max_lines).collect();
    format!(
        "{}\n... ({} more lines in the attached summary)",
        head.join("\n"),
        total - max_lines
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bundle(summary: &str) -> ErrorBundle {
        ErrorBundle {
            files_report: "src/lib.rs: 2 errors".to_string(),
            summary_report: summary.to_string(),
        }
    }

    #[test]
    fn test_render_corrective_fills_placeholders() {
        let prompt = render_corrective(
            DEFAULT_CORRECTIVE_PROMPT,
            &bundle("error[E0308]: mismatched types\n"),
            &PathBuf::from("/state/artifacts/files_report.txt"),
            &PathBuf::from("/state/artifacts/summary_report.txt"),
            3,
        )
        .unwrap();

        assert!(prompt.contains("attempt 3"));
        assert!(prompt.contains("files_report.txt"));
        assert!(prompt.contains("summary_report.txt"));
        assert!(prompt.contains("error[E0308]: mismatched types\n\nFix"));
        assert!(!prompt.contains("/state/artifacts"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_render_corrective_keeps_compiler_text_unescaped() {
        let prompt = render_corrective(
            "{{summary}}",
            &bundle("expected `Vec<&str>`, found `&String`"),
            Path::new("files_report.txt"),
            Path::new("summary_report.txt"),
            1,
        )
        .unwrap();

        assert_eq!(prompt, "expected `Vec<&str>`, found `&String`");
    }

    #[test]
    fn test_render_corrective_unknown_placeholder_renders_empty() {
        let prompt = render_corrective(
            "attempt {{iteration}}{{model}}",
            &bundle(""),
            Path::new("files_report.txt"),
            Path::new("summary_report.txt"),
            2,
        )
        .unwrap();

        assert_eq!(prompt, "attempt 2");
    }

    #[test]
    fn test_render_corrective_rejects_malformed_template() {
        let result = render_corrective(
            "attempt {{#if iteration}}",
            &bundle(""),
            Path::new("files_report.txt"),
            Path::new("summary_report.txt"),
            2,
        );

        assert!(matches!(result, Err(FixloopError::Template(_))));
    }

    #[test]
    fn test_excerpt_truncates_long_summary() {
        let summary: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let out = excerpt(&summary, 40);

        assert_eq!(out.lines().count(), 41);
        assert!(out.ends_with("(10 more lines in the attached summary)"));
    }

    #[test]
    fn test_excerpt_keeps_short_summary() {
        assert_eq!(excerpt("one\ntwo\n", 40), "one\ntwo");
    }

    #[test]
    fn test_nudge_has_no_placeholders() {
        assert!(!DEFAULT_NUDGE_PROMPT.contains("{{"));
    }
}
