//! CLI output formatting.
//!
//! Every job prints exactly one line, keyed by its position on the command
//! line and the input it read. Successes show the reported geometry and
//! where the bytes went; failures show only the generic message the sink
//! received, never codec diagnostics.
//!
//! ```text
//! 001 dawn.jpg → 300x300 q85, 41.2 KB → out/dawn.jpg
//! 002 <stdin> → 1200x800, 310.0 KB → out/stdin-002.jpg
//! 003 missing.jpg → Image processing failed (input)
//!
//! 2 done, 1 failed
//! ```
//!
//! With `--json` the same information is emitted as one JSON object per line.
//!
//! Functions come in pairs: a pure `format_*` returning strings (tested) and
//! a `print_*` wrapper writing to stdout.

use crate::dispatch::TransformInfo;
use crate::error::{TransformError, ValidationError};
use crate::imaging::{CodecRuntime, TransformMode};
use serde::Serialize;
use std::path::Path;

/// Which job a line is about.
#[derive(Debug, Clone, Copy)]
pub struct JobLabel<'a> {
    /// 1-based position on the command line.
    pub index: usize,
    /// Input as the user named it.
    pub source: &'a str,
    pub mode: TransformMode,
}

fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn header(label: &JobLabel) -> String {
    format!("{} {}", format_index(label.index), label.source)
}

fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

pub fn format_success(
    label: &JobLabel,
    info: &TransformInfo,
    bytes: usize,
    dest: &Path,
) -> String {
    let quality = match info.quality {
        Some(q) if q > 0 => format!(" q{q}"),
        _ => String::new(),
    };
    format!(
        "{} → {}x{}{}, {} → {}",
        header(label),
        info.width,
        info.height,
        quality,
        human_size(bytes),
        dest.display()
    )
}

pub fn format_failure(label: &JobLabel, err: &TransformError) -> String {
    format!("{} → {}", header(label), err)
}

pub fn format_rejected(label: &JobLabel, err: &ValidationError) -> String {
    format!("{} → rejected: {}", header(label), err)
}

pub fn format_summary(done: usize, failed: usize) -> String {
    format!("{done} done, {failed} failed")
}

#[derive(Serialize)]
struct JsonLine<'a> {
    index: usize,
    source: &'a str,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(flatten)]
    info: Option<TransformInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> JsonLine<'a> {
    fn new(label: &JobLabel<'a>) -> Self {
        Self {
            index: label.index,
            source: label.source,
            mode: label.mode.as_str(),
            output: None,
            bytes: None,
            info: None,
            error: None,
        }
    }

    fn render(&self) -> String {
        // Plain data with string keys; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn format_success_json(
    label: &JobLabel,
    info: &TransformInfo,
    bytes: usize,
    dest: &Path,
) -> String {
    JsonLine {
        output: Some(dest.display().to_string()),
        bytes: Some(bytes),
        info: Some(*info),
        ..JsonLine::new(label)
    }
    .render()
}

pub fn format_failure_json(label: &JobLabel, message: &str) -> String {
    JsonLine {
        error: Some(message.to_string()),
        ..JsonLine::new(label)
    }
    .render()
}

/// Supported formats, one section per direction.
pub fn format_formats(runtime: &CodecRuntime) -> Vec<String> {
    let inputs: Vec<String> = runtime
        .input_formats()
        .iter()
        .map(|f| {
            f.extensions_str()
                .first()
                .copied()
                .unwrap_or("?")
                .to_string()
        })
        .collect();
    vec![
        format!("Input:  {}", inputs.join(", ")),
        format!("Output: {}", runtime.output_formats().join(", ")),
    ]
}

pub fn print_success(
    label: &JobLabel,
    info: &TransformInfo,
    bytes: usize,
    dest: &Path,
    json: bool,
) {
    if json {
        println!("{}", format_success_json(label, info, bytes, dest));
    } else {
        println!("{}", format_success(label, info, bytes, dest));
    }
}

pub fn print_failure(label: &JobLabel, err: &TransformError, json: bool) {
    if json {
        println!("{}", format_failure_json(label, &err.to_string()));
    } else {
        println!("{}", format_failure(label, err));
    }
}

pub fn print_rejected(label: &JobLabel, err: &ValidationError, json: bool) {
    if json {
        println!("{}", format_failure_json(label, &err.to_string()));
    } else {
        println!("{}", format_rejected(label, err));
    }
}

pub fn print_summary(done: usize, failed: usize, json: bool) {
    if !json {
        println!();
        println!("{}", format_summary(done, failed));
    }
}

pub fn print_formats(runtime: &CodecRuntime) {
    for line in format_formats(runtime) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn label(mode: TransformMode) -> JobLabel<'static> {
        JobLabel {
            index: 1,
            source: "dawn.jpg",
            mode,
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(7), "007");
        assert_eq!(format_index(1234), "1234");
    }

    // =========================================================================
    // Text output tests
    // =========================================================================

    #[test]
    fn success_line_with_quality() {
        let info = TransformInfo {
            width: 300,
            height: 300,
            quality: Some(85),
        };
        let line = format_success(
            &label(TransformMode::Resize),
            &info,
            42188,
            Path::new("out/dawn.jpg"),
        );
        assert_eq!(line, "001 dawn.jpg → 300x300 q85, 41.2 KB → out/dawn.jpg");
    }

    #[test]
    fn success_line_hides_unset_quality() {
        let info = TransformInfo {
            width: 10,
            height: 20,
            quality: Some(0),
        };
        let line = format_success(
            &label(TransformMode::Thumbnail),
            &info,
            100,
            Path::new("t.jpg"),
        );
        assert_eq!(line, "001 dawn.jpg → 10x20, 100 B → t.jpg");
    }

    #[test]
    fn failure_line_is_generic() {
        let err = TransformError::new(ErrorKind::Input);
        let line = format_failure(&label(TransformMode::Rotate), &err);
        assert_eq!(line, "001 dawn.jpg → Image processing failed (input)");
    }

    #[test]
    fn rejected_line_shows_validation_message() {
        let line = format_rejected(
            &label(TransformMode::Resize),
            &ValidationError::InvalidQuality,
        );
        assert_eq!(line, "001 dawn.jpg → rejected: Invalid quality parameter");
    }

    #[test]
    fn summary_counts() {
        assert_eq!(format_summary(2, 1), "2 done, 1 failed");
    }

    // =========================================================================
    // JSON output tests
    // =========================================================================

    #[test]
    fn success_json_flattens_info() {
        let info = TransformInfo {
            width: 3,
            height: 4,
            quality: None,
        };
        let line = format_success_json(&label(TransformMode::Rotate), &info, 9, Path::new("o.png"));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["mode"], "rotate");
        assert_eq!(value["width"], 3);
        assert_eq!(value["height"], 4);
        assert_eq!(value["bytes"], 9);
        assert_eq!(value["output"], "o.png");
        assert!(value.get("quality").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_json_has_error_only() {
        let line = format_failure_json(&label(TransformMode::Resize), "Image processing failed (read)");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["error"], "Image processing failed (read)");
        assert_eq!(value["index"], 1);
        assert!(value.get("width").is_none());
    }

    #[test]
    fn formats_lists_both_directions() {
        let lines = format_formats(crate::imaging::init());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Input:"));
        assert!(lines[0].contains("jpg"));
        assert!(lines[1].contains("avif"));
    }
}
