use std::{
    io::{stderr, Write},
    path::Path,
};

/// One-based position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl From<serde_yaml::Location> for SourceLocation {
    fn from(location: serde_yaml::Location) -> Self {
        Self {
            line: location.line(),
            column: location.column(),
        }
    }
}

/// Prints `message` under the offending line (and the one before it), with
/// a caret at the column. Falls back to a one-line message if the location
/// isn't inside `source`.
pub fn print_error_with_source(
    source_id: &Path,
    source: &str,
    message: &str,
    location: SourceLocation,
) {
    match format_error_with_source(source_id, source, message, location) {
        Some(text) => {
            stderr().lock().write_all(text.as_bytes()).ok();
        }
        None => print_message_and_loc(source_id, message, location),
    }
}

fn format_error_with_source(
    source_id: &Path,
    source: &str,
    message: &str,
    location: SourceLocation,
) -> Option<String> {
    let index = location.line.checked_sub(1)?;
    let mut lines = source.lines().map(|l| l.trim_end_matches('\r'));
    let previous = match index {
        0 => None,
        _ => Some(lines.nth(index - 1)?),
    };
    let current = lines.next()?;

    let mut out = format!("{}:\n", source_id.display());
    if let Some(previous) = previous {
        out += &format!("{:>5}│ {previous}\n", location.line - 1);
    }
    out += &format!("{:>5}│ {current}\n", location.line);
    out += &" ".repeat(5 + 2 + location.column.saturating_sub(1));
    out += &format!("╰─► {message}\n");
    Some(out)
}

fn print_message_and_loc(source_id: &Path, message: &str, location: SourceLocation) {
    eprintln!(
        "[{} @ line {}, column {}] {message}",
        source_id.display(),
        location.line,
        location.column
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_at_the_column() {
        let text = format_error_with_source(
            Path::new("module.yml"),
            "module: m\r\nlayers: [\n",
            "unexpected end",
            SourceLocation { line: 2, column: 9 },
        )
        .unwrap();
        assert_eq!(
            text,
            "module.yml:\n    1│ module: m\n    2│ layers: [\n               ╰─► unexpected end\n"
        );
    }

    #[test]
    fn first_line_has_no_context_line() {
        let text = format_error_with_source(
            Path::new("m.yml"),
            "module: [",
            "bad",
            SourceLocation { line: 1, column: 1 },
        )
        .unwrap();
        assert_eq!(text, "m.yml:\n    1│ module: [\n       ╰─► bad\n");
    }

    #[test]
    fn location_outside_source() {
        let location = SourceLocation { line: 7, column: 1 };
        assert!(format_error_with_source(Path::new("m.yml"), "a: b\n", "x", location).is_none());
    }
}
