//! Simple line-based CLI output utilities.

/// Line width for separators.
const LINE_WIDTH: usize = 60;

/// Width of the label column in key/value listings.
const LABEL_WIDTH: usize = 18;

/// Print a section header.
///
/// ```text
/// KEYSYNC STATUS
/// ════════════════════════════════════════════════════════════
/// ```
pub fn print_header(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "═".repeat(LINE_WIDTH));
}

/// Print a status line.
///
/// ```text
///   ✓ Pushed at 2024-01-02T00:00:00.000Z
/// ```
pub fn print_line(icon: &str, message: &str) {
    println!("  {} {}", icon, message);
}

pub fn print_ok(message: &str) {
    print_line("✓", message);
}

pub fn print_warn(message: &str) {
    print_line("⚠", message);
}

/// Print an aligned label/value pair.
///
/// ```text
///   Backend:           webdav
/// ```
pub fn print_field(label: &str, value: &str) {
    println!("  {:<width$} {}", format!("{}:", label), value, width = LABEL_WIDTH);
}

/// Print indented hint lines.
pub fn print_hints(lines: &[&str]) {
    println!();
    for line in lines {
        println!("    {}", line);
    }
}

/// Render an optional value, with a dash for `None`.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
