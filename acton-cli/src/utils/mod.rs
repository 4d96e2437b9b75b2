use colored::Colorize;

/// Success message with checkmark.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Informational message.
pub fn info(message: &str) {
    println!("{} {}", "→".blue().bold(), message);
}

/// Warning message.
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}
