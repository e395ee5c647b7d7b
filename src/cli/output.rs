//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the partition-rag CLI.
//! Answers go to stdout; diagnostics go to stderr.

use crate::types::Source;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Longest source excerpt shown under an answer.
const EXCERPT_CHARS: usize = 120;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the scenario banner
    pub fn banner(&self, scenario: &str) {
        if self.colored {
            println!(
                "\n  {} {}  {}\n",
                "partition-rag".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed(),
                scenario.bright_white()
            );
        } else {
            println!(
                "\n  partition-rag v{}  {}\n",
                env!("CARGO_PKG_VERSION"),
                scenario
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            eprintln!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print the input prompt without a newline
    pub fn prompt(&self) {
        if self.colored {
            print!("{} ", "User:".bright_cyan().bold());
        } else {
            print!("User: ");
        }
        io::stdout().flush().ok();
    }

    /// Print the label that precedes an answer, without a newline
    pub fn answer_label(&self) {
        if self.colored {
            print!("{} ", "Agent:".bright_green().bold());
        } else {
            print!("Agent: ");
        }
        io::stdout().flush().ok();
    }

    /// Print a complete answer
    pub fn answer(&self, text: &str) {
        self.answer_label();
        println!("{}", text);
    }

    /// Print one streamed token as it arrives
    pub fn token(&self, token: &str) {
        print!("{}", token);
        io::stdout().flush().ok();
    }

    /// Note which tool produced the answer
    pub fn tool_used(&self, name: &str) {
        if self.colored {
            println!("  {} {}", "⚙".dimmed(), name.dimmed());
        } else {
            println!("  [TOOL] {}", name);
        }
    }

    /// Print the retrieved chunks behind an answer
    pub fn sources(&self, sources: &[Source]) {
        for source in sources {
            let line = format!("{:.3}  {}", source.score, excerpt(&source.text));
            if self.colored {
                println!("    {} {}", "↳".dimmed(), line.dimmed());
            } else {
                println!("    > {}", line);
            }
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

/// First line of `text`, cut to a readable length on a char boundary.
pub fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= EXCERPT_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}
