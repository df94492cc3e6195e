//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde_json::json;

use qline_core::{MemberRow, Queue, QueueRow, User};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the queue list
    pub fn print_queues(&self, rows: &[QueueRow]) {
        match self.format {
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No queues yet.");
                    return;
                }
                for row in rows {
                    let marker = if row.joined { "*" } else { " " };
                    println!("{} {:<10} {}", marker, truncate(row.queue_id.as_str(), 10), row);
                }
                println!("\n{} queue(s)", rows.len());
            }
            OutputFormat::Json => {
                let queues: Vec<_> = rows.iter().map(queue_row_json).collect();
                println!("{}", json!(queues));
            }
            OutputFormat::Quiet => {
                for row in rows {
                    println!("{}", row.queue_id);
                }
            }
        }
    }

    /// Print one queue with its members
    pub fn print_details(&self, queue: &Queue, rows: &[MemberRow], position: Option<usize>) {
        match self.format {
            OutputFormat::Human => {
                println!("Queue: {} ({})", queue.name, queue.id);
                println!();
                if rows.is_empty() {
                    println!("Nobody is waiting.");
                } else {
                    for row in rows {
                        let marker = if row.is_self { " <- you" } else { "" };
                        println!("{}  [{}]{}", row, row.entry_id, marker);
                    }
                }
                if let Some(position) = position {
                    println!();
                    println!("Your position: {} of {}", position, rows.len());
                }
            }
            OutputFormat::Json => {
                let members: Vec<_> = rows.iter().map(member_row_json).collect();
                println!(
                    "{}",
                    json!({
                        "id": queue.id,
                        "name": queue.name,
                        "members": members,
                        "position": position,
                    })
                );
            }
            OutputFormat::Quiet => {
                for row in rows {
                    println!("{}", row.entry_id);
                }
            }
        }
    }

    /// Print the authenticated user
    pub fn print_user(&self, user: &User) {
        match self.format {
            OutputFormat::Human => match user.name {
                Some(ref name) => println!("{} ({})", name, user.id),
                None => println!("{}", user.id),
            },
            OutputFormat::Json => println!("{}", json!(user)),
            OutputFormat::Quiet => println!("{}", user.id),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn queue_row_json(row: &QueueRow) -> serde_json::Value {
    json!({
        "id": row.queue_id,
        "name": row.name,
        "member_count": row.member_count,
        "joined": row.joined,
    })
}

fn member_row_json(row: &MemberRow) -> serde_json::Value {
    json!({
        "position": row.position,
        "entry_id": row.entry_id,
        "user_id": row.user_id,
        "joined_at": row.joined_at,
        "is_self": row.is_self,
    })
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
