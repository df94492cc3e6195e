//! Status command handler

use anyhow::Result;

use qline_core::{render_queues, Config, QueueRow, SessionPhase};

use crate::output::{Output, OutputFormat};
use crate::Session;

/// Show server, login and membership information
pub async fn show(session: &Session, config: &Config, output: &Output) -> Result<()> {
    // A failed check is reported, not fatal
    let reachable = session.load().await.is_ok();
    let state = session.snapshot();
    let rows = render_queues(&state);
    let joined: Vec<&QueueRow> = rows.iter().filter(|r| r.joined).collect();
    let logged_in = state.phase() != SessionPhase::Unauthenticated;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server": config.base_url,
                    "reachable": reachable,
                    "authenticated": logged_in,
                    "user": state.user,
                    "queues": rows.len(),
                    "joined": joined.iter().map(|r| &r.queue_id).collect::<Vec<_>>(),
                    "error": state.error,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", if logged_in { "authenticated" } else { "unauthenticated" });
        }
        OutputFormat::Human => {
            println!("qline Status");
            println!("============");
            println!();
            println!("Server:");
            println!("  URL:    {}", config.base_url);
            println!("  Status: {}", if reachable { "reachable" } else { "error" });
            if let Some(ref error) = state.error {
                println!("  Error:  {}", error);
            }
            println!();
            println!("Account:");
            match (&state.user, logged_in) {
                (Some(user), _) => println!("  User: {}", user.id),
                (None, true) => println!("  User: (unknown)"),
                (None, false) => println!("  Not logged in"),
            }
            println!();
            println!("Queues:");
            println!("  Total:  {}", rows.len());
            if joined.is_empty() {
                println!("  Joined: none");
            } else {
                for row in joined {
                    println!("  Joined: {} ({})", row.name, row.queue_id);
                }
            }
        }
    }

    Ok(())
}
