//! Queue command handlers

use anyhow::{bail, Result};

use qline_core::view::viewer_zone;
use qline_core::{render_details, render_queues, Config, EntryId, QueueId};

use super::connect;
use crate::output::{Output, OutputFormat};
use crate::Session;

/// List all queues
pub async fn list(session: &Session, output: &Output) -> Result<()> {
    connect(session).await?;
    output.print_queues(&render_queues(&session.snapshot()));
    Ok(())
}

/// Show one queue and its members
pub async fn show(session: &Session, config: &Config, id: String, output: &Output) -> Result<()> {
    let queue_id = open(session, id).await?;

    let state = session.snapshot();
    let Some(queue) = state.queue(&queue_id) else {
        bail!("Queue not found: {}", queue_id);
    };
    let zone = viewer_zone(config.utc_offset_minutes);
    let rows = render_details(queue, &state, &zone);

    output.print_details(queue, &rows, state.my_position());
    Ok(())
}

/// Create a queue
pub async fn create(session: &Session, name: String, output: &Output) -> Result<()> {
    connect(session).await?;
    let queue_id = session.create_queue(&name).await?;

    match output.format {
        OutputFormat::Quiet => println!("{}", queue_id),
        _ => output.success(&format!("Created queue '{}' ({})", name.trim(), queue_id)),
    }
    Ok(())
}

/// Join a queue
pub async fn join(session: &Session, id: String, output: &Output) -> Result<()> {
    connect(session).await?;
    let queue_id = QueueId::from(id);
    session.join_queue(&queue_id).await?;

    let state = session.snapshot();
    match state.my_position() {
        Some(position) => output.success(&format!(
            "Joined queue {}, position {} of {}",
            queue_id,
            position,
            state.active_queue().map_or(0, |q| q.member_count())
        )),
        None => output.success(&format!("Joined queue {}", queue_id)),
    }
    Ok(())
}

/// Leave a queue
pub async fn leave(session: &Session, id: String, output: &Output) -> Result<()> {
    let queue_id = open(session, id).await?;
    if !session.leave_queue().await? {
        bail!("You are not in queue {}", queue_id);
    }
    output.success(&format!("Left queue {}", queue_id));
    Ok(())
}

/// Let the next person go first
pub async fn skip(session: &Session, id: String, output: &Output) -> Result<()> {
    let queue_id = open(session, id).await?;
    if !session.skip_turn().await? {
        bail!("You are not in queue {}", queue_id);
    }

    match session.snapshot().my_position() {
        Some(position) => output.success(&format!("Skipped, now at position {}", position)),
        None => output.success("Skipped"),
    }
    Ok(())
}

/// Ask another member to trade places
pub async fn swap(session: &Session, id: String, entry: String, output: &Output) -> Result<()> {
    let queue_id = open(session, id).await?;
    let target = EntryId::from(entry);
    session.request_swap(&target).await?;
    output.success(&format!("Swap requested with entry {} in queue {}", target, queue_id));
    Ok(())
}

/// Connect and make `id` the active queue
async fn open(session: &Session, id: String) -> Result<QueueId> {
    connect(session).await?;
    let queue_id = QueueId::from(id);
    session.open_queue(&queue_id).await?;
    Ok(queue_id)
}
