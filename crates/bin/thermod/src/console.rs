//! Console driver — changes virtual entity states from standard input.
//!
//! Each line reads `entity_id=state`; an empty state makes the entity
//! unavailable. Blank lines and lines starting with `#` are ignored.

use std::sync::Arc;

use thermo_adapter_virtual::VirtualPlatform;
use thermo_app::ports::{Clock, EventPublisher};
use thermo_domain::id::EntityId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A parsed console line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Set { entity_id: &'a str, state: &'a str },
    Remove { entity_id: &'a str },
}

fn parse_line(line: &str) -> Option<Result<Command<'_>, &'static str>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let Some((entity_id, state)) = line.split_once('=') else {
        return Some(Err("expected `entity_id=state`"));
    };
    let entity_id = entity_id.trim();
    if entity_id.is_empty() {
        return Some(Err("missing entity id"));
    }
    let state = state.trim();
    Some(Ok(if state.is_empty() {
        Command::Remove { entity_id }
    } else {
        Command::Set { entity_id, state }
    }))
}

/// Apply every line of `input` to `platform` until end of input.
pub async fn drive<R, P, C>(input: R, platform: Arc<VirtualPlatform<P, C>>)
where
    R: AsyncBufRead + Unpin,
    P: EventPublisher + Send + Sync,
    C: Clock,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(error = %error, "console input failed");
                break;
            }
        };
        match parse_line(&line) {
            None => {}
            Some(Ok(Command::Set { entity_id, state })) => {
                platform.set_state(&EntityId::new(entity_id), state).await;
            }
            Some(Ok(Command::Remove { entity_id })) => {
                platform.remove(&EntityId::new(entity_id)).await;
            }
            Some(Err(reason)) => tracing::warn!(%line, reason, "console line ignored"),
        }
    }
    tracing::debug!("console input closed");
}
