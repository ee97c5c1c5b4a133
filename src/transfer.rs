use std::io::{Read, Write};
use tracing::info;

use crate::bus::{Event, EventBus};
use crate::store::{normalize_code, Snippet, SnippetStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid snippet file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write every snippet as a pretty-printed JSON array. Returns the count.
pub fn export<S, W>(store: &S, writer: W) -> Result<usize, TransferError>
where
    S: SnippetStore + ?Sized,
    W: Write,
{
    let snippets = store.get_all()?;
    serde_json::to_writer_pretty(writer, &snippets)?;
    info!(count = snippets.len(), "snippets exported");
    Ok(snippets.len())
}

/// Create a new snippet for every record in a JSON array. Incoming ids are
/// ignored; counters are kept. Publishes `added` once per record.
pub fn import<S, R>(store: &S, bus: &EventBus, reader: R) -> Result<usize, TransferError>
where
    S: SnippetStore + ?Sized,
    R: Read,
{
    let incoming: Vec<Snippet> = serde_json::from_reader(reader)?;

    let mut imported = 0;
    for mut snippet in incoming {
        snippet.code = normalize_code(&snippet.code);
        store.create(&snippet)?;
        bus.publish(Event::Added);
        imported += 1;
    }

    info!(count = imported, "snippets imported");
    Ok(imported)
}
