//! Live-query plumbing shared by data source implementations.
//!
//! # Responsibility
//! - Run SQL on the blocking pool so async callers never block.
//! - Turn a query into a cold stream that re-runs after relevant writes.
//!
//! # Invariants
//! - A live query subscribes to change notifications before its first
//!   query, so no write after the first poll is missed.
//! - The first failed query ends the stream.

use super::{LiveQuery, SourceError, SourceResult};
use crate::model::post::PostId;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

/// Committed mutation on the `posts` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableChange {
    Inserted(PostId),
    Updated(PostId),
    Deleted(PostId),
}

impl TableChange {
    pub fn post_id(&self) -> PostId {
        match *self {
            Self::Inserted(id) | Self::Updated(id) | Self::Deleted(id) => id,
        }
    }
}

/// Runs `work` against the shared connection on the blocking pool.
pub(crate) async fn run_blocking<T, F>(conn: SharedConnection, work: F) -> SourceResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> SourceResult<T> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let guard = conn.lock().map_err(|_| SourceError::ConnectionPoisoned)?;
        work(&guard)
    })
    .await;

    match joined {
        Ok(result) => result,
        Err(err) => Err(SourceError::Task(err.to_string())),
    }
}

/// Publishes a committed change; having no live subscribers is not an error.
pub(crate) fn publish(changes: &broadcast::Sender<TableChange>, change: TableChange) {
    match changes.send(change) {
        Ok(receivers) => debug!(
            "event=table_change module=source status=ok change={change:?} receivers={receivers}"
        ),
        Err(_) => debug!("event=table_change module=source status=ok change={change:?} receivers=0"),
    }
}

enum LiveState {
    Idle(broadcast::Sender<TableChange>),
    Listening(broadcast::Receiver<TableChange>),
    Finished,
}

/// Builds a cold stream that emits `query` now and again after every
/// change accepted by `is_relevant`.
///
/// The stream only holds a sender until its first poll; once every sender
/// is dropped the stream ends after draining pending changes.
pub(crate) fn live_query<T, Q, R>(
    conn: SharedConnection,
    changes: broadcast::Sender<TableChange>,
    is_relevant: R,
    query: Q,
) -> LiveQuery<T>
where
    T: Send + 'static,
    Q: Fn(&Connection) -> SourceResult<T> + Send + Sync + 'static,
    R: Fn(&TableChange) -> bool + Send + Sync + 'static,
{
    let query = Arc::new(query);
    let is_relevant = Arc::new(is_relevant);

    stream::unfold(LiveState::Idle(changes), move |state| {
        let conn = Arc::clone(&conn);
        let query = Arc::clone(&query);
        let is_relevant = Arc::clone(&is_relevant);
        async move {
            let receiver = match state {
                LiveState::Idle(sender) => sender.subscribe(),
                LiveState::Listening(mut receiver) => {
                    if !next_relevant_change(&mut receiver, is_relevant.as_ref()).await {
                        return None;
                    }
                    receiver
                }
                LiveState::Finished => return None,
            };

            match run_blocking(conn, move |db| (*query)(db)).await {
                Ok(value) => Some((Ok(value), LiveState::Listening(receiver))),
                Err(err) => Some((Err(err), LiveState::Finished)),
            }
        }
    })
    .boxed()
}

/// Waits for a relevant change, then swallows any queued burst behind it.
///
/// Returns `false` once the channel is closed.
async fn next_relevant_change<R>(
    receiver: &mut broadcast::Receiver<TableChange>,
    is_relevant: &R,
) -> bool
where
    R: Fn(&TableChange) -> bool + ?Sized,
{
    loop {
        match receiver.recv().await {
            Ok(change) if is_relevant(&change) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!("event=live_query module=source status=lagged skipped={skipped}");
                break;
            }
            Err(RecvError::Closed) => return false,
        }
    }

    loop {
        match receiver.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return true,
        }
    }
}
