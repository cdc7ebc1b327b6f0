//! Handoff pipes connecting adjacent stages.
//!
//! A [`Pipe`] is the receiving end of a capacity-one channel. The producing
//! stage owns the sender and suspends until the consumer has taken the
//! previous event, so no stage runs more than one event ahead of its
//! neighbour. Dropping the sender closes the pipe; dropping the receiver makes
//! the producer's next send fail, which stages treat as "stop".

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;

/// One event in flight per pipe.
pub const HANDOFF_CAPACITY: usize = 1;

/// Receiving end of a handoff pipe.
pub type Pipe<T> = mpsc::Receiver<T>;

/// Sending end of a handoff pipe.
pub type PipeSender<T> = mpsc::Sender<T>;

/// Creates a new handoff pipe.
pub fn handoff<T>() -> (PipeSender<T>, Pipe<T>) {
    mpsc::channel(HANDOFF_CAPACITY)
}

/// Adapts a pipe into a [`Stream`] so stream combinators can drive a stage.
pub fn into_stream<T>(pipe: Pipe<T>) -> impl Stream<Item = T> {
    stream::unfold(pipe, |mut pipe| async move {
        pipe.recv().await.map(|item| (item, pipe))
    })
}

/// Spawns a task that feeds `stream` into a fresh pipe and closes it when the
/// stream ends.
pub fn spawn_stream<S>(stream: S) -> Pipe<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    let (tx, rx) = handoff();
    tokio::spawn(async move {
        let mut stream = Box::pin(stream);
        while let Some(item) = stream.next().await {
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Spawns a producer stage emitting every element of `items` in order.
pub fn from_iter<I>(items: I) -> Pipe<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    spawn_stream(stream::iter(items))
}

/// Drains a pipe into a vector. Mostly useful in tests.
pub async fn collect<T>(pipe: Pipe<T>) -> Vec<T> {
    into_stream(pipe).collect().await
}
