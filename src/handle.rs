use super::{errors::TaskError, result::TaskResult};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{sync::oneshot, time::Duration};

/// Caller side of a submission's result slot.
///
/// The slot is allocated before the item reaches the queue or a freshly
/// spawned worker, so the handle is valid even if the item executed before
/// `submit` returned. Whichever worker executes the item fulfills the slot
/// exactly once; a handle that resolves to [`TaskError::ChannelClosed`]
/// means the pool shut down with the item still queued.
pub struct JoinHandle<T> {
    receiver: oneshot::Receiver<TaskResult<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { receiver }
    }

    /// Blocks the current thread until the result arrives.
    ///
    /// Must not be called from an async context; `.await` the handle there
    /// instead.
    pub fn wait(self) -> TaskResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TaskError::ChannelClosed))
    }

    /// Waits for the result, giving up after `timeout`. The item itself is
    /// not cancelled; only this wait is abandoned.
    pub async fn wait_timeout(self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TaskError::ChannelClosed),
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(TaskError::ChannelClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Drains a batch of handles concurrently, completion order.
pub async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<TaskResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }

    let len = handles.len();
    let mut futures = FuturesUnordered::from_iter(handles);
    let mut results = Vec::with_capacity(len);

    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}
