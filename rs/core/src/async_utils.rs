// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Asynchronous Utilities
//!
//! Streaming primitives shared by actions. A [`ChunkSender`] delivers chunks
//! to a caller supplied [`StreamingCallback`] one at a time, awaiting each
//! callback before the next chunk is sent. The first callback failure is kept
//! and every later send fails with [`Error::StreamAborted`], which lets the
//! producer stop early while the action still reports the callback's own error.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// An async callback receiving streamed chunks.
pub type StreamingCallback<S> = Arc<dyn Fn(S) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wraps an async closure as a [`StreamingCallback`].
pub fn streaming_callback<S, F, Fut>(f: F) -> StreamingCallback<S>
where
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |chunk| Box::pin(f(chunk)))
}

/// Ordered, fail-fast delivery of chunks to an optional callback.
pub struct ChunkSender<S> {
    callback: Option<StreamingCallback<S>>,
    failure: Arc<Mutex<Option<Error>>>,
    // Serializes concurrent senders so chunks never overlap in the callback.
    order: Arc<tokio::sync::Mutex<()>>,
}

impl<S> Clone for ChunkSender<S> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            failure: self.failure.clone(),
            order: self.order.clone(),
        }
    }
}

impl<S> Default for ChunkSender<S> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<S> fmt::Debug for ChunkSender<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkSender")
            .field("streaming", &self.is_streaming())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

impl<S> ChunkSender<S> {
    pub fn new(callback: Option<StreamingCallback<S>>) -> Self {
        Self {
            callback,
            failure: Arc::default(),
            order: Arc::default(),
        }
    }

    /// True when a callback is attached.
    pub fn is_streaming(&self) -> bool {
        self.callback.is_some()
    }

    pub fn is_aborted(&self) -> bool {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Delivers `chunk` and waits for the callback to finish.
    ///
    /// Without a callback this is a no-op. After the callback has failed
    /// once, every send returns [`Error::StreamAborted`] without calling it.
    pub async fn send(&self, chunk: S) -> Result<()> {
        let Some(callback) = &self.callback else {
            return Ok(());
        };
        let _turn = self.order.lock().await;
        if self.is_aborted() {
            return Err(Error::StreamAborted);
        }
        match callback(chunk).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("Streaming callback failed, aborting stream: {}", e);
                *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                Err(Error::StreamAborted)
            }
        }
    }

    /// Takes the error the callback failed with, if it failed.
    pub fn take_failure(&self) -> Option<Error> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Maps chunks of another type into this sender. The returned sender
    /// shares this sender's failure state.
    pub fn map<T, F>(&self, f: F) -> ChunkSender<T>
    where
        S: 'static,
        T: Send + 'static,
        F: Fn(T) -> S + Send + Sync + 'static,
    {
        let callback = self.callback.clone().map(|callback| {
            Arc::new(move |chunk: T| callback(f(chunk))) as StreamingCallback<T>
        });
        ChunkSender {
            callback,
            failure: self.failure.clone(),
            order: self.order.clone(),
        }
    }
}

/// Creates a callback that forwards chunks into a stream.
///
/// Chunks sent after the stream has been dropped are discarded.
pub fn stream_channel<S: Send + 'static>() -> (StreamingCallback<S>, UnboundedReceiverStream<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = streaming_callback(move |chunk: S| {
        // A dropped receiver means the caller stopped listening, not a failure.
        let _ = tx.send(chunk);
        async { Ok(()) }
    });
    (callback, UnboundedReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_chunks_in_order_one_at_a_time() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let callback = {
            let seen = seen.clone();
            let in_flight = in_flight.clone();
            streaming_callback(move |chunk: u32| {
                let seen = seen.clone();
                let in_flight = in_flight.clone();
                async move {
                    assert!(!in_flight.swap(true, std::sync::atomic::Ordering::SeqCst));
                    tokio::time::sleep(Duration::from_millis(5 - chunk as u64)).await;
                    seen.lock().unwrap().push(chunk);
                    in_flight.store(false, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        let sender = ChunkSender::new(Some(callback));
        for chunk in 0..5 {
            sender.send(chunk).await.unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_stream() {
        let calls = Arc::new(Mutex::new(0));
        let callback = {
            let calls = calls.clone();
            streaming_callback(move |chunk: &'static str| {
                *calls.lock().unwrap() += 1;
                async move {
                    if chunk == "bad" {
                        Err(Error::new_internal("consumer went away"))
                    } else {
                        Ok(())
                    }
                }
            })
        };
        let sender = ChunkSender::new(Some(callback));

        sender.send("ok").await.unwrap();
        assert!(matches!(sender.send("bad").await, Err(Error::StreamAborted)));
        assert!(matches!(sender.send("ok").await, Err(Error::StreamAborted)));
        assert_eq!(*calls.lock().unwrap(), 2);

        let failure = sender.take_failure().unwrap();
        assert!(failure.to_string().contains("consumer went away"));
    }

    #[tokio::test]
    async fn stream_channel_forwards_and_tolerates_dropped_receiver() {
        let (callback, stream) = stream_channel::<u8>();
        let sender = ChunkSender::new(Some(callback));
        sender.send(1).await.unwrap();
        sender.send(2).await.unwrap();
        drop(sender);
        assert_eq!(stream.collect::<Vec<_>>().await, vec![1, 2]);

        let (callback, stream) = stream_channel::<u8>();
        drop(stream);
        assert!(ChunkSender::new(Some(callback)).send(3).await.is_ok());
    }

    #[tokio::test]
    async fn mapped_sender_shares_failure() {
        let callback = streaming_callback(|_: String| async {
            Err(Error::new_internal("nope"))
        });
        let sender = ChunkSender::new(Some(callback));
        let mapped = sender.map(|n: u32| n.to_string());
        assert!(mapped.send(1).await.is_err());
        assert!(sender.is_aborted());
    }
}
