//! Stream wrapper that counts the bytes handed to the object store.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Passes chunks through unchanged and adds their length to a shared
/// counter, so the drain loop can report bytes sent per file.
pub struct ProgressStream<S> {
    inner: S,
    transferred: Arc<AtomicU64>,
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    pub fn new(inner: S, transferred: Arc<AtomicU64>) -> Self {
        Self { inner, transferred }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(bytes))) = &poll {
            self.transferred
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    #[tokio::test]
    async fn test_counts_chunks_and_passes_errors() {
        let counter = Arc::new(AtomicU64::new(0));
        let chunks = vec![
            Ok(Bytes::from_static(b"hello")),
            Ok(Bytes::from_static(b" world")),
            Err(std::io::Error::other("disk gone")),
        ];
        let mut counted = ProgressStream::new(stream::iter(chunks), Arc::clone(&counter));

        assert_eq!(counted.next().await.unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(counted.next().await.unwrap().unwrap().len(), 6);
        assert!(counted.next().await.unwrap().is_err());
        assert!(counted.next().await.is_none());
        assert_eq!(counter.load(Ordering::Relaxed), 11);
    }
}
