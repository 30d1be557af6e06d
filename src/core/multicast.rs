use futures_util::Stream;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Multicast event source with observer counting.
///
/// Every observer owns an unbounded queue, so a slow observer never delays
/// the others. An observer detaches by dropping its receiver; the drop is
/// noticed the next time the stream is published to or counted.
pub struct ChannelStream<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    observers: Vec<mpsc::UnboundedSender<T>>,
    completed: bool,
}

impl<T> Clone for ChannelStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ChannelStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ChannelStream")
            .field("observers", &inner.observers.len())
            .field("completed", &inner.completed)
            .finish()
    }
}

impl<T> Default for ChannelStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChannelStream<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                observers: Vec::new(),
                completed: false,
            })),
        }
    }

    /// Attach a new observer. Subscribing to a completed stream yields a
    /// receiver that ends immediately.
    pub fn subscribe(&self) -> ChannelReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.completed {
            inner.observers.push(tx);
        }
        ChannelReceiver { rx }
    }

    /// Live observers, after pruning the ones that went away.
    pub fn observer_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.observers.retain(|tx| !tx.is_closed());
        inner.observers.len()
    }

    /// End the stream: observers drain what is queued, then see `None`.
    pub fn complete(&self) {
        let mut inner = self.inner.lock();
        inner.completed = true;
        inner.observers.clear();
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().completed
    }

    /// Whether both handles refer to the same underlying stream.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone> ChannelStream<T> {
    /// Deliver `value` to every live observer; returns how many received it.
    pub fn publish(&self, value: T) -> usize {
        let mut inner = self.inner.lock();
        if inner.completed {
            return 0;
        }
        inner.observers.retain(|tx| tx.send(value.clone()).is_ok());
        inner.observers.len()
    }
}

/// One observer's end of a [`ChannelStream`].
#[derive(Debug)]
pub struct ChannelReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> ChannelReceiver<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Narrow the receiver to values convertible into `R`.
    pub fn filtered<R: TryFrom<T>>(self) -> FilteredReceiver<T, R> {
        FilteredReceiver {
            inner: self,
            _marker: PhantomData,
        }
    }
}

impl<T> Stream for ChannelReceiver<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Receiver that skips values not convertible into `R`.
#[derive(Debug)]
pub struct FilteredReceiver<T, R> {
    inner: ChannelReceiver<T>,
    _marker: PhantomData<fn() -> R>,
}

impl<T, R: TryFrom<T>> FilteredReceiver<T, R> {
    pub async fn recv(&mut self) -> Option<R> {
        loop {
            if let Ok(value) = R::try_from(self.inner.recv().await?) {
                return Some(value);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<R> {
        loop {
            if let Ok(value) = R::try_from(self.inner.try_recv()?) {
                return Some(value);
            }
        }
    }
}

impl<T, R: TryFrom<T>> Stream for FilteredReceiver<T, R> {
    type Item = R;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<R>> {
        loop {
            match self.inner.rx.poll_recv(cx) {
                Poll::Ready(Some(value)) => {
                    if let Ok(value) = R::try_from(value) {
                        return Poll::Ready(Some(value));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_observer() {
        let stream = ChannelStream::new();
        let mut a = stream.subscribe();
        let mut b = stream.subscribe();

        assert_eq!(stream.publish(7), 2);
        assert_eq!(a.try_recv(), Some(7));
        assert_eq!(b.try_recv(), Some(7));
    }

    #[test]
    fn test_dropped_observer_is_not_counted() {
        let stream = ChannelStream::<u32>::new();
        let a = stream.subscribe();
        let _b = stream.subscribe();
        assert_eq!(stream.observer_count(), 2);

        drop(a);
        assert_eq!(stream.observer_count(), 1);
    }

    #[test]
    fn test_complete_ends_observers() {
        let stream = ChannelStream::new();
        let mut rx = stream.subscribe();
        stream.publish(1);
        stream.complete();

        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), None);
        assert_eq!(stream.publish(2), 0);
        assert_eq!(stream.observer_count(), 0);
        assert!(stream.is_completed());
    }

    #[test]
    fn test_clones_share_identity() {
        let stream = ChannelStream::<u8>::new();
        let clone = stream.clone();
        assert!(stream.ptr_eq(&clone));
        assert!(!stream.ptr_eq(&ChannelStream::new()));
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_values() {
        let stream = ChannelStream::<i64>::new();
        let mut small = stream.subscribe().filtered::<u8>();

        stream.publish(1_000);
        stream.publish(5);
        stream.complete();

        assert_eq!(small.recv().await, Some(5));
        assert_eq!(small.recv().await, None);
    }
}
