//! Byte activity tracking for idle detection.
//!
//! [`ActivityIo`] wraps a connection and counts every byte moved in either
//! direction. The matching [`Activity`] handle stays with the connection task
//! after the stream itself has been handed to a protocol driver, and resolves
//! [`Activity::idle`] once nothing has moved for a full period.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A stream that records how many bytes crossed it.
#[derive(Debug)]
pub struct ActivityIo<S> {
    inner: S,
    moved: Arc<AtomicU64>,
}

impl<S> ActivityIo<S> {
    /// Wrap `inner`, returning the stream and the handle observing it.
    pub fn new(inner: S) -> (Self, Activity) {
        let moved = Arc::new(AtomicU64::new(0));
        let activity = Activity {
            moved: Arc::clone(&moved),
        };
        (Self { inner, moved }, activity)
    }

    fn record(&self, n: usize) {
        self.moved.fetch_add(n as u64, Ordering::AcqRel);
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ActivityIo<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = res {
            let read = buf.filled().len().saturating_sub(before);
            self.record(read);
        }
        res
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ActivityIo<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let res = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = res {
            self.record(written);
        }
        res
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let res = Pin::new(&mut self.inner).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(written)) = res {
            self.record(written);
        }
        res
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Handle observing an [`ActivityIo`].
#[derive(Debug, Clone)]
pub struct Activity {
    moved: Arc<AtomicU64>,
}

impl Activity {
    /// Bytes moved so far, both directions.
    pub fn bytes(&self) -> u64 {
        self.moved.load(Ordering::Acquire)
    }

    /// Resolves after a whole `period` in which no byte moved.
    pub async fn idle(&self, period: Duration) {
        loop {
            let before = self.bytes();
            tokio::time::sleep(period).await;
            if self.bytes() == before {
                return;
            }
        }
    }
}
