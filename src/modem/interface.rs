use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use heapless::Deque;

pub const RX_QUEUE_SIZE: usize = 256;

/// Byte link to the modem.
///
/// Writes may wait for the transmitter, reads never block: `read_available` returns
/// whatever has been received so far, possibly nothing.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error: core::fmt::Debug;

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    fn read_available(&mut self, buf: &mut [u8]) -> usize;
}

/// Bounded receive queue between the UART receive side (producer) and the
/// command engine / frame reader (consumer).
///
/// When full, newly pushed bytes are dropped and counted.
pub struct ByteQueue<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Deque<u8, N>>>,
    dropped: AtomicU32,
}

impl<const N: usize> ByteQueue<N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
            dropped: AtomicU32::new(0),
        }
    }

    /// Returns how many bytes were accepted
    pub fn push(&self, bytes: &[u8]) -> usize {
        let accepted = self.inner.lock(|queue| {
            let mut queue = queue.borrow_mut();
            let mut accepted = 0;
            for &b in bytes {
                if queue.push_back(b).is_err() {
                    break;
                }
                accepted += 1;
            }
            accepted
        });
        let lost = bytes.len() - accepted;
        if lost > 0 {
            self.dropped.fetch_add(lost as u32, Ordering::Relaxed);
        }
        accepted
    }

    pub fn drain(&self, buf: &mut [u8]) -> usize {
        self.inner.lock(|queue| {
            let mut queue = queue.borrow_mut();
            let mut n = 0;
            while n < buf.len() {
                match queue.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            n
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|queue| queue.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of bytes lost to overflow since startup
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Transport`] over an async UART transmitter and a [`ByteQueue`] filled by the receive side
pub struct QueueTransport<'q, W, const N: usize> {
    tx: W,
    rx: &'q ByteQueue<N>,
}

impl<'q, W, const N: usize> QueueTransport<'q, W, N>
where
    W: embedded_io_async::Write,
{
    pub fn new(tx: W, rx: &'q ByteQueue<N>) -> Self {
        Self { tx, rx }
    }
}

impl<'q, W, const N: usize> Transport for QueueTransport<'q, W, N>
where
    W: embedded_io_async::Write,
{
    type Error = W::Error;

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.tx.write_all(bytes).await?;
        self.tx.flush().await
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        self.rx.drain(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct SinkTx(Vec<u8>);

    impl embedded_io_async::ErrorType for SinkTx {
        type Error = core::convert::Infallible;
    }

    impl embedded_io_async::Write for SinkTx {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    #[test]
    fn queue_drops_newest_and_counts() {
        let queue = ByteQueue::<4>::new();
        assert_eq!(queue.push(b"abc"), 3);
        assert_eq!(queue.push(b"def"), 1);
        assert_eq!(queue.dropped(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(queue.drain(&mut buf), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_respects_buffer_size() {
        let queue = ByteQueue::<16>::new();
        queue.push(b"hello world");

        let mut buf = [0u8; 5];
        assert_eq!(queue.drain(&mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(queue.len(), 6);
    }

    #[test]
    fn queue_transport_writes_tx_and_reads_queue() {
        let queue = ByteQueue::<16>::new();
        let mut transport = QueueTransport::new(SinkTx(Vec::new()), &queue);

        embassy_futures::block_on(transport.write_all(b"AT\r")).unwrap();
        assert_eq!(transport.tx.0, b"AT\r");

        queue.push(b"OK\r\n");
        let mut buf = [0u8; 8];
        assert_eq!(transport.read_available(&mut buf), 4);
        assert_eq!(transport.read_available(&mut buf), 0);
    }
}
