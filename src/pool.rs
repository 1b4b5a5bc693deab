use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Scratch buffers larger than this are dropped instead of pooled
const MAX_POOLED_CAPACITY: usize = 64 * 1024;

/// Pool of reusable scratch `String`s for building filtered queries
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<String>>,
    max_buffers: usize,
}

impl BufferPool {
    pub fn new(max_buffers: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_buffers)),
            max_buffers,
        }
    }

    /// Take an empty buffer. It returns to the pool, cleared, when dropped.
    pub fn get(&self) -> PooledBuf<'_> {
        let buf = self.buffers.lock().pop().unwrap_or_default();
        PooledBuf { pool: self, buf }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    fn put(&self, mut buf: String) {
        buf.clear();
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_buffers {
            buffers.push(buf);
        }
    }
}

/// A scratch buffer borrowed from a [`BufferPool`]. Never hand it out;
/// copy the contents instead.
#[derive(Debug)]
pub struct PooledBuf<'a> {
    pool: &'a BufferPool,
    buf: String,
}

impl Deref for PooledBuf<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_cleared_on_return() {
        let pool = BufferPool::new(2);
        {
            let mut buf = pool.get();
            buf.push_str("page=1");
        }
        assert_eq!(pool.idle(), 1);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 6);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::new(1);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_zero_sized_pool_keeps_nothing() {
        let pool = BufferPool::new(0);
        drop(pool.get());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_oversized_buffer_not_pooled() {
        let pool = BufferPool::new(2);
        {
            let mut buf = pool.get();
            buf.reserve(MAX_POOLED_CAPACITY + 1);
        }
        assert_eq!(pool.idle(), 0);
    }
}
