use std::sync::{Arc, Mutex};

/// Size classes a [`BufferPool`] recycles. Requests below [`BYPASS_THRESHOLD`]
/// skip the pool entirely; requests above the largest class allocate directly.
const CLASSES: [usize; 4] = [32 * 1024, 128 * 1024, 512 * 1024, 2 * 1024 * 1024];
const BYPASS_THRESHOLD: usize = 1024;

/// A leased buffer. Callers must call [`Lease::release`] on every path to
/// return the backing allocation to its pool; a dropped, unreleased lease
/// leaks capacity but never violates memory safety.
pub struct Lease {
    buf: Vec<u8>,
    class: Option<usize>,
    pool: Option<Arc<BufferPoolInner>>,
}

impl Lease {
    fn direct(buf: Vec<u8>) -> Self {
        Self { buf, class: None, pool: None }
    }

    pub fn as_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    #[cfg(test)]
    fn class(&self) -> Option<usize> {
        self.class
    }

    /// Zero the buffer and return it to its size class. No-op for
    /// directly-allocated (bypass) leases.
    pub fn release(mut self) {
        if let (Some(class), Some(pool)) = (self.class, self.pool.take()) {
            let mut buf = std::mem::take(&mut self.buf);
            buf.iter_mut().for_each(|b| *b = 0);
            buf.clear();
            pool.put(class, buf);
        }
    }
}

struct BufferPoolInner {
    shelves: [Mutex<Vec<Vec<u8>>>; 4],
}

impl BufferPoolInner {
    fn put(&self, class: usize, buf: Vec<u8>) {
        self.shelves[class].lock().unwrap().push(buf);
    }
}

/// Tiered, process-wide buffer pool for decompressed output. See [`CLASSES`].
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                shelves: [
                    Mutex::new(Vec::new()),
                    Mutex::new(Vec::new()),
                    Mutex::new(Vec::new()),
                    Mutex::new(Vec::new()),
                ],
            }),
        }
    }

    fn class_for(min_size: usize) -> Option<usize> {
        CLASSES.iter().position(|&c| c >= min_size)
    }

    /// Lease a buffer with at least `min_size` capacity. Bypasses the pool
    /// for requests below [`BYPASS_THRESHOLD`] or above the largest class.
    pub fn get(&self, min_size: usize) -> Lease {
        if min_size < BYPASS_THRESHOLD {
            return Lease::direct(Vec::with_capacity(min_size));
        }
        let Some(class) = Self::class_for(min_size) else {
            return Lease::direct(Vec::with_capacity(min_size));
        };
        let mut shelf = self.inner.shelves[class].lock().unwrap();
        let buf = shelf.pop().unwrap_or_else(|| Vec::with_capacity(CLASSES[class]));
        drop(shelf);
        Lease { buf, class: Some(class), pool: Some(self.inner.clone()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_requests_bypass_pool() {
        let pool = BufferPool::new();
        let lease = pool.get(100);
        assert!(lease.class().is_none());
    }

    #[test]
    fn oversized_requests_bypass_pool() {
        let pool = BufferPool::new();
        let lease = pool.get(4 * 1024 * 1024);
        assert!(lease.class().is_none());
    }

    #[test]
    fn mid_size_requests_use_smallest_fitting_class() {
        let pool = BufferPool::new();
        let lease = pool.get(50_000);
        assert_eq!(lease.class(), Some(1)); // 128K class
    }

    #[test]
    fn released_buffer_is_reused() {
        let pool = BufferPool::new();
        let lease = pool.get(20_000);
        lease.release();
        let second = pool.get(20_000);
        assert_eq!(second.class(), Some(0));
    }
}
