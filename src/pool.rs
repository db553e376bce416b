// ============================================================================
// BUFFER POOL — recycle scratch planes to avoid per-operation allocation
// ============================================================================

use std::collections::HashMap;

/// A pool of zero-initialised byte planes keyed by length.
///
/// Flood fill and hole protection need a `width * height` visited bitmap on
/// every call. Planes go back into the pool when the operation ends and the
/// next operation on an image of the same size reuses them.
pub struct BufferPool {
    pool: HashMap<usize, Vec<Vec<u8>>>,
    /// Maximum number of planes to keep per length.
    max_per_key: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            pool: HashMap::new(),
            max_per_key: 4,
        }
    }

    /// Hand out a plane of `len` zero bytes, recycled when possible.
    pub fn acquire(&mut self, len: usize) -> Vec<u8> {
        match self.pool.get_mut(&len).and_then(|v| v.pop()) {
            Some(mut buf) => {
                buf.fill(0);
                buf
            }
            None => vec![0u8; len],
        }
    }

    /// Return a plane for reuse. Dropped if the pool is full for its length.
    pub fn release(&mut self, buf: Vec<u8>) {
        let entry = self.pool.entry(buf.len()).or_default();
        if entry.len() < self.max_per_key {
            entry.push(buf);
        }
    }

    /// Drop all pooled planes (e.g. when a new image with other dimensions loads).
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    pub fn pooled_count(&self) -> usize {
        self.pool.values().map(|v| v.len()).sum()
    }

    pub fn pooled_bytes(&self) -> usize {
        self.pool.iter().map(|(len, planes)| len * planes.len()).sum()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_planes_come_back_zeroed() {
        let mut pool = BufferPool::new();
        let mut buf = pool.acquire(16);
        buf[3] = 9;
        let ptr = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.pooled_count(), 1);

        let again = pool.acquire(16);
        assert_eq!(again.as_ptr(), ptr);
        assert!(again.iter().all(|&b| b == 0));
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn pool_is_bounded_per_length() {
        let mut pool = BufferPool::new();
        for _ in 0..10 {
            pool.release(vec![0u8; 8]);
        }
        assert_eq!(pool.pooled_count(), 4);
        assert_eq!(pool.pooled_bytes(), 32);
        pool.clear();
        assert_eq!(pool.pooled_count(), 0);
    }
}
