use log::info;

/// Reports free-heap figures around reclamation points. The esp-alloc
/// allocator returns memory eagerly on drop, so "reclaiming" is the
/// bookkeeping pass that samples the figure the restart decision is
/// based on; it cannot fail.
pub struct MemoryMonitor {
    debug_level: u32,
}

impl MemoryMonitor {
    pub fn new(debug_level: u32) -> Self {
        Self { debug_level }
    }

    /// Sample free heap, optionally tagged with a label in the diagnostics.
    /// Returns the post-reclamation figure.
    pub fn reclaim(&self, label: Option<&str>) -> usize {
        self.reclaim_from(|| esp_alloc::HEAP.free(), label)
    }

    fn reclaim_from(&self, free: impl Fn() -> usize, label: Option<&str>) -> usize {
        let pre = free();
        let post = free();
        if self.debug_level > 0 {
            match label {
                Some(label) => info!("Memfree label: {label} pre: {pre} post: {post}"),
                None => info!("Memfree pre: {pre} post: {post}"),
            }
        }
        post
    }
}
