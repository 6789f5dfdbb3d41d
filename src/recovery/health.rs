use parking_lot::Mutex;

/// Healthy/unhealthy flag per catalog position.
///
/// Positions start healthy. Cycling helpers wrap past unhealthy entries and return the starting
/// position when nothing else is healthy, so a fully broken catalog never spins.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    flags: Mutex<Vec<bool>>,
}

impl HealthRegistry {
    /// Registry for `len` positions, all healthy.
    pub fn new(len: usize) -> Self {
        Self {
            flags: Mutex::new(vec![true; len]),
        }
    }

    /// Number of tracked positions.
    pub fn len(&self) -> usize {
        self.flags.lock().len()
    }

    /// `true` when no positions are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `len` positions. New positions are healthy.
    pub fn resize(&self, len: usize) {
        self.flags.lock().resize(len, true);
    }

    /// Record the outcome of a load of `position`. Out-of-range positions are ignored.
    pub fn mark(&self, position: usize, healthy: bool) {
        let mut flags = self.flags.lock();
        if let Some(f) = flags.get_mut(position)
            && *f != healthy
        {
            *f = healthy;
            tracing::debug!(position, healthy, "health flag changed");
        }
    }

    /// Health of `position`. Untracked positions count as healthy.
    pub fn is_healthy(&self, position: usize) -> bool {
        self.flags.lock().get(position).copied().unwrap_or(true)
    }

    /// First healthy position after `from`, wrapping. Returns `from` if none is.
    pub fn next_healthy(&self, from: usize) -> usize {
        let flags = self.flags.lock();
        let len = flags.len();
        (1..=len)
            .map(|k| (from + k) % len)
            .find(|&i| flags[i])
            .unwrap_or(from)
    }

    /// First healthy position before `from`, wrapping. Returns `from` if none is.
    pub fn previous_healthy(&self, from: usize) -> usize {
        let flags = self.flags.lock();
        let len = flags.len();
        (1..=len)
            .map(|k| (from + len - (k % len)) % len)
            .find(|&i| flags[i])
            .unwrap_or(from)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recovery/health.rs"]
mod tests;
