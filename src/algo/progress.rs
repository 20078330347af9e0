//! Progress reporting for long-running stages.
//!
//! Smoothing iterations and pipeline stages report through a [`Progress`]
//! callback so that a front end can render a bar or log lines.
//!
//! # Example
//!
//! ```
//! use burnish::algo::progress::Progress;
//! use burnish::algo::smooth::{taubin_smooth_with_progress, SmoothOptions};
//! use burnish::mesh::primitives::icosphere;
//!
//! let progress = Progress::new(|current, total, message| {
//!     println!("[{}/{}] {}", current, total, message);
//! });
//!
//! let mesh = icosphere(1.0, 1);
//! let smoothed = taubin_smooth_with_progress(&mesh, &SmoothOptions::default(), &progress).unwrap();
//! assert_eq!(smoothed.num_vertices(), mesh.num_vertices());
//! ```

use std::sync::Arc;

/// A progress callback. Clones share the same callback.
///
/// The callback receives:
/// - `current`: steps completed so far
/// - `total`: total number of steps
/// - `message`: what is being done
#[derive(Clone)]
pub struct Progress {
    callback: Arc<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a progress reporter from a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report progress of a sub-task occupying one step of an outer task.
    ///
    /// `sub_current / sub_total` is mapped into the slice
    /// `[outer_current, outer_current + 1)` of `outer_total` steps, in
    /// thousandths. The pipeline uses this to let smoothing iterations advance
    /// the bar inside the smoothing stage.
    #[inline]
    pub fn report_sub(
        &self,
        sub_current: usize,
        sub_total: usize,
        outer_current: usize,
        outer_total: usize,
        message: &str,
    ) {
        if sub_total == 0 || outer_total == 0 {
            return;
        }
        let fraction = (sub_current.min(sub_total) * 1000) / sub_total;
        (self.callback)(outer_current * 1000 + fraction, outer_total * 1000, message);
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_sub_maps_into_slice() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |current, total, _| {
            sink.lock().unwrap().push((current, total));
        });

        progress.report_sub(1, 2, 1, 4, "smoothing");
        progress.report_sub(0, 0, 1, 4, "ignored");

        assert_eq!(*seen.lock().unwrap(), vec![(1500, 4000)]);
    }
}
