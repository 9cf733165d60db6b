//! Sliding audio window with trailing overlap.

/// Append-only sample accumulator drained in window-sized passes.
///
/// Blocks accumulate until at least `window_size` samples are present;
/// [`take_window`](SlidingWindow::take_window) then hands the entire buffer
/// over and keeps only the trailing `overlap_size` samples, so words split
/// across a window boundary appear in both transcription passes. Owned and
/// mutated by the consumer task only.
#[derive(Debug)]
pub struct SlidingWindow {
    samples: Vec<f32>,
    window_size: usize,
    overlap_size: usize,
}

impl SlidingWindow {
    pub fn new(window_size: usize, overlap_size: usize) -> Self {
        Self {
            samples: Vec::with_capacity(window_size + overlap_size),
            window_size,
            overlap_size,
        }
    }

    pub fn extend(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The entire accumulated buffer once it has reached `window_size`,
    /// `None` while still filling.
    ///
    /// After a take exactly the trailing `overlap_size` samples remain, or
    /// none when the taken window was shorter than the overlap.
    pub fn take_window(&mut self) -> Option<Vec<f32>> {
        if self.samples.len() < self.window_size {
            return None;
        }
        let window = std::mem::take(&mut self.samples);
        if window.len() >= self.overlap_size {
            self.samples
                .extend_from_slice(&window[window.len() - self.overlap_size..]);
        }
        Some(window)
    }
}
