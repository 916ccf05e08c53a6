/// Centered moving-average smoothing for per-frame channel series
/// Edges are padded by replicating the first/last sample so the output keeps
/// the input length and boundary samples are not pulled toward zero.
#[derive(Clone, Copy, Debug)]
pub struct MovingAverage {
    window_size: usize,
}

/// Series shorter than this are returned unchanged
pub const MIN_SMOOTHING_LEN: usize = 3;

/// Largest accepted window; wider requests are clamped
pub const MAX_SMOOTHING_WINDOW: usize = 999;

impl MovingAverage {
    /// Create a smoother with the given window (typically 7).
    /// Even windows are widened to the next odd size to stay centered.
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.min(MAX_SMOOTHING_WINDOW);
        let window_size = if window_size % 2 == 0 {
            window_size.saturating_add(1)
        } else {
            window_size
        };
        MovingAverage { window_size }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Smooth a full series, returning a new series of equal length
    pub fn apply(&self, samples: &[f64]) -> Vec<f64> {
        let n = samples.len();
        if n < MIN_SMOOTHING_LEN || self.window_size <= 1 {
            return samples.to_vec();
        }

        let half = self.window_size / 2;
        let first = samples[0];
        let last = samples[n - 1];

        let mut padded = Vec::with_capacity(n + 2 * half);
        padded.extend(std::iter::repeat(first).take(half));
        padded.extend_from_slice(samples);
        padded.extend(std::iter::repeat(last).take(half));

        // Running sum over the padded buffer
        let width = self.window_size as f64;
        let mut sum: f64 = padded[..self.window_size].iter().sum();
        let mut smoothed = Vec::with_capacity(n);
        smoothed.push(sum / width);
        for i in 1..n {
            sum += padded[i + self.window_size - 1] - padded[i - 1];
            smoothed.push(sum / width);
        }

        smoothed
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_series_unchanged() {
        let smoother = MovingAverage::default();
        let input = vec![42.5; 25];
        let output = smoother.apply(&input);
        assert_eq!(output.len(), input.len());
        for v in output {
            assert!((v - 42.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_length_preserved() {
        let smoother = MovingAverage::new(7);
        for n in 0..20 {
            let input: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
            assert_eq!(smoother.apply(&input).len(), n);
        }
    }

    #[test]
    fn test_short_series_is_identity() {
        let smoother = MovingAverage::new(7);
        assert_eq!(smoother.apply(&[1.0, 9.0]), vec![1.0, 9.0]);
        assert!(smoother.apply(&[]).is_empty());
    }

    #[test]
    fn test_edge_replication() {
        let smoother = MovingAverage::new(3);
        let output = smoother.apply(&[0.0, 3.0, 6.0, 9.0]);
        // [0, 0, 3] / 3 at the left edge, [6, 9, 9] / 3 at the right
        assert!((output[0] - 1.0).abs() < 1e-9);
        assert!((output[1] - 3.0).abs() < 1e-9);
        assert!((output[2] - 6.0).abs() < 1e-9);
        assert!((output[3] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_spike_is_spread() {
        let smoother = MovingAverage::new(5);
        let mut input = vec![0.0; 11];
        input[5] = 10.0;
        let output = smoother.apply(&input);
        assert!((output[5] - 2.0).abs() < 1e-9);
        assert!((output[3] - 2.0).abs() < 1e-9);
        assert_eq!(output[0], 0.0);
    }

    #[test]
    fn test_even_window_widened() {
        assert_eq!(MovingAverage::new(4).window_size(), 5);
        assert_eq!(MovingAverage::new(7).window_size(), 7);
    }

    #[test]
    fn test_oversized_window_clamped() {
        let smoother = MovingAverage::new(usize::MAX);
        assert_eq!(smoother.window_size(), MAX_SMOOTHING_WINDOW);
        let output = smoother.apply(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(output.len(), 4);
        assert!(output.iter().all(|v| v.is_finite()));
    }
}
