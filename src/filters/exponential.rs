use super::GazeFilter;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last_x: Option<f64>,
    last_y: Option<f64>,
}

impl ExponentialFilter {
    /// Create a filter with the given smoothing factor in (0, 1]
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self {
            alpha,
            last_x: None,
            last_y: None,
        }
    }
}

impl GazeFilter for ExponentialFilter {
    fn step(&mut self, x: f64, y: f64) -> (f64, f64) {
        let filtered_x = match self.last_x {
            Some(last) => self.alpha * x + (1.0 - self.alpha) * last,
            None => x,
        };

        let filtered_y = match self.last_y {
            Some(last) => self.alpha * y + (1.0 - self.alpha) * last,
            None => y,
        };

        self.last_x = Some(filtered_x);
        self.last_y = Some(filtered_y);

        (filtered_x, filtered_y)
    }

    fn reset(&mut self) {
        self.last_x = None;
        self.last_y = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
