//! Bar-to-seconds interpolation.
//!
//! The playalong sync list is a sparse mapping from fractional bar
//! positions to seconds. [`BarToTime`] interpolates piecewise linearly
//! inside the sampled range, extrapolates linearly from the two nearest
//! samples beyond either end, and quantises every result down to whole
//! milliseconds.

use super::ScoreError;

/// The piecewise-linear bar-position → seconds function.
#[derive(Debug, Clone, PartialEq)]
pub struct BarToTime {
    offset: f64,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl BarToTime {
    /// Builds the function from `(bar_position, seconds)` samples and the
    /// global time offset.
    pub fn new(
        mapping: impl IntoIterator<Item = (f64, f64)>,
        offset: f64,
    ) -> Result<Self, ScoreError> {
        let mut samples: Vec<(f64, f64)> = mapping.into_iter().collect();
        if samples.is_empty() {
            return Err(ScoreError::EmptySync);
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (xs, ys) = samples.into_iter().unzip();
        Ok(Self { offset, xs, ys })
    }

    /// The global time offset the function was built with.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    fn extrapolate(z: f64, xs: &[f64], ys: &[f64]) -> f64 {
        let (x1, x2) = (xs[0], xs[1]);
        let (y1, y2) = (ys[0], ys[1]);
        let alpha = (y2 - y1) / (x2 - x1);
        y1 + alpha * (z - x1)
    }

    fn interpolate(&self, z: f64) -> f64 {
        let n = self.xs.len();
        if n == 1 {
            return self.ys[0];
        }
        if z < self.xs[0] {
            return Self::extrapolate(z, &self.xs[..2], &self.ys[..2]);
        }
        if z > self.xs[n - 1] {
            return Self::extrapolate(z, &self.xs[n - 2..], &self.ys[n - 2..]);
        }
        let hi = self.xs.partition_point(|&x| x < z).min(n - 1).max(1);
        let (x1, x2) = (self.xs[hi - 1], self.xs[hi]);
        let (y1, y2) = (self.ys[hi - 1], self.ys[hi]);
        if x2 == x1 {
            return y1;
        }
        y1 + (y2 - y1) * (z - x1) / (x2 - x1)
    }

    /// Evaluates the function at a bar position, in seconds relative to
    /// the offset, floored to milliseconds.
    #[must_use]
    pub fn at(&self, z: f64) -> f64 {
        let t = self.interpolate(z);
        ((1000.0 * (t - self.offset)).floor()) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn simple() -> BarToTime {
        BarToTime::new([(0.0, 0.0), (4.0, 8.0)], -10.0).unwrap()
    }

    #[test]
    fn interpolates_inside_the_range() {
        assert_eq!(simple().at(2.0), 14.0);
    }

    #[test]
    fn extrapolates_past_both_ends() {
        assert_eq!(simple().at(6.0), 22.0);
        assert_eq!(simple().at(-1.0), 8.0);
    }

    #[test]
    fn quantises_down_to_milliseconds() {
        let f = BarToTime::new([(0.0, 0.0), (3.0, 1.0)], 0.0).unwrap();
        // 1/3 s becomes 0.333, not 0.33333… and not 0.334.
        assert_eq!(f.at(1.0), 0.333);
    }

    #[test]
    fn monotone_over_the_sampled_range() {
        let f = BarToTime::new([(0.0, 0.0), (1.0, 2.0), (4.0, 9.5), (6.0, 12.0)], -10.0).unwrap();
        let mut previous = f.at(-2.0);
        for i in 0..100 {
            let z = -2.0 + 0.1 * f64::from(i);
            let t = f.at(z);
            assert!(t >= previous, "not monotone at {z}: {t} < {previous}");
            previous = t;
        }
    }

    #[test]
    fn empty_sync_is_rejected() {
        assert_eq!(
            BarToTime::new([], -10.0).unwrap_err(),
            ScoreError::EmptySync
        );
    }
}
