use std::time::Duration;

/// Running per-stage durations (preprocess, inference, postprocess).
#[derive(Debug, Default)]
pub struct TimeCalc {
    n: usize,
    duration: Vec<Duration>,
}

impl TimeCalc {
    pub fn total(&self) -> Duration {
        self.duration.iter().sum::<Duration>()
    }

    /// Number of complete rounds recorded.
    pub fn n(&self) -> usize {
        if self.duration.is_empty() {
            0
        } else {
            self.n / self.duration.len()
        }
    }

    pub fn avg(&self) -> Duration {
        match self.n() {
            0 => Duration::ZERO,
            n => self.total() / n as u32,
        }
    }

    pub fn add_or_push(&mut self, i: usize, x: Duration) {
        match self.duration.get_mut(i) {
            Some(elem) => *elem += x,
            None => {
                if i >= self.duration.len() {
                    self.duration.push(x)
                }
            }
        }
        self.n += 1;
    }

    pub fn clear(&mut self) {
        self.n = Default::default();
        self.duration = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_stage() {
        let mut t = TimeCalc::default();
        for _ in 0..2 {
            t.add_or_push(0, Duration::from_millis(2));
            t.add_or_push(1, Duration::from_millis(10));
        }
        assert_eq!(t.n(), 2);
        assert_eq!(t.total(), Duration::from_millis(24));
        assert_eq!(t.avg(), Duration::from_millis(12));
    }

    #[test]
    fn empty_has_zero_average() {
        assert_eq!(TimeCalc::default().avg(), Duration::ZERO);
    }
}
