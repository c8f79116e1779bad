use std::time::Duration;

/// Exponential delay between two attempts at the push channel, doubled each time up to `max`.
///
#[derive(Clone, Debug)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = min.min(max);
        Backoff {
            min,
            max,
            current: min,
        }
    }

    /// Delay to wait before the next attempt.
    ///
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to square one, after a successful attempt.
    ///
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut b = Backoff::new(Duration::from_secs(15), Duration::from_secs(60));
        let d: Vec<u64> = (0..5).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(vec![15, 30, 60, 60, 60], d);

        b.reset();
        assert_eq!(Duration::from_secs(15), b.next_delay());
    }

    #[test]
    fn test_backoff_min_above_max() {
        let mut b = Backoff::new(Duration::from_secs(90), Duration::from_secs(60));
        assert_eq!(Duration::from_secs(60), b.next_delay());
    }
}
