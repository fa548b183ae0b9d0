use std::time::Duration;

use rand::Rng;

/// Pick a random initial delay in `[0, max]` at microsecond granularity.
///
/// Returns `None` when `max` is zero, meaning no delay.
pub fn fuzzy_delay<R: Rng + ?Sized>(max: Duration, rng: &mut R) -> Option<Duration> {
    if max.is_zero() {
        return None;
    }

    let upper = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    Some(Duration::from_micros(rng.random_range(0..=upper)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_max_disables_delay() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(fuzzy_delay(Duration::ZERO, &mut rng), None);
    }

    #[test]
    fn test_sub_millisecond_max_is_not_truncated() {
        let max = Duration::from_micros(800);
        let mut rng = StdRng::seed_from_u64(11);

        let delays: Vec<Duration> = (0..100)
            .map(|_| fuzzy_delay(max, &mut rng).unwrap())
            .collect();
        assert!(delays.iter().all(|d| *d <= max));
        assert!(delays.iter().any(|d| !d.is_zero()));
    }

    #[test]
    fn test_delay_is_uniform_over_range() {
        let max = Duration::from_secs(5);
        let mut rng = StdRng::seed_from_u64(20240611);
        let mut buckets = [0usize; 5];
        let mut total = Duration::ZERO;

        for _ in 0..1000 {
            let delay = fuzzy_delay(max, &mut rng).unwrap();
            assert!(delay <= max);
            total += delay;
            let bucket = ((delay.as_millis() as usize) / 1000).min(4);
            buckets[bucket] += 1;
        }

        // 200 expected per bucket, standard deviation about 12.6
        for count in buckets {
            assert!((130..=270).contains(&count), "uneven buckets: {:?}", buckets);
        }

        let mean = total.as_secs_f64() / 1000.0;
        assert!((mean - 2.5).abs() < 0.25, "mean {} too far from 2.5s", mean);
    }
}
