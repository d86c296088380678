//! Bounded polling for detached processes that have no synchronous ready
//! signal (clipboard relay pid/port files, forwarder stdout announce).

use std::thread;
use std::time::Duration;

/// The poll never produced a value within the attempt budget.
#[derive(Debug, PartialEq, Eq)]
pub struct Timeout;

/// Run `poll` up to `max_attempts` times, sleeping `interval` between
/// attempts. The first attempt runs immediately; the worst-case latency is
/// `(max_attempts - 1) * interval`, so a pending cancellation is observed no
/// later than that.
pub fn await_ready<T, F>(mut poll: F, max_attempts: u32, interval: Duration) -> Result<T, Timeout>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 0..max_attempts {
        if let Some(v) = poll() {
            return Ok(v);
        }
        if attempt + 1 < max_attempts {
            thread::sleep(interval);
        }
    }
    Err(Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_success_does_not_sleep() {
        let started = std::time::Instant::now();
        let v = await_ready(|| Some(7), 10, Duration::from_secs(1)).unwrap();
        assert_eq!(v, 7);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_succeeds_on_later_attempt() {
        let mut n = 0;
        let v = await_ready(
            || {
                n += 1;
                if n >= 3 {
                    Some(n)
                } else {
                    None
                }
            },
            5,
            Duration::from_millis(1),
        )
        .unwrap();
        assert_eq!(v, 3);
    }

    #[test]
    fn test_exhausts_attempts() {
        let mut n = 0u32;
        let r: Result<(), Timeout> = await_ready(
            || {
                n += 1;
                None
            },
            4,
            Duration::from_millis(1),
        );
        assert_eq!(r, Err(Timeout));
        assert_eq!(n, 4);
    }
}
