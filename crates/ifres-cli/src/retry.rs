//! Retry policies for waiting on a module to load.
//!
//! The library never retries; these strategies let the CLI decide how long
//! a `ModuleNotLoaded` failure is worth waiting out.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use ifres::{Error, ResolvedInterface};
use tracing::{debug, info};

/// How a [`Interrupt::pause`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Elapsed,
    Interrupted,
}

/// Cancellation flag for retry waits, raised from the Ctrl-C handler.
#[derive(Debug, Default)]
pub struct Interrupt {
    raised: Mutex<bool>,
    wake: Condvar,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        *self.raised.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `delay`, waking early once the interrupt is raised
    pub fn pause(&self, delay: Duration) -> Pause {
        let raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        let (raised, _) = self
            .wake
            .wait_timeout_while(raised, delay, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);

        if *raised {
            Pause::Interrupted
        } else {
            Pause::Elapsed
        }
    }
}

/// Result of a retried resolution
#[derive(Debug)]
pub enum Outcome {
    Resolved {
        interface: ResolvedInterface,
        attempts: u32,
    },
    /// Ctrl-C arrived before the module loaded
    Interrupted { attempts: u32, waited: Duration },
}

/// Decides whether and how long to wait before the next attempt.
pub trait RetryStrategy {
    /// Delay before attempt `attempt + 1`, or `None` to give up.
    /// `attempt` counts completed attempts, starting at 1.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;
}

/// Never retry
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Same delay between every attempt
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: u32,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.delay)
    }
}

/// Doubling delay, capped at `max`
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    max_attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max,
            max_attempts,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        Some(self.initial.saturating_mul(factor).min(self.max))
    }
}

/// Run `resolve` until it succeeds, fails permanently, or the strategy gives up.
///
/// Only retryable failures (module not loaded yet) are retried.
pub fn resolve_with_retry<F>(
    mut resolve: F,
    strategy: &mut dyn RetryStrategy,
    interrupt: &Interrupt,
) -> Result<Outcome>
where
    F: FnMut() -> ifres::Result<ResolvedInterface>,
{
    let mut attempts = 0u32;
    let mut waited = Duration::ZERO;

    while !interrupt.is_raised() {
        attempts += 1;

        let err: Error = match resolve() {
            Ok(interface) => {
                return Ok(Outcome::Resolved {
                    interface,
                    attempts,
                });
            }
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e.into()),
        };

        let Some(delay) = strategy.next_delay(attempts) else {
            bail!("Giving up after {} attempts: {}", attempts, err);
        };

        info!(
            "{}, retrying in {}ms (attempt {})",
            err,
            delay.as_millis(),
            attempts
        );

        let started = Instant::now();
        let pause = interrupt.pause(delay);
        waited += started.elapsed();
        if pause == Pause::Interrupted {
            break;
        }
    }

    debug!("Retry interrupted after {} attempts", attempts);
    Ok(Outcome::Interrupted { attempts, waited })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::thread;

    fn not_loaded() -> Error {
        Error::ModuleNotLoaded {
            module: "client.dll".to_string(),
            interface: Some("Source2Client002".to_string()),
        }
    }

    fn resolved() -> ResolvedInterface {
        ResolvedInterface {
            module_name: "client.dll".to_string(),
            interface_name: "Source2Client002".to_string(),
            address: 0x7FF6_01E2_D410,
            resolved_at: Default::default(),
        }
    }

    #[test]
    fn test_fixed_delay() {
        let mut strategy = FixedDelay::new(Duration::from_millis(100), 3);
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(3), None);
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(500), 10);
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(strategy.next_delay(3), Some(Duration::from_millis(400)));
        assert_eq!(strategy.next_delay(4), Some(Duration::from_millis(500)));
        assert_eq!(strategy.next_delay(40), None);
    }

    #[test]
    fn test_exponential_backoff_large_attempt_does_not_overflow() {
        let mut strategy =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), u32::MAX);
        assert_eq!(strategy.next_delay(100), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retries_until_module_loads() {
        let calls = Cell::new(0);
        let interrupt = Interrupt::new();
        let mut strategy = FixedDelay::new(Duration::from_millis(1), 10);

        let result = resolve_with_retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(not_loaded())
                } else {
                    Ok(resolved())
                }
            },
            &mut strategy,
            &interrupt,
        )
        .unwrap();

        match result {
            Outcome::Resolved {
                interface,
                attempts,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(interface.address, 0x7FF6_01E2_D410);
            }
            other => panic!("expected Resolved, got {:?}", other),
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let calls = Cell::new(0);
        let interrupt = Interrupt::new();
        let mut strategy = FixedDelay::new(Duration::from_millis(1), 10);

        let result = resolve_with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(Error::StaleOffsets {
                    module: "client.dll".to_string(),
                    interface: None,
                    expected: "pe-header:00".to_string(),
                    actual: "pe-header:01".to_string(),
                })
            },
            &mut strategy,
            &interrupt,
        );

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_gives_up_when_strategy_is_exhausted() {
        let calls = Cell::new(0);
        let interrupt = Interrupt::new();

        let result = resolve_with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(not_loaded())
            },
            &mut NoRetry,
            &interrupt,
        );

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_raised_interrupt_skips_resolution() {
        let interrupt = Interrupt::new();
        interrupt.raise();
        let mut strategy = FixedDelay::new(Duration::from_secs(10), 10);

        let result =
            resolve_with_retry(|| Err(not_loaded()), &mut strategy, &interrupt).unwrap();
        assert!(matches!(
            result,
            Outcome::Interrupted { attempts: 0, waited } if waited == Duration::ZERO
        ));
    }

    #[test]
    fn test_interrupt_ends_a_pending_wait() {
        let interrupt = Arc::new(Interrupt::new());
        let waiter = {
            let interrupt = Arc::clone(&interrupt);
            thread::spawn(move || {
                let mut strategy = FixedDelay::new(Duration::from_secs(30), 10);
                resolve_with_retry(|| Err(not_loaded()), &mut strategy, &interrupt)
            })
        };

        thread::sleep(Duration::from_millis(50));
        interrupt.raise();

        match waiter.join().unwrap().unwrap() {
            Outcome::Interrupted { attempts, waited } => {
                assert_eq!(attempts, 1);
                assert!(waited < Duration::from_secs(10));
            }
            other => panic!("expected Interrupted, got {:?}", other),
        }
    }

    #[test]
    fn test_pause_elapses_without_interrupt() {
        let interrupt = Interrupt::new();
        let started = Instant::now();

        assert_eq!(interrupt.pause(Duration::from_millis(20)), Pause::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
