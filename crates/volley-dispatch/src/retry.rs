// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential retry backoff.

use std::time::Duration;

/// Delay before the retry that follows failed attempt `attempt` (1-based):
/// `base × 2^(attempt-1)`. Attempt 1 waits the base delay, attempt 2
/// twice that, attempt 3 four times.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_per_attempt() {
        let base = Duration::from_secs(60);
        assert_eq!(backoff_delay(1, base), Duration::from_secs(60));
        assert_eq!(backoff_delay(2, base), Duration::from_secs(120));
        assert_eq!(backoff_delay(3, base), Duration::from_secs(240));
    }

    proptest! {
        #[test]
        fn strictly_doubles_and_stays_positive(
            attempt in 1u32..20,
            base_secs in 1u64..3600,
        ) {
            let base = Duration::from_secs(base_secs);
            let delay = backoff_delay(attempt, base);
            prop_assert!(delay >= base);
            prop_assert_eq!(delay, base * 2u32.pow(attempt - 1));
            let next = backoff_delay(attempt + 1, base);
            prop_assert_eq!(next, delay * 2);
        }
    }
}
