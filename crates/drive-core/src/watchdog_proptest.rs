#[cfg(test)]
mod proptest_watchdog {
    use crate::watchdog::TargetWatchdog;
    use proptest::prelude::*;
    use std::time::Duration;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 2000,
            max_global_rejects: 65536,
            ..ProptestConfig::default()
        })]

        // Property: within the timeout of the last refresh, never expired.
        #[test]
        fn never_expired_within_timeout(
            timeout_us in 1u64..10_000_000,
            refresh_us in 0u64..1_000_000_000,
            age_us in 0u64..10_000_000,
        ) {
            prop_assume!(age_us <= timeout_us);
            let wd = TargetWatchdog::new(Duration::from_micros(timeout_us));
            wd.refresh_at(refresh_us);
            prop_assert!(!wd.expired_at(refresh_us + age_us));
        }

        // Property: strictly past the timeout, always expired.
        #[test]
        fn always_expired_past_timeout(
            timeout_us in 1u64..10_000_000,
            refresh_us in 0u64..1_000_000_000,
            excess_us in 1u64..10_000_000,
        ) {
            let wd = TargetWatchdog::new(Duration::from_micros(timeout_us));
            wd.refresh_at(refresh_us);
            prop_assert!(wd.expired_at(refresh_us + timeout_us + excess_us));
        }

        // Property: a re-arm after a forced write pushes the next expiry a
        // full timeout into the future.
        #[test]
        fn rearm_suppresses_immediate_refire(
            timeout_us in 1u64..10_000_000,
            refresh_us in 0u64..1_000_000_000,
        ) {
            let wd = TargetWatchdog::new(Duration::from_micros(timeout_us));
            wd.refresh_at(refresh_us);
            let fired_at = refresh_us + timeout_us + 1;
            prop_assert!(wd.expired_at(fired_at));
            wd.refresh_at(fired_at);
            prop_assert!(!wd.expired_at(fired_at + timeout_us));
        }
    }
}
