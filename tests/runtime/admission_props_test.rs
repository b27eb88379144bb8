/*!
 * Admission Property Tests
 * Vehicle bound and spawn-or-enqueue rule across random create sequences
 */

use crate::common::{drain, Gate};
use proptest::prelude::*;
use uthread_runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_vehicles_bounded_and_queue_only_when_saturated(
        max_vehicles in 1usize..4,
        creates in 0usize..12,
    ) {
        let runtime = Runtime::new();
        runtime.initialize(max_vehicles).unwrap();
        let gate = Gate::new();

        for n in 1..=creates {
            let g = gate.clone();
            runtime.create_thread(move || g.wait()).unwrap();

            let stats = runtime.stats().unwrap();
            prop_assert!(stats.active_vehicles <= max_vehicles);
            prop_assert_eq!(stats.active_vehicles, n.min(max_vehicles));
            prop_assert_eq!(stats.waiting_user_threads, n.saturating_sub(max_vehicles));
            prop_assert!(stats.waiting_user_threads == 0 || stats.saturated());
            prop_assert_eq!(
                stats.running_user_threads + stats.waiting_user_threads,
                stats.active_user_threads
            );
        }

        gate.open();
        drain(&runtime);
        let stats = runtime.stats().unwrap();
        prop_assert_eq!(stats.threads_exited, creates as u64);
        prop_assert_eq!(stats.active_vehicles, 0);
    }
}
