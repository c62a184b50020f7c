#![cfg(not(loom))]

use hazard_sort::{IdlePolicy, Sorter, SorterConfig};
use proptest::prelude::*;

fn sorter(max_workers: usize, idle: IdlePolicy) -> Sorter {
    Sorter::new(
        SorterConfig::default()
            .with_max_workers(max_workers)
            .with_idle(idle),
    )
}

fn idle_policy() -> impl Strategy<Value = IdlePolicy> {
    prop_oneof![
        Just(IdlePolicy::Yield),
        Just(IdlePolicy::Spin),
        Just(IdlePolicy::Snooze),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn output_is_an_ordered_permutation(
        data in proptest::collection::vec(any::<i16>(), 0..200),
        workers in 0usize..4,
        idle in idle_policy(),
    ) {
        let mut expected = data.clone();
        expected.sort_unstable();

        let outcome = sorter(workers, idle).execute(data, |a, b| a < b).unwrap();
        prop_assert_eq!(&outcome.sorted, &expected);
        prop_assert_eq!(outcome.report.workers_running, 0);
        prop_assert_eq!(outcome.report.hazard_slots_owned, 0);
        prop_assert!(outcome.report.workers_spawned <= workers);
    }

    #[test]
    fn sorting_twice_changes_nothing(
        data in proptest::collection::vec(0u8..16, 0..150),
    ) {
        let s = sorter(2, IdlePolicy::Yield);
        let once = s.sort(data).unwrap();
        let twice = s.sort(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn custom_order_is_respected(
        data in proptest::collection::vec(any::<u32>(), 0..150),
    ) {
        let sorted = sorter(3, IdlePolicy::Snooze)
            .sort_by(data.clone(), |a, b| b.cmp(a))
            .unwrap();
        prop_assert!(sorted.windows(2).all(|w| w[0] >= w[1]));
        prop_assert_eq!(sorted.len(), data.len());
    }

    #[test]
    fn records_keep_their_payloads(
        keys in proptest::collection::vec(0u8..8, 1..120),
    ) {
        let records: Vec<(u8, usize)> = keys.iter().copied().zip(0..).collect();
        let sorted = sorter(2, IdlePolicy::Yield)
            .sort_by_less(records.clone(), |a, b| a.0 < b.0)
            .unwrap();

        prop_assert!(sorted.windows(2).all(|w| w[0].0 <= w[1].0));
        let mut payloads: Vec<usize> = sorted.iter().map(|r| r.1).collect();
        payloads.sort_unstable();
        prop_assert_eq!(payloads, (0..records.len()).collect::<Vec<_>>());
    }
}
