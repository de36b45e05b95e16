//! Property-based tests for the weft scheduler.
//!
//! Uses proptest to drive random spawn/destroy sequences and verify the
//! slot-table invariants hold at every step.

use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;
use weft::{CoroutineStatus, SchedulerConfig};

const CEILING: usize = 32;

#[derive(Debug, Clone)]
enum Op {
    Spawn,
    Destroy(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Spawn),
        2 => (0usize..CEILING).prop_map(Op::Destroy),
    ]
}

proptest! {
    /// Occupancy accounting, id uniqueness and capacity bounds survive any
    /// interleaving of spawns and destroys.
    #[test]
    fn slot_accounting_stays_consistent(ops in proptest::collection::vec(op(), 1..200)) {
        let config = SchedulerConfig::builder()
            .stack_limit(64 * 1024)
            .initial_slots(4)
            .max_slots(CEILING)
            .build()
            .unwrap();
        let mut sched = weft::open_with(config).unwrap();
        let mut live: HashSet<_> = HashSet::new();

        for op in ops {
            match op {
                Op::Spawn => match sched.spawn_fn(|_cx| {}) {
                    Ok(id) => {
                        prop_assert!(live.insert(id), "{} handed out twice", id);
                        prop_assert!(id.index() < sched.capacity());
                        prop_assert_eq!(sched.status(id), CoroutineStatus::Ready);
                        prop_assert!(!sched.is_fatal(id));
                    }
                    Err(_) => {
                        prop_assert_eq!(live.len(), CEILING);
                        prop_assert_eq!(sched.capacity(), CEILING);
                    }
                },
                Op::Destroy(pick) => {
                    if live.is_empty() {
                        continue;
                    }
                    let mut ids: Vec<_> = live.iter().copied().collect();
                    ids.sort_by_key(|id| id.index());
                    let target = ids[pick % ids.len()];
                    prop_assert!(sched.destroy(target));
                    prop_assert!(!sched.exists(target));
                    prop_assert_eq!(sched.status(target), CoroutineStatus::Dead);
                    live.remove(&target);
                }
            }
            prop_assert_eq!(sched.live_count(), live.len());
            prop_assert!(sched.capacity() >= 4);
            prop_assert!(sched.capacity() <= CEILING);
        }

        // An idle sweep with a generous lifetime reclaims nothing.
        prop_assert_eq!(sched.sweep(CEILING * 2, Duration::from_secs(3600)), 0);
        prop_assert_eq!(sched.live_count(), live.len());
    }

    /// Once every record is destroyed, a table-sized batch of spawns lands
    /// on exactly the same slot indexes again.
    #[test]
    fn destroyed_ids_become_reusable(count in 1usize..16) {
        let config = SchedulerConfig::builder()
            .stack_limit(64 * 1024)
            .initial_slots(count)
            .max_slots(count)
            .build()
            .unwrap();
        let mut sched = weft::open_with(config).unwrap();

        let first: Vec<_> = (0..count)
            .map(|_| sched.spawn_fn(|_cx| {}).unwrap())
            .collect();
        for id in &first {
            prop_assert!(sched.destroy(*id));
        }
        prop_assert_eq!(sched.live_count(), 0);

        let second: Vec<_> = (0..count)
            .map(|_| sched.spawn_fn(|_cx| {}).unwrap())
            .collect();
        prop_assert_eq!(sched.capacity(), count);

        let mut a: Vec<_> = first.iter().map(|id| id.index()).collect();
        let mut b: Vec<_> = second.iter().map(|id| id.index()).collect();
        a.sort_unstable();
        b.sort_unstable();
        prop_assert_eq!(a, b);
    }
}
