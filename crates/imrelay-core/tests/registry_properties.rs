//! Property-based tests for ConnectionRegistry
//!
//! The online count must track the set of distinct registered user ids for
//! every sequence of register/unregister calls.

use std::collections::HashSet;

use imrelay_core::{Connection, ConnectionRegistry};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Register(u8),
    Unregister(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Register),
        (0u8..6).prop_map(Op::Unregister),
    ]
}

fn user(id: u8) -> String {
    format!("user{id}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: online count equals the number of distinct registered ids
    #[test]
    fn prop_online_count_matches_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let registry = ConnectionRegistry::new();
        let mut model: HashSet<String> = HashSet::new();

        for op in ops {
            match op {
                Op::Register(id) => {
                    let (conn, _rx) = Connection::channel(user(id), 1);
                    let replaced = registry.register(conn).is_some();
                    prop_assert_eq!(replaced, !model.insert(user(id)));
                }
                Op::Unregister(id) => {
                    let removed = registry.unregister(&user(id)).is_some();
                    prop_assert_eq!(removed, model.remove(&user(id)));
                }
            }
            prop_assert_eq!(registry.online_count(), model.len());
        }

        let mut ids = registry.user_ids();
        ids.sort();
        let mut expected: Vec<String> = model.into_iter().collect();
        expected.sort();
        prop_assert_eq!(ids, expected);
    }

    /// Property: re-registering a present id never changes the count
    #[test]
    fn prop_reregister_keeps_count(id in 0u8..6, times in 1usize..10) {
        let registry = ConnectionRegistry::new();

        for _ in 0..times {
            let (conn, _rx) = Connection::channel(user(id), 1);
            registry.register(conn);
            prop_assert_eq!(registry.online_count(), 1);
        }
    }
}
