//! Property-based tests for candidate generation and planning.
use proptest::prelude::*;
use rae_engine::{CandidateGenerator, CandidateOrder, Config, Domain, Method};
use rae_lang::{BinaryOp, Ident, Invocation, Node, Options, StateVariables, Value};

mod strategies {
    use super::*;

    /// Generates object universes of distinct integers
    pub fn universe() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::btree_set(-50i64..50, 0..8).prop_map(|set| set.into_iter().collect())
    }

    /// Generates candidate orderings
    pub fn order() -> impl Strategy<Value = CandidateOrder> {
        prop_oneof![
            Just(CandidateOrder::Declaration),
            any::<u64>().prop_map(|seed| CandidateOrder::Shuffled { seed }),
        ]
    }
}

fn ordered_pairs(objects: &[i64]) -> Domain {
    Domain::builder()
        .task("pair", Vec::<Ident>::new())
        .method(
            Method::new("m_pair", "pair", ["a", "b"]).with_precondition(Node::binary(
                BinaryOp::Lt,
                Node::local("a"),
                Node::local("b"),
            )),
        )
        .objects("numbers", objects.iter().copied())
        .build()
        .unwrap()
}

fn as_int(value: &Value) -> i64 {
    value.to_string().parse().unwrap()
}

/// `count` increments `n` once per level until it reaches `target`.
fn counting(target: i64) -> Domain {
    let n = || Node::call("n", vec![]);
    Domain::builder()
        .task("count", Vec::<Ident>::new())
        .command("inc", |state: &mut StateVariables, _: &[Value]| {
            match state.get("n", &[]).map(|n| n.binary(BinaryOp::Add, &Value::from(1))) {
                Some(Ok(next)) => {
                    state.set("n", Vec::<Value>::new(), next);
                    true
                }
                _ => false,
            }
        })
        .method(
            Method::new("m_more", "count", Vec::<Ident>::new())
                .with_precondition(Node::binary(BinaryOp::Lt, n(), Node::literal(target)))
                .with_body(Node::seq([Node::call("inc", vec![]), Node::call("count", vec![])])),
        )
        .method(
            Method::new("m_enough", "count", Vec::<Ident>::new())
                .with_precondition(Node::binary(BinaryOp::Gte, n(), Node::literal(target))),
        )
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every candidate satisfies its precondition and none is missing
    #[test]
    fn candidates_are_exactly_the_satisfying_bindings(objects in strategies::universe(), order in strategies::order()) {
        let domain = ordered_pairs(&objects);
        let mut generator = CandidateGenerator::new(order, Options::default());
        let candidates = generator
            .generate(&domain, &Invocation::new("pair", Vec::<Value>::new()), &StateVariables::new())
            .unwrap();

        let pairs: Vec<(i64, i64)> = candidates
            .iter()
            .map(|c| (as_int(c.binding.get("a").unwrap()), as_int(c.binding.get("b").unwrap())))
            .collect();
        let mut expected = Vec::new();
        for &a in &objects {
            for &b in &objects {
                if a < b {
                    expected.push((a, b));
                }
            }
        }

        prop_assert!(pairs.iter().all(|(a, b)| a < b));
        prop_assert_eq!(pairs, expected);
    }

    /// Planning twice from the same state yields the same plan and state
    #[test]
    fn planning_is_idempotent(start in 0i64..5, target in 0i64..8, memoize in any::<bool>()) {
        let domain = counting(target);
        let mut config = Config::default();
        config.planner.memoize = memoize;
        let count = Invocation::new("count", Vec::<Value>::new());
        let plan = || {
            let mut state = StateVariables::new();
            state.set("n", Vec::<Value>::new(), start);
            let plan = rae_engine::plan(&domain, &mut state, &count, &config).unwrap();
            (plan, state)
        };

        let (first, first_state) = plan();
        let (second, second_state) = plan();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first_state, &second_state);

        let first = first.unwrap();
        prop_assert_eq!(first.len() as i64, (target - start).max(0));
        prop_assert_eq!(first_state.get("n", &[]), Some(&Value::from(start.max(target))));
    }
}
