use std::collections::BTreeSet;
use std::sync::Arc;

use marco_core::{ConstraintStore, Interrupt, MarcoError};
use marco_enum::{Aim, EnumConfig, Enumerator, Maximize, Outcome, ResultKind};
use marco_subset::InProcessSolver;
use proptest::prelude::*;

fn store(groups: Vec<Vec<Vec<i32>>>) -> Arc<ConstraintStore> {
    Arc::new(ConstraintStore::from_groups(groups).unwrap())
}

fn run(store: Arc<ConstraintStore>, config: EnumConfig) -> Vec<Outcome> {
    let subs = Box::new(InProcessSolver::new(store).unwrap());
    Enumerator::new(config, subs)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn split(outcomes: &[Outcome]) -> (BTreeSet<Vec<usize>>, BTreeSet<Vec<usize>>) {
    let pick = |kind| {
        outcomes
            .iter()
            .filter(|o| o.kind == kind)
            .map(|o| o.subset.clone())
            .collect()
    };
    (pick(ResultKind::Mus), pick(ResultKind::Mss))
}

fn configs() -> Vec<EnumConfig> {
    let base = EnumConfig::default();
    vec![
        base.clone(),
        EnumConfig { aim: Aim::Mcses, ..base.clone() },
        EnumConfig { maximize: Maximize::None, ..base.clone() },
        EnumConfig { maximize: Maximize::Always, ..base.clone() },
        EnumConfig { maximize: Maximize::Half, ..base.clone() },
        EnumConfig { aim: Aim::Mcses, maximize: Maximize::Half, ..base.clone() },
        EnumConfig { optimal_seeds: true, ..base.clone() },
        EnumConfig { mssguided: true, maximize: Maximize::None, ..base.clone() },
        EnumConfig { use_singletons: false, ..base },
    ]
}

#[test]
fn three_constraint_scenario_under_every_mode() {
    // C1: x, C2: !x, C3: y
    for config in configs() {
        let outcomes = run(store(vec![vec![vec![1]], vec![vec![-1]], vec![vec![2]]]), config.clone());
        let (muses, msses) = split(&outcomes);
        assert_eq!(outcomes.len(), 3, "{config:?}");
        assert_eq!(muses, BTreeSet::from([vec![0, 1]]), "{config:?}");
        assert_eq!(msses, BTreeSet::from([vec![0, 2], vec![1, 2]]), "{config:?}");
    }
}

#[test]
fn smallest_mus_mode_reports_only_the_smallest() {
    // {0,1} is a MUS of size 2, {2,3,4,5} one of size 4.
    let groups = vec![
        vec![vec![1]],
        vec![vec![-1]],
        vec![vec![2]],
        vec![vec![-2, 3]],
        vec![vec![-3, 4]],
        vec![vec![-4]],
    ];
    let config = EnumConfig { smus: true, ..EnumConfig::default() };
    let outcomes = run(store(groups.clone()), config);
    let (muses, _) = split(&outcomes);
    assert_eq!(muses, BTreeSet::from([vec![0, 1]]));

    let (all_muses, _) = split(&run(store(groups), EnumConfig::default()));
    assert_eq!(all_muses, BTreeSet::from([vec![0, 1], vec![2, 3, 4, 5]]));
}

#[test]
fn unsatisfiable_hard_clauses_yield_the_empty_mus() {
    let store = Arc::new(
        ConstraintStore::from_groups(vec![vec![vec![2]], vec![vec![-2]]])
            .unwrap()
            .with_hard(vec![vec![1], vec![-1]])
            .unwrap(),
    );
    let outcomes = run(store, EnumConfig::default());
    assert_eq!(
        outcomes,
        vec![Outcome { kind: ResultKind::Mus, subset: vec![] }]
    );
}

#[test]
fn singleton_mcs_becomes_hard() {
    // C1: x, C2: !x -- MSS {0} and {1} both have size n - 1.
    let subs = Box::new(InProcessSolver::new(store(vec![vec![vec![1]], vec![vec![-1]]])).unwrap());
    let mut enumerator = Enumerator::new(EnumConfig::default(), subs).unwrap();
    let results: Vec<Outcome> = enumerator.by_ref().map(Result::unwrap).collect();
    assert_eq!(results.len(), 3);
    assert!(!enumerator.hard().is_empty());
    let report = enumerator.stats().report();
    assert_eq!(report.counters["mus"], 1);
    assert_eq!(report.counters["mss"], 2);
    assert!(report.phases.iter().any(|phase| phase.name == "seed"));
}

#[test]
fn interrupted_run_stops_with_an_error() {
    let interrupt = Interrupt::new();
    interrupt.trigger();
    let subs = Box::new(InProcessSolver::new(store(vec![vec![vec![1]], vec![vec![-1]]])).unwrap());
    let mut enumerator = Enumerator::new(EnumConfig::default(), subs)
        .unwrap()
        .with_interrupt(interrupt);
    let first = enumerator.next().unwrap();
    assert!(matches!(first, Err(MarcoError::Interrupted(_))));
    assert!(enumerator.next().is_none());
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let subs = Box::new(InProcessSolver::new(store(vec![vec![vec![1]]])).unwrap());
    let config = EnumConfig { smus: true, maximize: Maximize::Half, ..EnumConfig::default() };
    let err = Enumerator::new(config, subs).unwrap_err();
    assert!(matches!(err, MarcoError::Config(_)));
}

#[test]
fn smallest_mus_mode_does_not_explore_above_msses() {
    // {4,5} is the smallest MUS; the chain {0,1,2,3} is larger.
    let groups = vec![
        vec![vec![2]],
        vec![vec![-2, 3]],
        vec![vec![-3, 4]],
        vec![vec![-4]],
        vec![vec![1]],
        vec![vec![-1]],
    ];
    let guided = EnumConfig { smus: true, mssguided: true, ..EnumConfig::default() };
    let subs = Box::new(InProcessSolver::new(store(groups.clone())).unwrap());
    let err = Enumerator::new(guided, subs).unwrap_err();
    assert_eq!(err.info().code, "conflicting-options");

    let config = EnumConfig { smus: true, ..EnumConfig::default() };
    let (muses, _) = split(&run(store(groups), config));
    assert_eq!(muses, BTreeSet::from([vec![4, 5]]));
}

// Truth-table oracle over three variables.
fn satisfiable(groups: &[Vec<Vec<i32>>], subset: &[usize]) -> bool {
    (0u32..8).any(|bits| {
        subset.iter().all(|&idx| {
            groups[idx].iter().all(|clause| {
                clause
                    .iter()
                    .any(|&lit| (bits & (1 << (lit.unsigned_abs() - 1)) != 0) == (lit > 0))
            })
        })
    })
}

fn oracle(groups: &[Vec<Vec<i32>>]) -> (BTreeSet<Vec<usize>>, BTreeSet<Vec<usize>>) {
    let n = groups.len();
    let subsets: Vec<Vec<usize>> = (0u32..1 << n)
        .map(|bits| (0..n).filter(|i| bits & (1 << i) != 0).collect())
        .collect();
    let mut muses = BTreeSet::new();
    let mut msses = BTreeSet::new();
    for subset in subsets {
        if satisfiable(groups, &subset) {
            let maximal = (0..n)
                .filter(|i| !subset.contains(i))
                .all(|extra| {
                    let mut bigger = subset.clone();
                    bigger.push(extra);
                    !satisfiable(groups, &bigger)
                });
            if maximal {
                msses.insert(subset);
            }
        } else {
            let minimal = subset.iter().all(|&drop| {
                let smaller: Vec<usize> = subset.iter().copied().filter(|&i| i != drop).collect();
                satisfiable(groups, &smaller)
            });
            if minimal {
                muses.insert(subset);
            }
        }
    }
    (muses, msses)
}

fn literal() -> impl Strategy<Value = i32> {
    (1..=3i32, any::<bool>()).prop_map(|(var, positive)| if positive { var } else { -var })
}

fn groups() -> impl Strategy<Value = Vec<Vec<Vec<i32>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec(literal(), 1..3), 1..3),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn enumeration_matches_oracle(groups in groups(), mode in 0usize..9) {
        let config = configs()[mode].clone();
        let outcomes = run(store(groups.clone()), config);
        let (muses, msses) = split(&outcomes);
        prop_assert_eq!(muses.len() + msses.len(), outcomes.len(), "duplicate result");
        let (want_muses, want_msses) = oracle(&groups);
        prop_assert_eq!(muses, want_muses);
        prop_assert_eq!(msses, want_msses);
    }

    #[test]
    fn smallest_mus_has_minimum_cardinality(groups in groups()) {
        let config = EnumConfig { smus: true, ..EnumConfig::default() };
        let outcomes = run(store(groups.clone()), config);
        let (muses, _) = split(&outcomes);
        let (want_muses, _) = oracle(&groups);
        match want_muses.iter().map(Vec::len).min() {
            Some(best) => {
                prop_assert_eq!(muses.len(), 1);
                let found = muses.iter().next().map(Vec::len);
                prop_assert_eq!(found, Some(best));
                prop_assert!(want_muses.contains(muses.iter().next().unwrap()));
            }
            None => prop_assert!(muses.is_empty()),
        }
    }
}
