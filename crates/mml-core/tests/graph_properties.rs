//! Property tests for the TOM/DTOM graph model.

use mml_core::{ArcRef, Dtom, NetworkSnapshot, StructureModel, TemporalModel, Tom, VarId};
use proptest::prelude::*;

const N: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Toggle(usize, usize),
    ToggleTemporal(usize, usize),
    Swap(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..N, 0..N).prop_map(|(a, b)| Op::Toggle(a, b)),
        (0..N, 0..N).prop_map(|(a, b)| Op::ToggleTemporal(a, b)),
        (0..N - 1).prop_map(Op::Swap),
    ]
}

/// Apply `op` only where it keeps every invariant, mirroring what a mover checks.
fn apply_checked(dtom: &mut Dtom, op: &Op) {
    match *op {
        Op::Toggle(a, b) => {
            let (a, b) = (VarId(a), VarId(b));
            if a == b {
                return;
            }
            let (parent, child) = if dtom.node_pos(a) < dtom.node_pos(b) {
                (a, b)
            } else {
                (b, a)
            };
            let adding = !dtom.is_arc(parent, child);
            if adding && dtom.num_parents(child) >= dtom.max_num_parents() {
                return;
            }
            dtom.toggle_arc(parent, child).unwrap();
        }
        Op::ToggleTemporal(a, b) => {
            let (parent, child) = (VarId(a), VarId(b));
            let adding = !dtom.is_temporal_arc(parent, child);
            if adding && dtom.num_parents(child) >= dtom.max_num_parents() {
                return;
            }
            dtom.toggle_temporal_arc(parent, child).unwrap();
        }
        Op::Swap(pos) => {
            let left = dtom.node_at(pos);
            let right = dtom.node_at(pos + 1);
            if dtom.is_arc(left, right) && dtom.num_parents(left) >= dtom.max_num_parents() {
                return;
            }
            dtom.swap_adjacent(pos).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn invariants_hold_after_any_checked_sequence(
        ops in prop::collection::vec(op_strategy(), 0..200),
        max_parents in 1usize..4,
    ) {
        let mut dtom = Dtom::new(N, max_parents);
        for op in &ops {
            apply_checked(&mut dtom, op);
            prop_assert!(dtom.validate().is_ok());
        }
        for child in (0..N).map(VarId) {
            for &parent in dtom.parents(child) {
                prop_assert!(dtom.node_pos(parent) < dtom.node_pos(child));
            }
        }
        let snapshot = NetworkSnapshot::from_model(&dtom, &[]);
        prop_assert!(snapshot.is_acyclic());
    }

    #[test]
    fn toggle_twice_restores_model(
        ops in prop::collection::vec(op_strategy(), 0..60),
        a in 0..N,
        b in 0..N,
        temporal in any::<bool>(),
    ) {
        let mut dtom = Dtom::new(N, N);
        for op in &ops {
            apply_checked(&mut dtom, op);
        }
        let (a, b) = (VarId(a), VarId(b));
        let arc = if temporal {
            ArcRef::temporal(a, b)
        } else {
            if a == b {
                return Ok(());
            }
            if dtom.node_pos(a) < dtom.node_pos(b) {
                ArcRef::intraslice(a, b)
            } else {
                ArcRef::intraslice(b, a)
            }
        };

        let before = dtom.clone();
        let counts: Vec<usize> = (0..N).map(|v| dtom.num_parents(VarId(v))).collect();
        dtom.toggle(arc).unwrap();
        dtom.toggle(arc).unwrap();
        prop_assert_eq!(&dtom, &before);
        let after: Vec<usize> = (0..N).map(|v| dtom.num_parents(VarId(v))).collect();
        prop_assert_eq!(counts, after);
    }

    #[test]
    fn swap_twice_restores_model(
        ops in prop::collection::vec(op_strategy(), 0..60),
        pos in 0..N - 1,
    ) {
        let mut tom_like = Dtom::new(N, N);
        for op in &ops {
            apply_checked(&mut tom_like, op);
        }
        let before = tom_like.clone();
        tom_like.swap_adjacent(pos).unwrap();
        tom_like.swap_adjacent(pos).unwrap();
        prop_assert_eq!(tom_like, before);
    }
}

#[test]
fn static_model_never_reports_temporal_parents() {
    let mut tom = Tom::new(3, 2);
    tom.add_arc(VarId(0), VarId(2)).unwrap();
    assert!(tom.temporal_parents(VarId(2)).is_empty());
    assert_eq!(tom.num_candidates(VarId(2)), 2);
    assert_eq!(tom.num_parents(VarId(2)), 1);
}
