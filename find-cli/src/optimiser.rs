//! Expression-tree optimisation (§4.E).
//!
//! Two independent things happen here, gated by `-O`'s level exactly the
//! way GNU find's own optimiser levels work: level 1 (the default) reorders
//! side-effect-free runs of an `-a`/`-o` chain by estimated cost and
//! selectivity so short-circuiting discards work sooner; level 2 adds
//! constant folding for primaries that can be proven false without looking
//! at any particular file (today, just `-fstype NAME` for a `NAME` that
//! doesn't appear anywhere in the live mount table). Level 0 disables both
//! and evaluates the tree exactly as parsed.
//!
//! Reordering never crosses a side-effecting node (`-print`, `-exec`, ...):
//! those act as barriers, since moving a test across one would change
//! which files the action runs against.

use crate::config::Config;
use crate::predicate::{Primary, PredicateNode, PrimaryKind};
use findwalk::FsTypeTable;

pub fn optimise(tree: PredicateNode, config: &Config, fstypes: &FsTypeTable) -> PredicateNode {
    if config.opt_level == 0 {
        return tree;
    }
    optimise_node(tree, config, fstypes)
}

fn optimise_node(node: PredicateNode, config: &Config, fstypes: &FsTypeTable) -> PredicateNode {
    match node {
        PredicateNode::Primary(p) => optimise_primary(p, config, fstypes),
        PredicateNode::Not(inner) => {
            PredicateNode::Not(Box::new(optimise_node(*inner, config, fstypes)))
        }
        PredicateNode::Comma(a, b) => PredicateNode::Comma(
            Box::new(optimise_node(*a, config, fstypes)),
            Box::new(optimise_node(*b, config, fstypes)),
        ),
        PredicateNode::And(_, _) => rebuild_chain(node, Operator::And, config, fstypes),
        PredicateNode::Or(_, _) => rebuild_chain(node, Operator::Or, config, fstypes),
    }
}

fn optimise_primary(p: Primary, config: &Config, fstypes: &FsTypeTable) -> PredicateNode {
    if config.opt_level >= 2 {
        if let PrimaryKind::FsType(ref name) = p.kind {
            if !fstypes.contains(name) {
                if config.debug.opt {
                    eprintln!(
                        "find: opt: `-fstype {}' cannot match any mounted \
                         file system; folding to `-false'",
                        name
                    );
                }
                return PredicateNode::primary(PrimaryKind::False);
            }
        }
    }
    PredicateNode::Primary(p)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
}

fn rebuild_chain(
    node: PredicateNode,
    op: Operator,
    config: &Config,
    fstypes: &FsTypeTable,
) -> PredicateNode {
    let mut items = Vec::new();
    flatten(node, op, &mut items);
    let items: Vec<PredicateNode> = items
        .into_iter()
        .map(|n| optimise_node(n, config, fstypes))
        .collect();
    let items = if config.opt_level >= 1 {
        reorder_chain(op, items)
    } else {
        items
    };
    rebuild(op, items)
}

/// The parser always builds a left-deep chain (`And(And(a, b), c)`, never
/// right-deep), so a single left-recursive walk recovers the full run of
/// operands joined by the same operator at this level.
fn flatten(node: PredicateNode, op: Operator, out: &mut Vec<PredicateNode>) {
    match (op, node) {
        (Operator::And, PredicateNode::And(a, b)) => {
            flatten(*a, op, out);
            out.push(*b);
        }
        (Operator::Or, PredicateNode::Or(a, b)) => {
            flatten(*a, op, out);
            out.push(*b);
        }
        (_, other) => out.push(other),
    }
}

fn rebuild(op: Operator, items: Vec<PredicateNode>) -> PredicateNode {
    let mut iter = items.into_iter();
    let first = iter.next().expect("flatten always yields at least one operand");
    iter.fold(first, |acc, next| match op {
        Operator::And => PredicateNode::And(Box::new(acc), Box::new(next)),
        Operator::Or => PredicateNode::Or(Box::new(acc), Box::new(next)),
    })
}

/// Split `items` into maximal side-effect-free runs separated by
/// side-effecting nodes (which stay pinned in place), and sort each run.
fn reorder_chain(op: Operator, items: Vec<PredicateNode>) -> Vec<PredicateNode> {
    let mut result = Vec::with_capacity(items.len());
    let mut run: Vec<PredicateNode> = Vec::new();
    for item in items {
        if item.has_side_effects() {
            sort_run(op, &mut run);
            result.append(&mut run);
            result.push(item);
        } else {
            run.push(item);
        }
    }
    sort_run(op, &mut run);
    result.append(&mut run);
    result
}

fn sort_run(op: Operator, run: &mut [PredicateNode]) {
    run.sort_by(|a, b| {
        let (ca, cb) = (cost_tier(a), cost_tier(b));
        if ca != cb {
            return ca.cmp(&cb);
        }
        let (sa, sb) = (success_rate(a), success_rate(b));
        let ordering = match op {
            // `-a`: the operand least likely to hold should run first, so
            // a false result short-circuits the rest of the run sooner.
            Operator::And => sa.partial_cmp(&sb),
            // `-o`: the operand most likely to hold should run first, so a
            // true result short-circuits the rest of the run sooner.
            Operator::Or => sb.partial_cmp(&sa),
        };
        ordering.unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// 0 = no filesystem access needed at all (pure string/regex tests), 1 =
/// needs the directory-entry type tag, 2 = needs a full `stat`. Composite
/// operands (parenthesised groups) cost whatever their most expensive leaf
/// costs, since reordering doesn't look inside them.
fn cost_tier(node: &PredicateNode) -> u8 {
    match node {
        PredicateNode::Primary(p) => {
            if p.needs_stat {
                2
            } else if p.needs_type {
                1
            } else {
                0
            }
        }
        PredicateNode::Not(inner) => cost_tier(inner),
        PredicateNode::And(a, b) | PredicateNode::Or(a, b) | PredicateNode::Comma(a, b) => {
            cost_tier(a).max(cost_tier(b))
        }
    }
}

/// A rough independence-assumption probability estimate, used only to
/// break cost-tier ties; see `PrimaryKind::estimated_success_rate`.
fn success_rate(node: &PredicateNode) -> f64 {
    match node {
        PredicateNode::Primary(p) => p.estimated_success_rate,
        PredicateNode::Not(inner) => 1.0 - success_rate(inner),
        PredicateNode::And(a, b) => success_rate(a) * success_rate(b),
        PredicateNode::Or(a, b) => {
            let (sa, sb) = (success_rate(a), success_rate(b));
            sa + sb - sa * sb
        }
        PredicateNode::Comma(_, b) => success_rate(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PrimaryKind;
    use std::time::SystemTime;

    fn config_at(level: u8) -> Config {
        let mut c = Config::new(SystemTime::now());
        c.opt_level = level;
        c
    }

    #[test]
    fn level_zero_leaves_order_untouched() {
        let tree = PredicateNode::And(
            Box::new(PredicateNode::primary(PrimaryKind::Empty)),
            Box::new(PredicateNode::primary(PrimaryKind::Name("*.rs".into()))),
        );
        let config = config_at(0);
        let fstypes = FsTypeTable::default();
        let out = optimise(tree.clone(), &config, &fstypes);
        // `-empty` needs a stat, `-name` doesn't; at level 0 the costlier
        // test stays first because nothing reorders it.
        match out {
            PredicateNode::And(a, _) => {
                assert!(matches!(
                    *a,
                    PredicateNode::Primary(Primary { kind: PrimaryKind::Empty, .. })
                ));
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn level_one_moves_cheap_test_before_stat_requiring_one() {
        let tree = PredicateNode::And(
            Box::new(PredicateNode::primary(PrimaryKind::Empty)),
            Box::new(PredicateNode::primary(PrimaryKind::Name("*.rs".into()))),
        );
        let config = config_at(1);
        let fstypes = FsTypeTable::default();
        let out = optimise(tree, &config, &fstypes);
        match out {
            PredicateNode::And(a, _) => {
                assert!(matches!(
                    *a,
                    PredicateNode::Primary(Primary { kind: PrimaryKind::Name(_), .. })
                ));
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn side_effects_pin_a_run_boundary() {
        // -empty -print -name '*.rs': reordering must not move -name ahead
        // of -print, since that would change the test/action interleaving.
        let tree = PredicateNode::And(
            Box::new(PredicateNode::And(
                Box::new(PredicateNode::primary(PrimaryKind::Empty)),
                Box::new(PredicateNode::primary(PrimaryKind::Print)),
            )),
            Box::new(PredicateNode::primary(PrimaryKind::Name("*.rs".into()))),
        );
        let config = config_at(1);
        let fstypes = FsTypeTable::default();
        let out = optimise(tree, &config, &fstypes);
        let mut items = Vec::new();
        flatten(out, Operator::And, &mut items);
        assert_eq!(items.len(), 3);
        assert!(matches!(
            items[1],
            PredicateNode::Primary(Primary { kind: PrimaryKind::Print, .. })
        ));
    }

    #[test]
    fn level_two_folds_unknown_fstype_to_false() {
        let tree = PredicateNode::primary(PrimaryKind::FsType(
            "definitely-not-a-real-fstype".to_string(),
        ));
        let config = config_at(2);
        let fstypes = FsTypeTable::default();
        let out = optimise(tree, &config, &fstypes);
        assert!(matches!(
            out,
            PredicateNode::Primary(Primary { kind: PrimaryKind::False, .. })
        ));
    }
}
