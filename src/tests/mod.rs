mod util;

use std::collections::HashSet;

use crate::skip_if_no_symlinks;
use crate::{Order, SymlinkPolicy, WalkDir};
use util::Dir;

fn visited_paths(root: &Dir, walk: WalkDir) -> Vec<String> {
    walk.into_iter()
        .map(|v| {
            v.entry()
                .path()
                .strip_prefix(root.path())
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn walks_every_entry_once() {
    let dir = Dir::tmp();
    dir.mkdirp(&["a/b", "a/c"]);
    dir.touch_all(&["a/b/f1", "a/c/f2", "top"]);

    let mut seen = HashSet::new();
    for visit in WalkDir::new(dir.path()) {
        assert!(seen.insert(visit.entry().path().to_path_buf()), "duplicate visit");
    }
    // 1 root + a + b + c + f1 + f2 + top = 7 entries, each producing at
    // least one visit (directories produce two: Pre and Post).
    assert!(seen.len() >= 7);
}

#[test]
fn directories_get_pre_and_post_order() {
    let dir = Dir::tmp();
    dir.mkdirp(&["sub"]);

    let mut orders = Vec::new();
    for visit in WalkDir::new(dir.path()) {
        if visit.entry().path() == dir.path().join("sub") {
            orders.push(visit.order());
        }
    }
    assert_eq!(orders, vec![Order::PreOrder, Order::PostOrder]);
}

#[test]
fn min_and_max_depth_are_reported_on_visits() {
    let dir = Dir::tmp();
    dir.mkdirp(&["a/b/c"]);

    let max_seen = WalkDir::new(dir.path())
        .into_iter()
        .map(|v| v.depth())
        .max()
        .unwrap();
    assert_eq!(max_seen, 3);
}

#[test]
fn max_depth_stops_descent_but_still_visits_boundary() {
    let dir = Dir::tmp();
    dir.mkdirp(&["a/b/c"]);

    let paths = visited_paths(&dir, WalkDir::new(dir.path()).max_depth(1));
    assert!(paths.iter().any(|p| p == "a"));
    assert!(!paths.iter().any(|p| p.contains("b")));
}

#[test]
fn physical_policy_never_descends_into_symlinked_dirs() {
    let dir = Dir::tmp();
    skip_if_no_symlinks!(dir);
    dir.mkdirp(&["real"]);
    dir.touch_all(&["real/f"]);
    dir.symlink("real", "link");

    let paths = visited_paths(
        &dir,
        WalkDir::new(dir.path()).symlink_policy(SymlinkPolicy::Physical),
    );
    assert!(paths.iter().any(|p| p == "link"));
    assert!(!paths.iter().any(|p| p == "link/f"));
}

#[test]
fn logical_policy_detects_symlink_cycles() {
    let dir = Dir::tmp();
    skip_if_no_symlinks!(dir);
    dir.mkdirp(&["a"]);
    dir.symlink(".", "a/loop");

    let orders: Vec<Order> = WalkDir::new(dir.path())
        .symlink_policy(SymlinkPolicy::Logical)
        .into_iter()
        .map(|v| v.order())
        .collect();
    assert!(orders.contains(&Order::CycleDetected));
}

#[test]
fn unreadable_root_reports_error_order() {
    let dir = Dir::tmp();
    let missing = dir.join("does-not-exist");

    let orders: Vec<Order> =
        WalkDir::new(&missing).into_iter().map(|v| v.order()).collect();
    assert_eq!(orders, vec![Order::Error]);
}

#[test]
fn leaf_entries_are_not_stat_eagerly_when_dirent_type_known() {
    let dir = Dir::tmp();
    dir.touch_all(&["plain"]);

    for visit in WalkDir::new(dir.path()) {
        if visit.entry().path().ends_with("plain") {
            assert_eq!(visit.order(), Order::Leaf);
            assert!(visit.entry().dent_file_type().is_some());
        }
    }
}
