use super::*;

#[test]
fn labels_from_level_and_leaf_index() {
  assert_eq!(55, Position::from_index_on_level(3, 3).as_u64());
  assert_eq!(6, Position::from_leaf_index(3).as_u64());
  for (label, leaf_index) in [(0, 0), (2, 1), (4, 2), (6, 3), (8, 4), (2000, 1000)] {
    assert_eq!(label, Position::from_leaf_index(leaf_index).as_u64());
    assert_eq!(leaf_index, Position::from_leaf_index(leaf_index).leaf_index_on_level());
  }
}

#[test]
fn post_order_round_trip() {
  assert_eq!(95, Position::from_post_order(125).as_u64());

  // the first complete tree of four leaves freezes as 0, 2, 1, 4, 6, 5, 3
  for (rank, label) in [(0, 0), (1, 2), (2, 1), (3, 4), (4, 6), (5, 5), (6, 3)] {
    assert_eq!(label, Position::from_post_order(rank).as_u64());
    assert_eq!(rank, Position(label).post_order());
  }

  for rank in 0..10_000u64 {
    assert_eq!(rank, Position::from_post_order(rank).post_order(), "rank {rank}");
  }
}

#[test]
fn levels_and_kinds() {
  for (label, level, leaf, left) in [
    (0u64, 0u32, true, true),
    (2, 0, true, false),
    (1, 1, false, true),
    (4, 0, true, true),
    (5, 1, false, false),
    (3, 2, false, true),
    (11, 2, false, false),
    (7, 3, false, true),
    ((1 << 63) - 1, 63, false, true),
  ] {
    let position = Position(label);
    assert_eq!(level, position.level(), "label {label}");
    assert_eq!(leaf, position.is_leaf(), "label {label}");
    assert_eq!(left, position.is_left_child(), "label {label}");
    assert_eq!(!left, position.is_right_child(), "label {label}");
  }
}

#[test]
fn parents_and_siblings() {
  for (label, parent, sibling) in [(0u64, 1u64, 2u64), (2, 1, 0), (1, 3, 5), (5, 3, 1), (4, 5, 6), (6, 5, 4)] {
    assert_eq!(parent, Position(label).parent().as_u64());
    assert_eq!(sibling, Position(label).sibling().as_u64());
  }

  for leaf_index in 0..1000 {
    let position = Position::from_leaf_index(leaf_index);
    assert_eq!(position.sibling().sibling(), position);
    assert_eq!(position.parent(), position.sibling().parent());
  }
}

#[test]
fn children_only_below_internal_nodes() {
  for leaf_index in 0..100 {
    let leaf = Position::from_leaf_index(leaf_index);
    assert!(leaf.left_child().is_none());
    assert!(leaf.right_child().is_none());

    let parent = leaf.parent();
    let left = parent.left_child().unwrap();
    let right = parent.right_child().unwrap();
    assert_eq!(parent, left.parent());
    assert_eq!(parent, right.parent());
    assert_eq!(left, right.sibling());
    assert!(left.is_left_child());
    assert!(right.is_right_child());
    assert!(left == leaf || right == leaf);
  }

  assert_eq!(1, Position(3).left_child().unwrap().as_u64());
  assert_eq!(5, Position(3).right_child().unwrap().as_u64());
}

#[test]
fn subtree_spans() {
  for (label, left_most, right_most) in [(0u64, 0u64, 0u64), (1, 0, 2), (3, 0, 6), (5, 4, 6), (11, 8, 14)] {
    assert_eq!(left_most, Position(label).left_most_leaf().as_u64());
    assert_eq!(right_most, Position(label).right_most_leaf().as_u64());
  }
}

#[test]
fn root_levels() {
  for (last_leaf_index, level) in [(0u64, 0u32), (1, 1), (2, 2), (3, 2), (4, 3), (7, 3), (8, 4), (32, 6)] {
    assert_eq!(level, root_level_from_leaf_index(last_leaf_index), "last leaf {last_leaf_index}");
  }
}
