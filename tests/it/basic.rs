use ytree::{NodeType, Tree};

use super::*;

#[test]
fn empty_tree_has_no_root() {
    let tree: Tree<'_> = Tree::new();
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.capacity(), 0);
    assert!(tree.is_empty());
}

#[test]
fn first_reserve_claims_the_root() {
    let mut tree = Tree::new();
    tree.reserve(4, 0);
    assert_eq!(tree.capacity(), 4);
    assert_eq!(tree.size(), 1);
    let root = tree.root_id();
    assert_eq!(root.index(), 0);
    assert!(tree.is_root(root));
    assert_eq!(tree.parent(root), None);
}

#[test]
fn claim_on_a_fresh_tree_grows_and_creates_the_root() {
    let mut tree: Tree<'_> = Tree::new();
    let node = tree.claim();
    // growth claimed the root first, so the explicit claim gets slot 1
    assert_eq!(node.index(), 1);
    assert_eq!(tree.root_id().index(), 0);
    assert_eq!(tree.capacity(), 16);
    assert_eq!(tree.size(), 2);
}

#[test]
fn claim_release_reuses_slots_lifo() {
    // scenario: three children, release the middle one
    let mut tree = Tree::new();
    tree.reserve(4, 0);
    let root = tree.root_id();
    tree.to_seq(root, NodeType::empty());

    let a = tree.append_child(root);
    tree.to_val(a, "a", NodeType::empty());
    let b = tree.append_child(root);
    tree.to_val(b, "b", NodeType::empty());
    let c = tree.append_child(root);
    tree.to_val(c, "c", NodeType::empty());
    assert_eq!(tree.size(), 4);
    assert_eq!(tree.capacity(), 4);
    assert_eq!((a.index(), b.index(), c.index()), (1, 2, 3));

    tree.remove(b);
    assert_eq!(tree.size(), 3);
    assert_eq!(tree.first_child(root), Some(a));
    assert_eq!(tree.last_child(root), Some(c));
    assert_eq!(tree.next_sibling(a), Some(c));
    assert_eq!(tree.prev_sibling(c), Some(a));
    check_structure(&tree);

    // the freed slot sits at the head of the free list
    let d = tree.claim();
    assert_eq!(d.index(), b.index());
    assert_eq!(tree.capacity(), 4, "no growth while a slot was free");
}

#[test]
fn claiming_past_capacity_doubles() {
    let mut tree = Tree::new();
    tree.reserve(4, 0);
    for _ in 0..3 {
        tree.claim();
    }
    assert_eq!(tree.capacity(), 4);
    tree.claim();
    assert_eq!(tree.capacity(), 8);
}

#[test]
fn clear_reclaims_the_root_at_index_zero() {
    let mut tree = Tree::new();
    tree.reserve(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    for i in 0..5 {
        let c = tree.append_child(root);
        let key = tree.copy_to_arena(format!("k{i}").as_bytes());
        tree.to_keyval(c, key, "v", NodeType::empty());
    }
    assert_eq!(tree.size(), 6);

    tree.clear();
    assert_eq!(tree.size(), 1);
    assert_eq!(tree.capacity(), 8);
    assert_eq!(tree.root_id().index(), 0);
    // the free list is sequential again after clear
    let x = tree.claim();
    let y = tree.claim();
    assert_eq!((x.index(), y.index()), (1, 2));
    check_structure(&tree);
}

#[test]
fn queries_on_a_small_map() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let a = tree.append_child(root);
    tree.to_keyval(a, "alpha", "1", NodeType::empty());
    let b = tree.append_child(root);
    tree.to_keyseq(b, "beta", NodeType::empty());
    let x = tree.append_child(b);
    tree.to_val(x, "x", NodeType::empty());
    let y = tree.append_child(b);
    tree.to_val(y, "y", NodeType::empty());

    assert_eq!(tree.num_children(root), 2);
    assert_eq!(tree.num_children(b), 2);
    assert_eq!(tree.num_children(a), 0, "scalars have no children");
    assert_eq!(tree.child(root, 0), Some(a));
    assert_eq!(tree.child(root, 1), Some(b));
    assert_eq!(tree.child(root, 2), None);
    assert_eq!(tree.child_pos(root, b), Some(1));
    assert_eq!(tree.find_child(root, b"beta"), Some(b));
    assert_eq!(tree.find_child(root, b"gamma"), None);
    assert!(tree.has_child(root, a));
    assert!(!tree.has_child(root, x));
    assert!(tree.has_sibling(a, b));
    assert!(!tree.has_sibling(a, x));
    assert!(tree.has_siblings(a));
    assert_eq!(tree.first_sibling(y), x);
    assert_eq!(tree.last_sibling(x), y);

    assert!(tree.is_map(root));
    assert!(tree.is_keyval(a));
    assert!(tree.is_seq(b));
    assert!(tree.has_key(b));
    assert!(tree.is_val(x));
    assert!(tree.is_container(b));
    assert!(!tree.is_container(a));
    assert_eq!(tree.kind(a), NodeType::KEYVAL);
    assert_eq!(tree.type_str(b), "KEYSEQ");
    assert_eq!(tree.key(a), b"alpha");
    assert_eq!(tree.val(a), b"1");
}

#[test]
fn noderef_navigation() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let steps = tree.append_child(root);
    tree.to_keyseq(steps, "steps", NodeType::empty());
    for name in ["configure", "build", "test"] {
        let s = tree.append_child(steps);
        tree.to_val(s, name, NodeType::empty());
    }

    let r = tree.rootref();
    assert_eq!(r.id(), root);
    let steps_ref = r.get(b"steps").unwrap();
    assert!(steps_ref.is_seq());
    assert_eq!(steps_ref.num_children(), 3);
    assert_eq!(steps_ref.at(1).unwrap().val(), b"build");
    assert!(steps_ref.at(3).is_none());
    let collected: Vec<_> = steps_ref.children().map(|c| c.val().to_vec()).collect();
    assert_eq!(collected, vec![b"configure".to_vec(), b"build".to_vec(), b"test".to_vec()]);
    assert_eq!(steps_ref.at(0).unwrap().parent().unwrap().id(), steps_ref.id());
}

#[test]
fn move_after_within_a_sequence() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_seq(root, NodeType::empty());
    let a = tree.append_child(root);
    tree.to_val(a, "a", NodeType::empty());
    let b = tree.append_child(root);
    tree.to_val(b, "b", NodeType::empty());
    let c = tree.append_child(root);
    tree.to_val(c, "c", NodeType::empty());

    tree.move_after(c, None);
    assert_eq!(children(&tree, root), vec![c, a, b]);
    tree.move_after(c, Some(b));
    assert_eq!(children(&tree, root), vec![a, b, c]);
    check_structure(&tree);
}

#[test]
fn move_to_another_parent() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let from = tree.append_child(root);
    tree.to_keyseq(from, "from", NodeType::empty());
    let to = tree.append_child(root);
    tree.to_keyseq(to, "to", NodeType::empty());
    let item = tree.append_child(from);
    tree.to_val(item, "item", NodeType::empty());

    tree.move_to(item, to, None);
    assert_eq!(tree.num_children(from), 0);
    assert_eq!(children(&tree, to), vec![item]);
    assert_eq!(tree.parent(item), Some(to));
    check_structure(&tree);
}

#[test]
fn duplicate_restores_the_subtree() {
    let mut tree = Tree::with_capacity(16, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let cfg = tree.append_child(root);
    tree.to_keymap(cfg, "config", NodeType::empty());
    let host = tree.append_child(cfg);
    tree.to_keyval(host, "host", "localhost", NodeType::empty());
    let ports = tree.append_child(cfg);
    tree.to_keyseq(ports, "ports", NodeType::empty());
    for p in ["80", "443"] {
        let n = tree.append_child(ports);
        tree.to_val(n, p, NodeType::empty());
    }

    let dup = tree.duplicate(cfg, root, Some(cfg));
    assert_subtree_eq(&tree, cfg, dup);
    assert_eq!(children(&tree, root), vec![cfg, dup]);
    check_structure(&tree);
}

#[test]
fn duplicate_children_inserts_in_order() {
    let mut tree = Tree::with_capacity(16, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let src = tree.append_child(root);
    tree.to_keyseq(src, "src", NodeType::empty());
    for v in ["1", "2", "3"] {
        let n = tree.append_child(src);
        tree.to_val(n, v, NodeType::empty());
    }
    let dst = tree.append_child(root);
    tree.to_keyseq(dst, "dst", NodeType::empty());

    let last = tree.duplicate_children(src, dst, None);
    let dst_children = children(&tree, dst);
    assert_eq!(dst_children.len(), 3);
    assert_eq!(last, dst_children.last().copied());
    let vals: Vec<_> = dst_children.iter().map(|&c| tree.val(c).to_vec()).collect();
    assert_eq!(vals, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
}

#[test]
fn duplicate_children_no_rep_into_a_sequence_appends() {
    let mut tree = Tree::with_capacity(16, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let src = tree.append_child(root);
    tree.to_keyseq(src, "src", NodeType::empty());
    for v in ["a", "b"] {
        let n = tree.append_child(src);
        tree.to_val(n, v, NodeType::empty());
    }
    let dst = tree.append_child(root);
    tree.to_keyseq(dst, "dst", NodeType::empty());
    let existing = tree.append_child(dst);
    tree.to_val(existing, "z", NodeType::empty());

    tree.duplicate_children_no_rep(src, dst, Some(existing));
    let vals: Vec<_> = children(&tree, dst).iter().map(|&c| tree.val(c).to_vec()).collect();
    assert_eq!(vals, vec![b"z".to_vec(), b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn swap_adjacent_siblings() {
    // scenario: in [x, y, z], swap the slots of x and y
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_seq(root, NodeType::empty());
    let x = tree.append_child(root);
    tree.to_val(x, "x", NodeType::empty());
    let y = tree.append_child(root);
    tree.to_val(y, "y", NodeType::empty());
    let z = tree.append_child(root);
    tree.to_val(z, "z", NodeType::empty());

    tree.swap(x, y);
    // slots trade places; payloads trade slots, so the logical sequence
    // still reads x, y, z while the id order is now y, x, z
    assert_eq!(tree.first_child(root), Some(y));
    assert_eq!(children(&tree, root), vec![y, x, z]);
    assert_eq!(tree.val(y), b"x");
    assert_eq!(tree.val(x), b"y");
    assert_eq!(tree.next_sibling(y), Some(x));
    assert_eq!(tree.prev_sibling(x), Some(y));
    assert_eq!(tree.prev_sibling(z), Some(x));
    check_structure(&tree);
}

#[test]
fn swap_nonadjacent_and_cross_parent() {
    let mut tree = Tree::with_capacity(16, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let p = tree.append_child(root);
    tree.to_keyseq(p, "p", NodeType::empty());
    let q = tree.append_child(root);
    tree.to_keyseq(q, "q", NodeType::empty());
    let a = tree.append_child(p);
    tree.to_val(a, "a", NodeType::empty());
    let b = tree.append_child(p);
    tree.to_val(b, "b", NodeType::empty());
    let c = tree.append_child(p);
    tree.to_val(c, "c", NodeType::empty());
    let d = tree.append_child(q);
    tree.to_val(d, "d", NodeType::empty());

    // same parent, not adjacent
    tree.swap(a, c);
    assert_eq!(children(&tree, p), vec![c, b, a]);
    check_structure(&tree);

    // different parents
    tree.swap(b, d);
    assert_eq!(children(&tree, p), vec![c, d, a]);
    assert_eq!(children(&tree, q), vec![b]);
    assert_eq!(tree.parent(d), Some(p));
    assert_eq!(tree.parent(b), Some(q));
    check_structure(&tree);
}

#[test]
fn swap_parent_with_child() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let outer = tree.append_child(root);
    tree.to_keymap(outer, "outer", NodeType::empty());
    let inner = tree.append_child(outer);
    tree.to_keymap(inner, "inner", NodeType::empty());
    let leaf = tree.append_child(inner);
    tree.to_keyval(leaf, "leaf", "1", NodeType::empty());

    tree.swap(outer, inner);
    // the slots traded places: `inner` now holds the outer position
    assert_eq!(children(&tree, root), vec![inner]);
    assert_eq!(children(&tree, inner), vec![outer]);
    assert_eq!(children(&tree, outer), vec![leaf]);
    assert_eq!(tree.key(inner), b"outer");
    assert_eq!(tree.key(outer), b"inner");
    check_structure(&tree);
}

#[test]
fn arena_spans_survive_growth() {
    let mut tree = Tree::with_capacity(4, 8);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let mut ids = Vec::new();
    for i in 0..100 {
        let key = tree.copy_to_arena(format!("key-{i}").as_bytes());
        assert!(tree.in_arena(&key));
        let val = tree.copy_to_arena(format!("value-{i}").as_bytes());
        let c = tree.append_child(root);
        tree.to_keyval(c, key, val, NodeType::empty());
        ids.push(c);
    }
    // the arena has doubled several times; every span still resolves
    for (i, &c) in ids.iter().enumerate() {
        assert_eq!(tree.key(c), format!("key-{i}").as_bytes());
        assert_eq!(tree.val(c), format!("value-{i}").as_bytes());
    }
    assert!(tree.arena_capacity() >= tree.arena_size());
    assert_eq!(tree.find_child(root, b"key-42"), Some(ids[42]));
}

#[test]
fn source_spans_are_not_arena_resident() {
    let mut tree = Tree::with_capacity(4, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let c = tree.append_child(root);
    tree.to_keyval(c, "borrowed", "bytes", NodeType::empty());
    assert!(!tree.in_arena(&ytree::Span::from("borrowed")));
    assert_eq!(tree.arena_size(), 0);
}

#[test]
fn duplicate_from_rehomes_arena_scalars() {
    let mut src = Tree::with_capacity(8, 16);
    let sroot = src.root_id();
    src.to_map(sroot, NodeType::empty());
    let item = src.append_child(sroot);
    let key = src.copy_to_arena(b"owned-key");
    let val = src.copy_to_arena(b"owned-val");
    src.to_keyval(item, key, val, NodeType::empty());

    let mut dst = Tree::with_capacity(8, 0);
    let droot = dst.root_id();
    dst.to_map(droot, NodeType::empty());
    let dup = dst.duplicate_from(&src, item, droot, None);

    // the destination owns its own copy of the bytes now
    src.clear();
    src.clear_arena();
    assert_eq!(dst.key(dup), b"owned-key");
    assert_eq!(dst.val(dup), b"owned-val");
    assert!(dst.arena_size() >= 18);
}

#[test]
fn duplicate_children_from_another_tree() {
    let mut src = Tree::with_capacity(8, 0);
    let sroot = src.root_id();
    src.to_map(sroot, NodeType::empty());
    let seq = src.append_child(sroot);
    src.to_keyseq(seq, "seq", NodeType::empty());
    for v in ["p", "q"] {
        let n = src.append_child(seq);
        src.to_val(n, v, NodeType::empty());
    }

    let mut dst = Tree::with_capacity(8, 0);
    let droot = dst.root_id();
    dst.to_seq(droot, NodeType::empty());
    let last = dst.duplicate_children_from(&src, seq, droot, None);

    let vals: Vec<_> = children(&dst, droot).iter().map(|&c| dst.val(c).to_vec()).collect();
    assert_eq!(vals, vec![b"p".to_vec(), b"q".to_vec()]);
    assert_eq!(last, children(&dst, droot).last().copied());
    check_structure(&dst);
}

#[test]
fn tags_ride_on_either_side() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let c = tree.append_child(root);
    tree.to_keyval(c, "count", "3", NodeType::empty());
    tree.set_val_tag(c, "!!int");
    tree.set_key_tag(c, "!!str");

    assert!(tree.node_type(c).contains(NodeType::VALTAG));
    assert!(tree.node_type(c).contains(NodeType::KEYTAG));
    assert_eq!(tree.val_tag(c), b"!!int");
    assert_eq!(tree.key_tag(c), b"!!str");
    assert_eq!(tree.kind(c), NodeType::KEYVAL, "tags do not change the kind");
}

#[test]
fn move_from_transfers_a_subtree() {
    let mut src = Tree::with_capacity(8, 0);
    let sroot = src.root_id();
    src.to_map(sroot, NodeType::empty());
    let sub = src.append_child(sroot);
    src.to_keyseq(sub, "sub", NodeType::empty());
    let leaf = src.append_child(sub);
    src.to_val(leaf, "leaf", NodeType::empty());

    let mut dst = Tree::with_capacity(8, 0);
    let droot = dst.root_id();
    dst.to_map(droot, NodeType::empty());
    let moved = dst.move_from(&mut src, sub, droot, None);

    assert_eq!(src.size(), 1, "source lost the subtree");
    assert_eq!(dst.key(moved), b"sub");
    assert_eq!(dst.num_children(moved), 1);
    check_structure(&src);
    check_structure(&dst);
}

#[test]
fn clone_is_a_deep_copy() {
    let mut tree = Tree::with_capacity(8, 16);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let c = tree.append_child(root);
    let key = tree.copy_to_arena(b"k");
    tree.to_keyval(c, key, "v", NodeType::empty());

    let snapshot = tree.clone();
    tree.remove(c);
    let c2 = tree.append_child(root);
    tree.to_keyval(c2, "other", "x", NodeType::empty());

    assert_eq!(entries(&snapshot, snapshot.root_id()), vec![entry("k", "v")]);
    check_structure(&snapshot);
}

#[test]
fn anchors_and_refs_are_queryable() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let a = tree.append_child(root);
    tree.to_keymap(a, "base", NodeType::empty());
    tree.set_val_anchor(a, "b");
    let r = tree.append_child(root);
    tree.to_keyval(r, "other", "*b", NodeType::VALREF);

    assert!(tree.has_val_anchor(a));
    assert!(!tree.has_key_anchor(a));
    assert!(tree.has_anchor(a, b"b"));
    assert!(!tree.has_anchor(a, b"c"));
    assert_eq!(tree.val_anchor(a), b"b");
    assert!(tree.is_val_ref(r));
    assert!(tree.is_ref(r));
    assert!(!tree.is_key_ref(r));

    tree.rem_anchor_ref(a);
    assert!(!tree.has_val_anchor(a));
    assert_eq!(tree.val_anchor(a), b"");
}

#[test]
fn set_key_anchor_marks_the_key_side() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let a = tree.append_child(root);
    tree.to_keyval(a, "name", "v", NodeType::empty());
    tree.set_key_anchor(a, "n");
    assert!(tree.has_key_anchor(a));
    assert!(tree.has_anchor(a, b"n"));
    assert_eq!(tree.key_anchor(a), b"n");
}

#[test]
fn preorder_is_document_order() {
    let mut tree = Tree::with_capacity(16, 0);
    let root = tree.root_id();
    tree.to_map(root, NodeType::empty());
    let a = tree.append_child(root);
    tree.to_keymap(a, "a", NodeType::empty());
    let a1 = tree.append_child(a);
    tree.to_keyval(a1, "a1", "1", NodeType::empty());
    let b = tree.append_child(root);
    tree.to_keyseq(b, "b", NodeType::empty());
    let b1 = tree.append_child(b);
    tree.to_val(b1, "b1", NodeType::empty());
    let b2 = tree.append_child(b);
    tree.to_val(b2, "b2", NodeType::empty());

    let order: Vec<_> = tree.preorder().collect();
    assert_eq!(order, vec![root, a, a1, b, b1, b2]);
}

#[test]
fn stream_of_documents() {
    let mut tree = Tree::with_capacity(8, 0);
    let root = tree.root_id();
    tree.to_stream(root, NodeType::empty());
    let d1 = tree.append_child(root);
    tree.to_doc(d1, NodeType::MAP);
    let d2 = tree.append_child(root);
    tree.to_doc(d2, NodeType::SEQ);

    assert!(tree.is_stream(root));
    assert!(tree.is_seq(root), "a stream is a sequence of documents");
    assert!(tree.is_doc(d1));
    assert_eq!(tree.type_str(d1), "DOCMAP");
    assert_eq!(tree.type_str(d2), "DOCSEQ");
}
