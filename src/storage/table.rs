//! # Table and tree operations
//!
//! A [`Table`] is one B+tree over one database file. The root always lives
//! on page 0: when the root splits, its contents move to a freshly allocated
//! page and page 0 is re-initialized in place, so the root page number is
//! stable for the life of the file.
//!
//! Splitting keeps the tree balanced without rewriting siblings. A full leaf
//! redistributes its cells plus the incoming row across itself and a new
//! right sibling; a full internal node does the same with its child
//! pointers. Either case promotes a separator key into the parent, which may
//! cascade upward until a new root is created.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::btree::{
    Node, NodeType, COMMON_NODE_HEADER_SIZE, INTERNAL_NODE_MAX_CELLS, LEAF_NODE_CELL_SIZE,
    LEAF_NODE_HEADER_SIZE, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_RIGHT_SPLIT_COUNT, LEAF_NODE_SPACE_FOR_CELLS,
};
use super::cursor::Cursor;
use super::pager::Pager;
use super::row::{Row, ROW_SIZE};
use crate::errors::Error;

pub struct Table {
    pub path: PathBuf,
    pub root_page_num: u32,
    pub pager: Pager,
}

impl Table {
    /// Opens the database file, initializing page 0 as an empty leaf root
    /// when the file is new.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut pager = Pager::open(path)?;

        if pager.num_pages() == 0 {
            let mut root = pager.get_page(0)?;
            root.init_leaf();
            root.set_root(true);
        }

        Ok(Table {
            path: path.to_path_buf(),
            root_page_num: 0,
            pager,
        })
    }

    /// Flushes every resident page and closes the file. Must run on every
    /// clean shutdown; unflushed mutations are lost otherwise.
    pub fn close(&mut self) -> Result<(), Error> {
        debug!(path = %self.path.display(), "Closing table.");
        self.pager.close()
    }
}

/// Inserts a row keyed by its id, keeping the leaf cells sorted. Returns
/// [`Error::DuplicateKey`] without mutating anything when the id is already
/// present.
pub fn insert_row(table: &mut Table, row: &Row) -> Result<(), Error> {
    let key = row.id;
    debug!(key, "Inserting a row...");
    let mut cursor = Cursor::find(table, key)?;

    let (num_cells, key_at_index) = {
        let node = cursor.table.pager.get(cursor.page_num)?;
        let num_cells = node.leaf_num_cells();
        let key_at_index = if cursor.cell_num < num_cells {
            Some(node.leaf_key(cursor.cell_num))
        } else {
            None
        };
        (num_cells, key_at_index)
    };

    if key_at_index == Some(key) {
        return Err(Error::DuplicateKey(key));
    }

    if num_cells >= LEAF_NODE_MAX_CELLS as u32 {
        warn!(
            page_num = cursor.page_num,
            num_cells, "Leaf node full. Splitting..."
        );
        return leaf_split_and_insert(&mut cursor, key, row);
    }

    let mut node = cursor.table.pager.get(cursor.page_num)?;
    if cursor.cell_num < num_cells {
        // Make room for the new cell.
        for i in (cursor.cell_num + 1..=num_cells).rev() {
            let prev = node.leaf_cell(i - 1).to_vec();
            node.leaf_cell_mut(i).copy_from_slice(&prev);
        }
    }
    node.set_leaf_num_cells(num_cells + 1);
    node.set_leaf_key(cursor.cell_num, key);
    row.serialize(node.leaf_value_mut(cursor.cell_num));
    Ok(())
}

/// Scans the whole table in key order.
pub fn select_rows(table: &mut Table) -> Result<Vec<Row>, Error> {
    let mut rows = Vec::new();
    let mut buf = Vec::with_capacity(ROW_SIZE);

    let mut cursor = Cursor::start(table)?;
    while !cursor.end_of_table {
        cursor.read_value(&mut buf)?;
        rows.push(Row::deserialize(&buf));
        cursor.advance()?;
    }
    Ok(rows)
}

/// Splits a full leaf and inserts the pending row.
///
/// The existing cells plus the new one are divided evenly between the old
/// (left) and a freshly allocated (right) node, iterating virtual positions
/// from the top down; the left side keeps the extra cell when the total is
/// odd. The new leaf takes the old leaf's place in the sibling chain.
fn leaf_split_and_insert(cursor: &mut Cursor, key: u32, row: &Row) -> Result<(), Error> {
    let old_page_num = cursor.page_num;
    let new_page_num = cursor.table.pager.unused_page_num();
    cursor.table.pager.ensure_loaded(new_page_num)?;
    debug!(old_page_num, new_page_num, "Splitting leaf node.");

    let old_max;
    {
        let mut old_node = cursor.table.pager.get(old_page_num)?;
        let mut new_node = cursor.table.pager.get(new_page_num)?;
        old_max = old_node.leaf_max_key();

        new_node.init_leaf();
        new_node.set_parent(old_node.parent());
        new_node.set_next_leaf(old_node.next_leaf());
        old_node.set_next_leaf(new_page_num);

        // Destinations overlap the source cells, so redistribute from a
        // snapshot of the old page.
        let snapshot = Node {
            data: old_node.data,
        };

        for i in (0..=LEAF_NODE_MAX_CELLS as u32).rev() {
            let dest_node = if i >= LEAF_NODE_LEFT_SPLIT_COUNT as u32 {
                &mut new_node
            } else {
                &mut old_node
            };
            let index_within_node = i % LEAF_NODE_LEFT_SPLIT_COUNT as u32;

            if i == cursor.cell_num {
                dest_node.set_leaf_key(index_within_node, key);
                row.serialize(dest_node.leaf_value_mut(index_within_node));
            } else if i > cursor.cell_num {
                dest_node
                    .leaf_cell_mut(index_within_node)
                    .copy_from_slice(snapshot.leaf_cell(i - 1));
            } else {
                dest_node
                    .leaf_cell_mut(index_within_node)
                    .copy_from_slice(snapshot.leaf_cell(i));
            }
        }

        old_node.set_leaf_num_cells(LEAF_NODE_LEFT_SPLIT_COUNT as u32);
        new_node.set_leaf_num_cells(LEAF_NODE_RIGHT_SPLIT_COUNT as u32);
    }

    let (was_root, parent_page_num, new_max) = {
        let old_node = cursor.table.pager.get(old_page_num)?;
        (old_node.is_root(), old_node.parent(), old_node.leaf_max_key())
    };

    if was_root {
        create_new_root(cursor.table, new_page_num)
    } else {
        // The left sibling's maximum went down; refresh its separator before
        // registering the new sibling.
        cursor.table.pager.ensure_loaded(parent_page_num)?;
        {
            let mut parent = cursor.table.pager.get(parent_page_num)?;
            update_internal_key(&mut parent, old_max, new_max);
        }
        internal_node_insert(cursor.table, parent_page_num, new_page_num)
    }
}

/// Handles a root split: the old root's contents move to a fresh page (the
/// new left child) and page 0 is re-initialized as an internal node over the
/// two halves. Children of the relocated node are re-pointed at it so no
/// stale parent pointer survives.
fn create_new_root(table: &mut Table, right_child_page_num: u32) -> Result<(), Error> {
    let left_child_page_num = table.pager.unused_page_num();
    table.pager.ensure_loaded(left_child_page_num)?;
    debug!(
        left_child_page_num,
        right_child_page_num, "Creating a new root."
    );

    let root_page_num = table.root_page_num;
    {
        let mut root = table.pager.get(root_page_num)?;
        let mut left_child = table.pager.get(left_child_page_num)?;

        left_child.data.copy_from_slice(&root.data);
        left_child.set_root(false);
        left_child.set_parent(root_page_num);

        root.init_internal();
        root.set_root(true);
        root.set_internal_num_keys(1);
        root.set_internal_child(0, left_child_page_num);
        root.set_right_child(right_child_page_num);
    }

    let left_max = subtree_max_key(&mut table.pager, left_child_page_num)?;
    table
        .pager
        .get(root_page_num)?
        .set_internal_key(0, left_max);
    table
        .pager
        .get(right_child_page_num)?
        .set_parent(root_page_num);

    reparent_children(&mut table.pager, left_child_page_num)
}

/// Points every child of an internal node back at it. No-op for leaves.
fn reparent_children(pager: &mut Pager, page_num: u32) -> Result<(), Error> {
    let children: Vec<u32> = {
        let node = pager.get(page_num)?;
        if node.node_type() != NodeType::Internal {
            return Ok(());
        }
        (0..=node.internal_num_keys())
            .map(|i| node.internal_child(i))
            .collect()
    };
    for child in children {
        pager.ensure_loaded(child)?;
        pager.get(child)?.set_parent(page_num);
    }
    Ok(())
}

/// Largest key reachable under `page_num`; the value recorded as the
/// separator for that subtree in its parent.
fn subtree_max_key(pager: &mut Pager, page_num: u32) -> Result<u32, Error> {
    pager.ensure_loaded(page_num)?;
    let (node_type, value) = {
        let node = pager.get(page_num)?;
        match node.node_type() {
            NodeType::Leaf => (NodeType::Leaf, node.leaf_max_key()),
            NodeType::Internal => (NodeType::Internal, node.right_child()),
        }
    };
    match node_type {
        NodeType::Leaf => Ok(value),
        NodeType::Internal => subtree_max_key(pager, value),
    }
}

/// Overwrites the separator that was `old_key` with `new_key`. When the
/// affected child is the rightmost one there is no stored separator and
/// nothing needs refreshing.
fn update_internal_key(node: &mut Node, old_key: u32, new_key: u32) {
    let old_child_index = node.internal_find_child(old_key);
    if old_child_index < node.internal_num_keys() {
        node.set_internal_key(old_child_index, new_key);
    }
}

/// Registers `child_page_num` under `parent_page_num`, splitting the parent
/// first when it is already at capacity.
fn internal_node_insert(
    table: &mut Table,
    parent_page_num: u32,
    child_page_num: u32,
) -> Result<(), Error> {
    let child_max = subtree_max_key(&mut table.pager, child_page_num)?;
    table.pager.ensure_loaded(parent_page_num)?;

    let num_keys = table.pager.get(parent_page_num)?.internal_num_keys();
    if num_keys >= INTERNAL_NODE_MAX_CELLS as u32 {
        return internal_split_and_insert(table, parent_page_num, child_page_num);
    }

    let right_child_page_num = table.pager.get(parent_page_num)?.right_child();
    let right_max = subtree_max_key(&mut table.pager, right_child_page_num)?;

    {
        let mut parent = table.pager.get(parent_page_num)?;
        if child_max > right_max {
            // The new child becomes the rightmost one; the previous right
            // child moves into the cell array.
            parent.set_internal_child(num_keys, right_child_page_num);
            parent.set_internal_key(num_keys, right_max);
            parent.set_right_child(child_page_num);
        } else {
            // Make room for the new cell.
            let index = parent.internal_find_child(child_max);
            for i in ((index + 1)..=num_keys).rev() {
                let prev = parent.internal_cell(i - 1).to_vec();
                parent.internal_cell_mut(i).copy_from_slice(&prev);
            }
            parent.set_internal_child(index, child_page_num);
            parent.set_internal_key(index, child_max);
        }
        parent.set_internal_num_keys(num_keys + 1);
    }

    table
        .pager
        .get(child_page_num)?
        .set_parent(parent_page_num);
    Ok(())
}

/// Splits a full internal node, symmetric to the leaf case: the node's
/// children plus the incoming one are collected as `(child, subtree max)`
/// entries in key order and divided between the old node and a new right
/// sibling, the left side taking the extra child. Every moved child's
/// parent pointer is rewritten immediately, and the new sibling is promoted
/// into the parent (recursing when the parent is itself full, or creating a
/// new root).
fn internal_split_and_insert(
    table: &mut Table,
    old_page_num: u32,
    child_page_num: u32,
) -> Result<(), Error> {
    let new_page_num = table.pager.unused_page_num();
    table.pager.ensure_loaded(new_page_num)?;
    warn!(
        old_page_num,
        new_page_num, child_page_num, "Internal node full. Splitting..."
    );

    let old_max = subtree_max_key(&mut table.pager, old_page_num)?;
    let (was_root, parent_page_num, old_children) = {
        let node = table.pager.get(old_page_num)?;
        let children: Vec<u32> = (0..=node.internal_num_keys())
            .map(|i| node.internal_child(i))
            .collect();
        (node.is_root(), node.parent(), children)
    };

    let mut entries: Vec<(u32, u32)> = Vec::with_capacity(old_children.len() + 1);
    for child in old_children {
        let max = subtree_max_key(&mut table.pager, child)?;
        entries.push((child, max));
    }
    let child_max = subtree_max_key(&mut table.pager, child_page_num)?;
    let pos = entries.partition_point(|&(_, max)| max < child_max);
    entries.insert(pos, (child_page_num, child_max));

    // The left node keeps the extra child when the total is odd.
    let left_count = (entries.len() + 1) / 2;
    let (left, right) = entries.split_at(left_count);

    {
        let mut old_node = table.pager.get(old_page_num)?;
        fill_internal(&mut old_node, left);
    }
    {
        let mut new_node = table.pager.get(new_page_num)?;
        new_node.init_internal();
        new_node.set_parent(parent_page_num);
        fill_internal(&mut new_node, right);
    }
    for &(child, _) in left {
        table.pager.ensure_loaded(child)?;
        table.pager.get(child)?.set_parent(old_page_num);
    }
    for &(child, _) in right {
        table.pager.ensure_loaded(child)?;
        table.pager.get(child)?.set_parent(new_page_num);
    }

    if was_root {
        create_new_root(table, new_page_num)
    } else {
        let new_old_max = subtree_max_key(&mut table.pager, old_page_num)?;
        {
            let mut parent = table.pager.get(parent_page_num)?;
            update_internal_key(&mut parent, old_max, new_old_max);
        }
        internal_node_insert(table, parent_page_num, new_page_num)
    }
}

/// Rebuilds an internal node's body from `(child, subtree max)` entries:
/// all but the last entry become cells, the last becomes the right child.
fn fill_internal(node: &mut Node, entries: &[(u32, u32)]) {
    let num_keys = (entries.len() - 1) as u32;
    node.set_internal_num_keys(num_keys);
    for (i, &(child, max)) in entries[..entries.len() - 1].iter().enumerate() {
        node.set_internal_child(i as u32, child);
        node.set_internal_key(i as u32, max);
    }
    node.set_right_child(entries[entries.len() - 1].0);
}

/// Renders the tree as an indented preorder dump, one node per line, keys
/// interleaved between child subtrees.
pub fn dump_tree(table: &mut Table) -> Result<String, Error> {
    let mut out = String::new();
    dump_node(&mut table.pager, table.root_page_num, 0, &mut out)?;
    Ok(out)
}

fn dump_node(
    pager: &mut Pager,
    page_num: u32,
    level: usize,
    out: &mut String,
) -> Result<(), Error> {
    pager.ensure_loaded(page_num)?;

    enum NodeInfo {
        Leaf { keys: Vec<u32> },
        Internal { cells: Vec<(u32, u32)>, right_child: u32 },
    }

    let info = {
        let node = pager.get(page_num)?;
        match node.node_type() {
            NodeType::Leaf => NodeInfo::Leaf {
                keys: (0..node.leaf_num_cells()).map(|i| node.leaf_key(i)).collect(),
            },
            NodeType::Internal => NodeInfo::Internal {
                cells: (0..node.internal_num_keys())
                    .map(|i| (node.internal_child(i), node.internal_key(i)))
                    .collect(),
                right_child: node.right_child(),
            },
        }
    };

    let indent = |out: &mut String, level: usize| {
        for _ in 0..level {
            out.push_str("  ");
        }
    };

    match info {
        NodeInfo::Leaf { keys } => {
            indent(out, level);
            out.push_str(&format!("- leaf (size {})\n", keys.len()));
            for key in keys {
                indent(out, level + 1);
                out.push_str(&format!("- {}\n", key));
            }
        }
        NodeInfo::Internal { cells, right_child } => {
            indent(out, level);
            out.push_str(&format!("- internal (size {})\n", cells.len()));
            for (child, key) in cells {
                dump_node(pager, child, level + 1, out)?;
                indent(out, level + 1);
                out.push_str(&format!("- key {}\n", key));
            }
            dump_node(pager, right_child, level + 1, out)?;
        }
    }
    Ok(())
}

/// The computed layout sizes, one `NAME: value` line each.
pub fn constants_report() -> String {
    format!(
        "ROW_SIZE: {}\n\
         COMMON_NODE_HEADER_SIZE: {}\n\
         LEAF_NODE_HEADER_SIZE: {}\n\
         LEAF_NODE_CELL_SIZE: {}\n\
         LEAF_NODE_SPACE_FOR_CELLS: {}\n\
         LEAF_NODE_MAX_CELLS: {}\n",
        ROW_SIZE,
        COMMON_NODE_HEADER_SIZE,
        LEAF_NODE_HEADER_SIZE,
        LEAF_NODE_CELL_SIZE,
        LEAF_NODE_SPACE_FOR_CELLS,
        LEAF_NODE_MAX_CELLS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_row(id: u32) -> Row {
        Row::new(id, &format!("user{}", id), &format!("person{}@example.com", id)).unwrap()
    }

    fn insert_ids(table: &mut Table, ids: impl IntoIterator<Item = u32>) {
        for id in ids {
            insert_row(table, &sample_row(id)).unwrap();
        }
    }

    /// Recursively checks node-local key order, key bounds, separator
    /// correctness and parent back-pointers. Returns the subtree's max key.
    fn check_subtree(
        pager: &mut Pager,
        page_num: u32,
        lo: u32,
        hi: u32,
        parent: Option<u32>,
    ) -> u32 {
        pager.ensure_loaded(page_num).unwrap();

        enum Info {
            Leaf(Vec<u32>),
            Internal(Vec<(u32, u32)>, u32),
        }
        let (info, is_root, node_parent) = {
            let node = pager.get(page_num).unwrap();
            let info = match node.node_type() {
                NodeType::Leaf => {
                    Info::Leaf((0..node.leaf_num_cells()).map(|i| node.leaf_key(i)).collect())
                }
                NodeType::Internal => Info::Internal(
                    (0..node.internal_num_keys())
                        .map(|i| (node.internal_child(i), node.internal_key(i)))
                        .collect(),
                    node.right_child(),
                ),
            };
            (info, node.is_root(), node.parent())
        };

        match parent {
            Some(expected) => {
                assert!(!is_root, "non-root node {} flagged as root", page_num);
                assert_eq!(node_parent, expected, "stale parent on page {}", page_num);
            }
            None => assert!(is_root, "root page {} not flagged as root", page_num),
        }

        match info {
            Info::Leaf(keys) => {
                let mut prev = None;
                for &key in &keys {
                    assert!(key > lo && key <= hi, "leaf key {} outside ({}, {}]", key, lo, hi);
                    if let Some(p) = prev {
                        assert!(key > p, "leaf keys not strictly ascending");
                    }
                    prev = Some(key);
                }
                *keys.last().expect("empty non-root leaf")
            }
            Info::Internal(cells, right_child) => {
                let mut bound = lo;
                for &(child, key) in &cells {
                    assert!(key > bound && key <= hi);
                    let child_max = check_subtree(pager, child, bound, key, Some(page_num));
                    assert_eq!(child_max, key, "separator is not the left subtree max");
                    bound = key;
                }
                check_subtree(pager, right_child, bound, hi, Some(page_num))
            }
        }
    }

    fn check_tree(table: &mut Table) {
        let root = table.root_page_num;
        let empty = {
            let node = table.pager.get_page(root).unwrap();
            node.node_type() == NodeType::Leaf && node.leaf_num_cells() == 0
        };
        if !empty {
            check_subtree(&mut table.pager, root, 0, u32::MAX, None);
        }
    }

    #[test]
    fn test_empty_table() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        assert!(select_rows(&mut table).unwrap().is_empty());
        assert_eq!(dump_tree(&mut table).unwrap(), "- leaf (size 0)\n");
    }

    #[test]
    fn test_basic_round_trip() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(tmp.path()).unwrap();
            insert_row(&mut table, &Row::new(1, "user1", "person1@example.com").unwrap()).unwrap();
            insert_row(&mut table, &Row::new(2, "user2", "person2@example.com").unwrap()).unwrap();

            let rows = select_rows(&mut table).unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].to_string(), "(1, user1, person1@example.com)");
            assert_eq!(rows[1].to_string(), "(2, user2, person2@example.com)");
            table.close().unwrap();
        }

        // Reopen and read the same rows back.
        let mut table = Table::open(tmp.path()).unwrap();
        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to_string(), "(1, user1, person1@example.com)");
        assert_eq!(rows[1].to_string(), "(2, user2, person2@example.com)");
    }

    #[test]
    fn test_duplicate_key_leaves_tree_untouched() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        insert_row(&mut table, &Row::new(1, "a", "a@x").unwrap()).unwrap();

        let before = table.pager.get_page(0).unwrap().data;
        let err = insert_row(&mut table, &Row::new(1, "b", "b@x").unwrap());
        assert!(matches!(err, Err(Error::DuplicateKey(1))));
        let after = table.pager.get_page(0).unwrap().data;
        assert_eq!(before[..], after[..]);

        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_string(), "(1, a, a@x)");
    }

    #[test]
    fn test_out_of_order_inserts_sort() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        insert_ids(&mut table, [3, 1, 2]);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_first_leaf_split_shape() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();

        insert_ids(&mut table, 1..=13);
        // Still a single leaf root.
        assert!(dump_tree(&mut table).unwrap().starts_with("- leaf (size 13)\n"));

        insert_ids(&mut table, [14]);
        let mut expected = String::from("- internal (size 1)\n");
        expected.push_str("  - leaf (size 7)\n");
        for key in 1..=7 {
            expected.push_str(&format!("    - {}\n", key));
        }
        expected.push_str("  - key 7\n");
        expected.push_str("  - leaf (size 7)\n");
        for key in 8..=14 {
            expected.push_str(&format!("    - {}\n", key));
        }
        assert_eq!(dump_tree(&mut table).unwrap(), expected);

        check_tree(&mut table);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=14).collect::<Vec<u32>>());
    }

    #[test]
    fn test_reverse_insertion_scans_ascending() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        insert_ids(&mut table, (1..=14).rev());

        check_tree(&mut table);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=14).collect::<Vec<u32>>());
    }

    #[test]
    fn test_persistence_across_close() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(tmp.path()).unwrap();
            insert_ids(&mut table, 1..=3);
            table.close().unwrap();
        }
        let mut table = Table::open(tmp.path()).unwrap();
        insert_ids(&mut table, [4]);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicate_after_split() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        insert_ids(&mut table, 1..=20);
        for id in [1, 7, 8, 14, 20] {
            assert!(matches!(
                insert_row(&mut table, &sample_row(id)),
                Err(Error::DuplicateKey(_))
            ));
        }
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<u32>>());
    }

    #[test]
    fn test_internal_split_ascending() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        // Well past one internal node's worth of leaves.
        insert_ids(&mut table, 1..=64);

        check_tree(&mut table);
        let dump = dump_tree(&mut table).unwrap();
        // The root split at least once more: there are nested internals.
        assert!(dump.contains("  - internal (size "));

        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=64).collect::<Vec<u32>>());
    }

    #[test]
    fn test_internal_split_descending() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        insert_ids(&mut table, (1..=64).rev());

        check_tree(&mut table);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=64).collect::<Vec<u32>>());
    }

    #[test]
    fn test_scattered_inserts_deep_tree() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        // 37 and 101 are coprime, so this visits 1..=100 in scattered order.
        let ids: Vec<u32> = (1..=100u32).map(|i| (i * 37) % 101).collect();
        insert_ids(&mut table, ids.iter().copied());

        check_tree(&mut table);
        let got: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(got, (1..=100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_deep_tree_persists() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(tmp.path()).unwrap();
            insert_ids(&mut table, 1..=64);
            table.close().unwrap();
        }

        let mut table = Table::open(tmp.path()).unwrap();
        check_tree(&mut table);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=64).collect::<Vec<u32>>());

        // The tree stays writable after reopen.
        insert_ids(&mut table, 65..=70);
        let ids: Vec<u32> = select_rows(&mut table).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=70).collect::<Vec<u32>>());
    }

    #[test]
    fn test_constants_report() {
        let report = constants_report();
        assert_eq!(
            report,
            "ROW_SIZE: 291\n\
             COMMON_NODE_HEADER_SIZE: 6\n\
             LEAF_NODE_HEADER_SIZE: 14\n\
             LEAF_NODE_CELL_SIZE: 295\n\
             LEAF_NODE_SPACE_FOR_CELLS: 4082\n\
             LEAF_NODE_MAX_CELLS: 13\n"
        );
    }

    #[test]
    fn test_rows_keep_values_after_splits() {
        let tmp = NamedTempFile::new().unwrap();
        let mut table = Table::open(tmp.path()).unwrap();
        insert_ids(&mut table, (1..=30).rev());

        let rows = select_rows(&mut table).unwrap();
        for (i, row) in rows.iter().enumerate() {
            let id = (i + 1) as u32;
            assert_eq!(row.id, id);
            assert_eq!(row.username(), format!("user{}", id));
            assert_eq!(row.email(), format!("person{}@example.com", id));
        }
    }
}
