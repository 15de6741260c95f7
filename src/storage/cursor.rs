//! # Database Cursor
//!
//! A cursor is a position within the table: a page number, a cell index
//! inside that page, and an end-of-table flag. Cursors are only created by
//! tree operations ([`Cursor::find`], [`Cursor::start`]); they hold no page
//! ownership and do not survive structural changes to the tree.

use tracing::trace;

use super::btree::NodeType;
use super::table::Table;
use crate::errors::Error;

pub struct Cursor<'a> {
    /// The table being navigated.
    pub table: &'a mut Table,
    /// Current leaf page.
    pub page_num: u32,
    /// Current cell within the page.
    pub cell_num: u32,
    /// Set when the cursor has moved one past the last row.
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at `key`, or at the index where `key` would be
    /// inserted. Descends from the root through internal nodes; an equal
    /// separator key steers into the left-hand child.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let mut page_num = table.root_page_num;

        loop {
            table.pager.ensure_loaded(page_num)?;
            let (node_type, next) = {
                let node = table.pager.get(page_num)?;
                match node.node_type() {
                    NodeType::Leaf => (NodeType::Leaf, node.leaf_find(key)),
                    NodeType::Internal => {
                        let child_index = node.internal_find_child(key);
                        (NodeType::Internal, node.internal_child(child_index))
                    }
                }
            };

            match node_type {
                NodeType::Leaf => {
                    trace!(key, page_num, cell_num = next, "Located leaf position.");
                    return Ok(Cursor {
                        table,
                        page_num,
                        cell_num: next,
                        end_of_table: false,
                    });
                }
                NodeType::Internal => page_num = next,
            }
        }
    }

    /// Positions a cursor at the first row of the table.
    pub fn start(table: &'a mut Table) -> Result<Self, Error> {
        let mut cursor = Cursor::find(table, 0)?;
        let num_cells = cursor.table.pager.get(cursor.page_num)?.leaf_num_cells();
        cursor.end_of_table = num_cells == 0;
        Ok(cursor)
    }

    /// Copies the serialized row at the cursor into `buf`.
    pub fn read_value(&mut self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let node = self.table.pager.get(self.page_num)?;
        buf.clear();
        buf.extend_from_slice(node.leaf_value(self.cell_num));
        Ok(())
    }

    /// Advances to the next row, following the sibling link when the current
    /// leaf is exhausted.
    pub fn advance(&mut self) -> Result<(), Error> {
        let node = self.table.pager.get(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= node.leaf_num_cells() {
            let next_page_num = node.next_leaf();
            drop(node);
            if next_page_num == 0 {
                // Rightmost leaf.
                self.end_of_table = true;
            } else {
                self.page_num = next_page_num;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
