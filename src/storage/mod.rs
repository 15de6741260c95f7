pub mod btree;
pub mod cursor;
pub mod pager;
pub mod row;
pub mod table;

pub use row::Row;
pub use table::{constants_report, dump_tree, insert_row, select_rows, Table};
