//! # Pager
//!
//! The pager maps logical page numbers to 4 KiB buffers, hiding whether a
//! page is resident or must first be read from the database file. Pages are
//! loaded lazily on first access, held for the life of the table (no
//! eviction, no dirty tracking), and written back in ascending page order on
//! close.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::errors::Error;
use crate::storage::btree::{Node, PAGE_SIZE};

/// Capacity of the page cache. A request at or beyond this page number is an
/// error.
pub const TABLE_MAX_PAGES: usize = 100;

pub struct Pager {
    file: File,
    /// Number of pages the file held when it was opened. Only these can be
    /// read from disk; anything above is a freshly allocated, zeroed page.
    file_pages: u32,
    /// Logical high-water mark: on-disk pages plus pages allocated in memory
    /// since open.
    num_pages: u32,
    pages: heapless::Vec<Option<Arc<Mutex<Node>>>, TABLE_MAX_PAGES>,
}

impl Pager {
    /// Opens (or creates) the database file and snapshots its length.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corrupt,
                "Db file is not a whole number of pages ({} bytes).",
                file_length
            ));
        }
        let file_pages = (file_length / PAGE_SIZE as u64) as u32;
        info!(path = %path.display(), file_pages, "Opened database file.");

        Ok(Pager {
            file,
            file_pages,
            num_pages: file_pages,
            pages: heapless::Vec::new(),
        })
    }

    /// Makes `page_num` resident, reading it from disk when the file already
    /// contains it and installing a zeroed buffer otherwise. Raises the
    /// page high-water mark past `page_num`.
    pub fn ensure_loaded(&mut self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(Error::PageOutOfBounds(page_num));
        }

        while self.pages.len() <= page_num as usize {
            self.pages
                .push(None)
                .map_err(|_| err!(Storage, "Page cache slots exhausted."))?;
        }

        if self.pages[page_num as usize].is_none() {
            let mut node = Node::new();
            if page_num < self.file_pages {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut node.data)?;
                debug!(page_num, "Loaded page from disk.");
            }
            self.pages[page_num as usize] = Some(Arc::new(Mutex::new(node)));

            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }
        Ok(())
    }

    /// Borrows a resident page. Callers load pages up front with
    /// [`Pager::ensure_loaded`] so that a split can hold two different pages
    /// at once.
    pub fn get(&self, page_num: u32) -> Result<MutexGuard<'_, Node>, Error> {
        let slot = self
            .pages
            .get(page_num as usize)
            .and_then(|p| p.as_ref())
            .ok_or_else(|| err!(Storage, "Page {} is not resident.", page_num))?;

        slot.try_lock()
            .map_err(|_| err!(Storage, "Page {} is already borrowed.", page_num))
    }

    /// Loads and borrows a page in one step, for single-page operations.
    pub fn get_page(&mut self, page_num: u32) -> Result<MutexGuard<'_, Node>, Error> {
        self.ensure_loaded(page_num)?;
        self.get(page_num)
    }

    /// Next page number at the end-of-file watermark. Until free-page
    /// reclamation exists, new pages are always appended there. Nothing is
    /// reserved; the caller must initialize the page right away.
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Writes the resident page back to its slot in the file.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        let page = self
            .pages
            .get(page_num as usize)
            .and_then(|p| p.as_ref())
            .ok_or_else(|| err!(Storage, "Tried to flush page {} which is not resident.", page_num))?
            .clone();
        let node = page
            .try_lock()
            .map_err(|_| err!(Storage, "Page {} is already borrowed.", page_num))?;

        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&node.data)?;
        Ok(())
    }

    /// Flushes every resident page in ascending order, sizes the file to
    /// exactly `num_pages` pages and releases the buffers.
    pub fn close(&mut self) -> Result<(), Error> {
        for i in 0..self.num_pages {
            if self
                .pages
                .get(i as usize)
                .map_or(false, |p| p.is_some())
            {
                self.flush(i)?;
            }
        }
        self.file.set_len(self.num_pages as u64 * PAGE_SIZE as u64)?;
        self.file.sync_all()?;

        for slot in self.pages.iter_mut() {
            *slot = None;
        }
        info!(num_pages = self.num_pages, "Flushed and closed database file.");
        Ok(())
    }
}
