use std::path::Path;

use log::{error, info, warn};

use crate::error::{Error, Result};
use crate::pager::Pager;
use crate::row::Row;
use crate::{PAGE_SIZE, ROW_SIZE, ROWS_PER_PAGE, TABLE_MAX_ROWS};

/// An append-only sequence of rows stored in a paged file.
///
/// Rows live in memory until [`Table::close`], which is the only point where
/// they are written back. Dropping an unclosed table performs the same flush.
pub struct Table {
    // Only `None` once the table has been closed.
    pager: Option<Pager>,
    num_rows: usize,
}

impl Table {
    /// Opens the table stored at `path`, creating an empty one if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pager = Pager::open(path)?;
        let file_length = pager.file_length();
        let num_rows = rows_in_file(file_length);

        if num_rows > TABLE_MAX_ROWS {
            return Err(Error::FileTooLarge {
                rows: num_rows,
                max_rows: TABLE_MAX_ROWS,
            });
        }
        if stray_bytes(file_length) > 0 {
            warn!(
                "ignoring {} trailing bytes that do not form a whole row",
                stray_bytes(file_length)
            );
        }

        info!("table has {num_rows} rows");
        Ok(Self {
            pager: Some(pager),
            num_rows,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Appends `row` after the last row of the table.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        if self.num_rows >= TABLE_MAX_ROWS {
            return Err(Error::CapacityExceeded {
                max_rows: TABLE_MAX_ROWS,
            });
        }

        let (page_num, offset) = row_slot(self.num_rows);
        let page = self.pager().get_page(page_num)?;
        row.serialize(page, offset);
        self.num_rows += 1;
        Ok(())
    }

    /// Iterates over every row in insertion order.
    pub fn scan(&mut self) -> Scan<'_> {
        Scan {
            table: self,
            next_row: 0,
        }
    }

    /// Flushes all rows to disk and releases the file.
    pub fn close(mut self) -> Result<()> {
        match self.pager.take() {
            Some(pager) => pager.close(self.num_rows),
            None => Ok(()),
        }
    }

    fn read_row(&mut self, row_num: usize) -> Result<Row> {
        let (page_num, offset) = row_slot(row_num);
        let page = self.pager().get_page(page_num)?;
        Ok(Row::deserialize(page, offset))
    }

    fn pager(&mut self) -> &mut Pager {
        self.pager.as_mut().expect("table used after close")
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if let Some(pager) = self.pager.take() {
            if let Err(e) = pager.close(self.num_rows) {
                error!("failed to flush table on drop: {e}");
            }
        }
    }
}

/// Iterator returned by [`Table::scan`].
pub struct Scan<'a> {
    table: &'a mut Table,
    next_row: usize,
}

impl Iterator for Scan<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.table.num_rows {
            return None;
        }

        let row = self.table.read_row(self.next_row);
        self.next_row += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.num_rows - self.next_row;
        (remaining, Some(remaining))
    }
}

/// Page number and byte offset within that page of row `row_num`.
fn row_slot(row_num: usize) -> (usize, usize) {
    (row_num / ROWS_PER_PAGE, (row_num % ROWS_PER_PAGE) * ROW_SIZE)
}

/// Number of rows held by a file of `file_length` bytes.
///
/// Every page but the last is flushed with exactly `ROWS_PER_PAGE` rows, so
/// only the tail past the last page boundary is measured in rows. A fraction
/// of a row at the end is dropped.
fn rows_in_file(file_length: u64) -> usize {
    let full_pages = (file_length / PAGE_SIZE as u64) as usize;
    let tail = (file_length % PAGE_SIZE as u64) as usize;
    full_pages * ROWS_PER_PAGE + (tail / ROW_SIZE).min(ROWS_PER_PAGE)
}

fn stray_bytes(file_length: u64) -> usize {
    let tail = (file_length % PAGE_SIZE as u64) as usize;
    if tail >= ROWS_PER_PAGE * ROW_SIZE {
        tail - ROWS_PER_PAGE * ROW_SIZE
    } else {
        tail % ROW_SIZE
    }
}
