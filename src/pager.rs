use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::{PAGE_SIZE, ROW_SIZE, ROWS_PER_PAGE, TABLE_MAX_PAGES};

pub type Page = [u8; PAGE_SIZE];

/// Owns the database file and the pages materialized from it.
///
/// A page is read from disk the first time it is requested and stays in
/// memory until [`Pager::close`]; nothing is written back before then.
pub struct Pager {
    file: File,
    file_length: u64,
    pages: Vec<Option<Box<Page>>>,
}

impl Pager {
    /// Opens the database file, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_error = |source| Error::StorageOpen {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(open_error)?;
        let file_length = file.metadata().map_err(open_error)?.len();

        info!("opened {} ({file_length} bytes)", path.display());
        Ok(Self {
            file,
            file_length,
            pages: (0..TABLE_MAX_PAGES).map(|_| None).collect(),
        })
    }

    /// Length of the file in bytes when it was opened.
    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    #[cfg(test)]
    fn is_resident(&self, page_num: usize) -> bool {
        self.pages.get(page_num).is_some_and(Option::is_some)
    }

    /// Returns page `page_num`, loading it from disk on first access.
    ///
    /// Pages at or past the end of the file come back zero-filled, as does
    /// the unread remainder of a short final page.
    pub fn get_page(&mut self, page_num: usize) -> Result<&mut Page> {
        if page_num >= TABLE_MAX_PAGES {
            return Err(Error::PageOutOfBounds {
                page_num,
                max_pages: TABLE_MAX_PAGES,
            });
        }

        let page = match self.pages[page_num].take() {
            Some(page) => page,
            None => self.load_page(page_num)?,
        };
        let page = self.pages[page_num].insert(page);
        Ok(&mut **page)
    }

    fn load_page(&mut self, page_num: usize) -> Result<Box<Page>> {
        let mut page = Box::new([0; PAGE_SIZE]);
        let offset = page_offset(page_num);

        if offset < self.file_length {
            let read = read_at(&mut self.file, offset, &mut page[..])
                .map_err(|source| Error::StorageRead { page_num, source })?;
            debug!("loaded page {page_num} ({read} bytes)");
        } else {
            debug!("allocated page {page_num}");
        }

        Ok(page)
    }

    /// Writes back every resident page holding one of the first `num_rows`
    /// rows, then releases the pages and the file.
    ///
    /// Only the occupied bytes of each page are written, so the last page
    /// may be shorter than [`PAGE_SIZE`] on disk. Resources are released even
    /// when a write fails.
    pub fn close(mut self, num_rows: usize) -> Result<()> {
        let result = self.flush_rows(num_rows);
        info!("closed database ({num_rows} rows)");
        result
    }

    fn flush_rows(&mut self, num_rows: usize) -> Result<()> {
        let full_pages = num_rows / ROWS_PER_PAGE;
        for page_num in 0..full_pages {
            self.flush(page_num, ROWS_PER_PAGE * ROW_SIZE)?;
        }

        let additional_rows = num_rows % ROWS_PER_PAGE;
        if additional_rows > 0 {
            self.flush(full_pages, additional_rows * ROW_SIZE)?;
        }

        self.file.sync_all().map_err(Error::StorageSync)
    }

    fn flush(&mut self, page_num: usize, size: usize) -> Result<()> {
        let Some(page) = self.pages.get(page_num).and_then(Option::as_deref) else {
            return Ok(());
        };

        write_at(&mut self.file, page_offset(page_num), &page[..size])
            .map_err(|source| Error::StorageWrite { page_num, source })?;
        debug!("flushed page {page_num} ({size} bytes)");
        Ok(())
    }
}

fn page_offset(page_num: usize) -> u64 {
    (page_num * PAGE_SIZE) as u64
}

/// Reads into `buf` until it is full or the file ends; returns the byte count.
fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    file.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn write_at(file: &mut File, offset: u64, data: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn it_creates_a_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let pager = Pager::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(pager.file_length(), 0);
    }

    #[test]
    fn it_fails_to_open_a_directory() {
        let dir = tempdir().unwrap();

        let result = Pager::open(dir.path());

        assert!(matches!(result, Err(Error::StorageOpen { .. })));
    }

    #[test]
    fn it_zero_fills_pages_past_the_end_of_file() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        assert!(!pager.is_resident(5));
        let page = pager.get_page(5).unwrap();

        assert!(page.iter().all(|&b| b == 0));
        assert!(pager.is_resident(5));
    }

    #[test]
    fn it_loads_a_short_page_and_zero_fills_the_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut contents = vec![0xAB; PAGE_SIZE];
        contents.extend_from_slice(&[0xCD; 10]);
        std::fs::write(&path, &contents).unwrap();

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.file_length(), (PAGE_SIZE + 10) as u64);

        assert!(pager.get_page(0).unwrap().iter().all(|&b| b == 0xAB));
        let page = pager.get_page(1).unwrap();
        assert!(page[..10].iter().all(|&b| b == 0xCD));
        assert!(page[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn it_keeps_changes_to_a_resident_page() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        pager.get_page(2).unwrap()[100] = 42;

        assert_eq!(pager.get_page(2).unwrap()[100], 42);
    }

    #[test]
    fn it_rejects_pages_past_the_table_limit() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        let result = pager.get_page(TABLE_MAX_PAGES);

        assert!(matches!(
            result,
            Err(Error::PageOutOfBounds { page_num, max_pages })
                if page_num == TABLE_MAX_PAGES && max_pages == TABLE_MAX_PAGES
        ));
    }

    #[test]
    fn it_writes_only_occupied_bytes_on_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut pager = Pager::open(&path).unwrap();
        pager.get_page(0).unwrap().fill(1);
        pager.get_page(1).unwrap().fill(2);

        pager.close(ROWS_PER_PAGE + 2).unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents.len(), PAGE_SIZE + 2 * ROW_SIZE);
        assert!(contents[..ROWS_PER_PAGE * ROW_SIZE].iter().all(|&b| b == 1));
        assert!(contents[ROWS_PER_PAGE * ROW_SIZE..PAGE_SIZE].iter().all(|&b| b == 0));
        assert!(contents[PAGE_SIZE..].iter().all(|&b| b == 2));
    }

    #[test]
    fn it_skips_pages_that_were_never_touched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, vec![9u8; PAGE_SIZE]).unwrap();

        let mut pager = Pager::open(&path).unwrap();
        pager.get_page(1).unwrap().fill(3);
        pager.close(ROWS_PER_PAGE + 1).unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert!(contents[..PAGE_SIZE].iter().all(|&b| b == 9));
        assert_eq!(&contents[PAGE_SIZE..], &[3u8; ROW_SIZE][..]);
    }

    #[test]
    fn it_writes_nothing_for_an_empty_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut pager = Pager::open(&path).unwrap();
        pager.get_page(0).unwrap();

        pager.close(0).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn it_reports_write_faults_on_close() {
        let mut pager = Pager::open("/dev/full").unwrap();
        pager.get_page(0).unwrap().fill(1);

        let result = pager.close(1);

        assert!(matches!(result, Err(Error::StorageWrite { page_num: 0, .. })));
    }
}
