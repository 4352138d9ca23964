use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to open database file {}: {source}", path.display())]
    StorageOpen { path: PathBuf, source: io::Error },

    #[error("error reading page {page_num}: {source}")]
    StorageRead { page_num: usize, source: io::Error },

    #[error("error writing page {page_num}: {source}")]
    StorageWrite { page_num: usize, source: io::Error },

    #[error("error syncing database file: {0}")]
    StorageSync(#[source] io::Error),

    #[error("table full: at most {max_rows} rows")]
    CapacityExceeded { max_rows: usize },

    #[error("page {page_num} out of bounds (max: {max_pages})")]
    PageOutOfBounds { page_num: usize, max_pages: usize },

    #[error("database file holds {rows} rows but a table holds at most {max_rows}")]
    FileTooLarge { rows: usize, max_rows: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
