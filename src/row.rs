use std::borrow::Cow;
use std::fmt;

use crate::{
    COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE, EMAIL_OFFSET, EMAIL_SIZE, ID_OFFSET, ID_SIZE,
    USERNAME_OFFSET, USERNAME_SIZE,
};

/// One fixed-width row of the table.
///
/// Text columns are stored as zero-padded byte arrays exactly as they sit on
/// disk, so (de)serialization is a plain copy of each field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i32,
    username: [u8; USERNAME_SIZE],
    email: [u8; EMAIL_SIZE],
}

impl Row {
    /// Builds a row, returning `None` if either column exceeds its capacity.
    pub fn new(id: i32, username: &str, email: &str) -> Option<Self> {
        if username.len() > COLUMN_USERNAME_SIZE || email.len() > COLUMN_EMAIL_SIZE {
            return None;
        }

        let mut row = Self {
            id,
            username: [0; USERNAME_SIZE],
            email: [0; EMAIL_SIZE],
        };
        row.username[..username.len()].copy_from_slice(username.as_bytes());
        row.email[..email.len()].copy_from_slice(email.as_bytes());
        Some(row)
    }

    pub fn username(&self) -> Cow<'_, str> {
        until_nul(&self.username)
    }

    pub fn email(&self) -> Cow<'_, str> {
        until_nul(&self.email)
    }

    /// Writes the row into `page` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `page` has fewer than `offset + ROW_SIZE` bytes.
    pub fn serialize(&self, page: &mut [u8], offset: usize) {
        page[offset + ID_OFFSET..offset + ID_OFFSET + ID_SIZE]
            .copy_from_slice(&self.id.to_le_bytes());
        page[offset + USERNAME_OFFSET..offset + USERNAME_OFFSET + USERNAME_SIZE]
            .copy_from_slice(&self.username);
        page[offset + EMAIL_OFFSET..offset + EMAIL_OFFSET + EMAIL_SIZE]
            .copy_from_slice(&self.email);
    }

    /// Reads the row stored in `page` at `offset`. Inverse of [`Row::serialize`].
    ///
    /// # Panics
    ///
    /// Panics if `page` has fewer than `offset + ROW_SIZE` bytes.
    pub fn deserialize(page: &[u8], offset: usize) -> Self {
        let mut id = [0; ID_SIZE];
        let mut username = [0; USERNAME_SIZE];
        let mut email = [0; EMAIL_SIZE];

        id.copy_from_slice(&page[offset + ID_OFFSET..offset + ID_OFFSET + ID_SIZE]);
        username.copy_from_slice(
            &page[offset + USERNAME_OFFSET..offset + USERNAME_OFFSET + USERNAME_SIZE],
        );
        email.copy_from_slice(&page[offset + EMAIL_OFFSET..offset + EMAIL_OFFSET + EMAIL_SIZE]);

        Self {
            id: i32::from_le_bytes(id),
            username,
            email,
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}

fn until_nul(field: &[u8]) -> Cow<'_, str> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end])
}
