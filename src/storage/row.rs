//! # Row Management
//!
//! The table has a fixed schema: `id INT PRIMARY KEY`, `username VARCHAR(32)`,
//! `email VARCHAR(255)`. Rows are serialized into leaf cells at fixed offsets
//! so a row can be read back without scanning for field boundaries.

use crate::errors::Error;

pub const ID_SIZE: usize = 4;
pub const USERNAME_SIZE: usize = 32;
pub const EMAIL_SIZE: usize = 255;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// On-disk width of one serialized row.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single table row.
///
/// Strings are fixed-width, null-terminated byte arrays; one byte of each
/// column is reserved for the terminator, so a username may hold at most 31
/// bytes and an email at most 254.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_SIZE],
    pub email: [u8; EMAIL_SIZE],
}

fn fixed_bytes_to_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).to_string()
}

impl Row {
    /// Builds a row from parsed statement arguments, enforcing column widths.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, Error> {
        if username.len() >= USERNAME_SIZE {
            return Err(err!(
                StringTooLong,
                "Username exceeds {} bytes.",
                USERNAME_SIZE - 1
            ));
        }
        if email.len() >= EMAIL_SIZE {
            return Err(err!(StringTooLong, "Email exceeds {} bytes.", EMAIL_SIZE - 1));
        }

        // Lengths are validated above, so both columns copy whole into their
        // zero-padded buffers; the remaining zeros are the terminator and
        // padding.
        let mut username_col = [0u8; USERNAME_SIZE];
        username_col[..username.len()].copy_from_slice(username.as_bytes());
        let mut email_col = [0u8; EMAIL_SIZE];
        email_col[..email.len()].copy_from_slice(email.as_bytes());

        Ok(Row {
            id,
            username: username_col,
            email: email_col,
        })
    }

    /// Writes the row into `buf`, which must be exactly `ROW_SIZE` bytes.
    ///
    /// The id is stored little-endian; the string columns are copied verbatim,
    /// trailing padding included.
    pub fn serialize(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&self.username);
        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&self.email);
    }

    /// Reads a row back from a `ROW_SIZE` slice.
    pub fn deserialize(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&buf[ID_OFFSET..ID_OFFSET + ID_SIZE]);
        let mut username = [0u8; USERNAME_SIZE];
        username.copy_from_slice(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let mut email = [0u8; EMAIL_SIZE];
        email.copy_from_slice(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        Row {
            id: u32::from_le_bytes(id_bytes),
            username,
            email,
        }
    }

    pub fn username(&self) -> String {
        fixed_bytes_to_string(&self.username)
    }

    pub fn email(&self) -> String {
        fixed_bytes_to_string(&self.email)
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}
