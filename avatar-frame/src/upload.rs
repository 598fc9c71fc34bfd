//! Upload filename checks

use crate::error::{Error, Result};

/// Check if the file extension is allowed.
///
/// The name needs a `.`; whatever follows the last one is compared
/// case-insensitively.
pub fn allowed_file<S: AsRef<str>>(filename: &str, extensions: &[S]) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.as_ref() == ext))
}

pub fn check_filename<S: AsRef<str>>(filename: &str, extensions: &[S]) -> Result<()> {
    if filename.is_empty() {
        return Err(Error::EmptyFilename);
    }
    if !allowed_file(filename, extensions) {
        return Err(Error::InvalidExtension(filename.to_string()));
    }
    Ok(())
}
