//! Ownership signature stored at offset 0 of lockrun-managed lock files.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Marker identifying a lock file that lockrun created and may remove.
pub const SIGNATURE: &[u8] = b"lockrun lock file\n";

/// What the start of a lock file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureState {
    /// The file is empty.
    Absent,
    /// The file holds exactly the signature.
    Present,
    /// The file holds something else. It must not be used.
    Mismatch,
}

/// Inspect the file contents against [`SIGNATURE`].
///
/// Reads at most one byte past the signature length, so trailing content
/// after a correct prefix is still a mismatch.
pub fn check_signature<F: Read + Seek>(file: &mut F) -> io::Result<SignatureState> {
    file.seek(SeekFrom::Start(0))?;
    let mut content = Vec::with_capacity(SIGNATURE.len() + 1);
    file.take(SIGNATURE.len() as u64 + 1)
        .read_to_end(&mut content)?;

    Ok(if content.is_empty() {
        SignatureState::Absent
    } else if content == SIGNATURE {
        SignatureState::Present
    } else {
        SignatureState::Mismatch
    })
}

/// Whether the file could still turn into the signature: it is empty or holds
/// a leading part of it, as seen while another process is writing it.
///
/// Used without holding a lock, so a partial bootstrap write is not an error.
pub fn may_hold_signature<F: Read + Seek>(file: &mut F) -> io::Result<bool> {
    file.seek(SeekFrom::Start(0))?;
    let mut content = Vec::with_capacity(SIGNATURE.len() + 1);
    file.take(SIGNATURE.len() as u64 + 1)
        .read_to_end(&mut content)?;

    Ok(SIGNATURE.starts_with(&content))
}

/// Write the signature at offset 0.
///
/// Callers must hold an exclusive lock on the file, and must only call this
/// on a file whose state is [`SignatureState::Absent`].
pub fn write_signature<F: Write + Seek>(file: &mut F) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(SIGNATURE)?;
    file.flush()
}
