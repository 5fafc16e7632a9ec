use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Errors surfaced to callers of this crate.
///
/// Staleness is deliberately not one of these variants: it is an internal
/// signal that a refresh should run, not a user-visible fault. This crate
/// represents that signal as the plain `bool`
/// [`crate::map::Handle::refresh_check`] returns, so it never needs a `pub`
/// constructor to begin with.
#[derive(Debug)]
pub enum Error {
    /// `open`/`openat`/`fstat` on the database file failed.
    OpenFailed(io::Error),
    /// `mmap` failed, typically address space exhaustion on 32-bit hosts.
    MmapFailed(io::Error),
    /// A structural read fell outside the mapped region, or a record header
    /// was impossible (e.g. a length that would overrun the file).
    Corrupt(&'static str),
    /// The lookup exhausted its probe sequence without a match. This is a
    /// normal control outcome, not a fault.
    NotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OpenFailed(e) => write!(f, "failed to open database file: {e}"),
            Error::MmapFailed(e) => write!(f, "failed to map database file: {e}"),
            Error::Corrupt(msg) => write!(f, "corrupt database: {msg}"),
            Error::NotFound => write!(f, "key not found"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::OpenFailed(e) | Error::MmapFailed(e) => Some(e),
            Error::Corrupt(_) | Error::NotFound => None,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(format!("{}", Error::NotFound), "key not found");
        assert!(format!("{}", Error::Corrupt("bad klen")).contains("bad klen"));
    }
}
