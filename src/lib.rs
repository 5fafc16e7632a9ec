//! A constant, memory-mapped key→value database.
//!
//! `mcdb` is a read-optimized on-disk hash map built once and then opened by
//! many readers through a single memory map. This crate provides the
//! reader-side core: the on-disk format, the open-addressed hash lookup
//! protocol, and the live-refresh protocol that lets long-lived readers pick
//! up a replacement database file without synchronous I/O on the hot path.
//!
//! The builder (`maker`), dataset-specific encoders (users, groups, hosts,
//! …), command-line tools, and the sorting/collision checker used while
//! building are out of scope for the *format*; this crate ships a minimal
//! conforming [`builder`] so the reader side can be tested and used without
//! an external writer, but it is not meant to replace a real maker tool.
//!
//! # Example
//!
//! ```
//! use mcdb::builder::build_to_dir;
//! use mcdb::map::Handle;
//! use mcdb::registration::Registration;
//!
//! # fn main() -> mcdb::Result<()> {
//! let dir = tempfile::tempdir().unwrap();
//! build_to_dir(dir.path(), "example.mcdb", &[(b"key", b"value")]).unwrap();
//!
//! let handle = Handle::open(dir.path(), "example.mcdb")?;
//! let reg = Registration::new(&handle);
//! assert_eq!(reg.cursor().find(b"key")?, Some(&b"value"[..]));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cursor;
pub mod dataset;
pub mod directory;
pub mod error;
pub mod flags;
pub mod format;
pub mod iter;
pub mod map;
pub mod node;
pub mod registration;
pub mod stat;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use flags::RegisterFlags;
pub use map::{Advise, Handle, OpenOptions};
pub use registration::Registration;
