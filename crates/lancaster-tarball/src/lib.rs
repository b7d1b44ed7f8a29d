//! Virtual tarball: presents an ordered list of files as one contiguous,
//! content-addressed byte stream.
//!
//! [`TarballReader`] opens a fixed file list for random-access read, hashing
//! each file eagerly so its [`HashId`][lancaster_proto::HashId] is known
//! before the first byte goes on the wire. [`TarballWriter`] does the
//! receiving side: it decodes metadata, verifies it against an announced
//! `hash_id`, and stages writes into `.part` files that are verified and
//! renamed into place on [`TarballWriter::close`].

pub mod error;
pub mod file;
pub mod hash;
pub mod reader;
pub mod traits;
pub mod writer;

pub use error::TarballError;
pub use file::{FileSpec, TarballFile};
pub use hash::{decode_metadata, derive_hash_id, encode_metadata, hash_file_contents};
pub use reader::TarballReader;
pub use traits::{ReadAt, WriteAt};
pub use writer::TarballWriter;
