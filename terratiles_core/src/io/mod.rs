//! Storage contexts: how tile bytes are read from backing stores.
//!
//! A [`StorageContext`] reads a named object (or a byte range of it) from one
//! container — a directory, an HTTP prefix, an S3 bucket. Contexts are
//! process-wide, pooled by (kind, container) in the [`ContextPool`], and must
//! tolerate concurrent range reads.

mod file;
mod http;
mod pool;
mod s3;
mod storage;

pub use file::FileContext;
pub use http::HttpContext;
pub use pool::ContextPool;
pub use s3::S3Context;
pub use storage::{RetryPolicy, SharedContext, StorageContext, StorageError, read_with_retry};
