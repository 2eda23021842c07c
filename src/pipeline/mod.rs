//! Pipeline stages for one prompt-generation request.
//!
//! Each submodule implements exactly one step and is driven by
//! [`crate::generate`], which owns sequencing, cleanup and the request budget.
//!
//! ## Data Flow
//!
//! ```text
//! storage ──▶ upload ──▶ poll ──▶ generate
//! (temp file)  (remote)   (ready?)  (text)
//! ```
//!
//! 1. [`storage`]: write the uploaded bytes to a temp file; the returned
//!    guard deletes it on every exit path
//! 2. [`upload`]: send the temp file to the remote service, yielding a
//!    handle that is usually still processing
//! 3. [`poll`]: re-query the handle until ready or failed; the only
//!    state machine in the crate
//! 4. [`generate`]: one generation call over both ready handles; the text
//!    comes back as the model wrote it
//!
//! Steps 1-3 run once per input, and the two inputs proceed concurrently.

pub mod generate;
pub mod poll;
pub mod storage;
pub mod upload;
