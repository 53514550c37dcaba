//! Wire-shaped request and response payloads (spec.md §6). Structured
//! bodies only — the raw image bytes that ride alongside some of these in
//! multi-part requests/responses are handled by `ec-server`, not modeled
//! here.
//!
//! Shaped after the teacher's `Success<T>`/`Response<T>` envelope
//! (`form-types::state::state`), generalized to carry a machine-readable
//! error kind per spec.md §7 instead of a bare string reason.

pub mod admin;
pub mod auth;
pub mod envelope;
pub mod id;
pub mod info;
pub mod mark;

pub use envelope::Outcome;
