//! Data access layer for project-relations listings.
//!
//! Repositories hide where entities come from behind [`EntitySource`],
//! so the snapshot cache can degrade from the live upstream to the
//! static fallback without knowing about either.

mod fallback;
mod source;
pub mod upstream;

pub use fallback::FallbackRepository;
pub use source::EntitySource;
pub use upstream::UpstreamRepository;
