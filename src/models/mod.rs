//! Data models for the SEO metadata service.
//!
//! Documents serialize as camelCase JSON and are stored verbatim, one
//! object per page identifier.

pub mod metadata;
