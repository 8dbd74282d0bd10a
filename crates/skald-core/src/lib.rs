pub mod canon;
pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use error::SkaldError;
pub use types::*;

/// Current UTC time as an RFC3339 string. All persisted timestamps use this.
pub fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

/// Parse an RFC3339 timestamp; `None` on malformed input.
pub fn parse_rfc3339(ts: &str) -> Option<time::OffsetDateTime> {
    time::OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339).ok()
}
