//! Payload sinks for attachment-seed.
//!
//! This crate provides the concrete [`bulk_upload::Sink`] implementations used by
//! the CLI:
//!
//! - **Local**: payloads written below a directory, remote tier mirrored to a
//!   second directory
//! - **S3**: multipart uploads in fixed-size parts, remote tier as a server-side copy
//! - **Dry run**: validates the payload header and discards the rest
//!
//! Every sink is idempotent for repeated `(destination_key, payload_name)`
//! submissions: a retry overwrites the previous copy with identical bytes.

mod dry_run;
mod local;
mod s3;

pub use dry_run::DryRunSink;
pub use local::{FilesystemSink, RemoteSidecar};
pub use s3::{S3Sink, DEFAULT_PART_SIZE};

/// Map a destination key such as `Movies/42` to a single safe path segment.
pub fn sanitize_key(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => format!("_{sanitized}"),
        _ => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Movies/42"), "Movies_42");
        assert_eq!(sanitize_key("a b:c"), "a_b_c");
        assert_eq!(sanitize_key(".."), "_..");
        assert_eq!(sanitize_key(""), "_");
        assert_eq!(sanitize_key("plain-key_1.x"), "plain-key_1.x");
    }
}
