//! compose-scrub - Blob filter for history rewrites
//!
//! This library strips database connection strings from `docker-compose.yml`
//! while a history-rewriting tool replays every blob of a repository. The
//! host hands over each blob's content and logical path; the scrubber
//! returns the content to persist.
//!
//! # Key Features
//!
//! - **Path gating**: only blobs whose path equals the target exactly are touched
//! - **Line filtering**: every line containing the marker substring is dropped
//! - **Order preservation**: retained lines keep their original relative order
//! - **Strict decoding**: non-UTF-8 paths or target content are errors, never lossy
//! - **Checksums**: optional SHA-256/SHA-512 digest of the bytes written
//!
//! # Examples
//!
//! **Default target** - `docker-compose.yml` and `DB_CONNECTION_STRING=`:
//!
//! ```
//! use compose_scrub::scrub;
//!
//! let content = b"web:\n  environment:\n    - DB_CONNECTION_STRING=mongodb://u:p@host/db\n  image: x\n";
//! let scrubbed = scrub(content, b"docker-compose.yml").unwrap();
//! assert_eq!(scrubbed, b"web:\n  environment:\n  image: x");
//!
//! // Any other path passes through untouched
//! let other = scrub(b"DB_CONNECTION_STRING=secret\n", b"other.yml").unwrap();
//! assert_eq!(other, b"DB_CONNECTION_STRING=secret\n");
//! ```
//!
//! **Host write-back** - scrub the host's blob record in place:
//!
//! ```
//! use compose_scrub::{Blob, BlobMetadata, Scrubber, TrailingNewline};
//!
//! let scrubber = Scrubber::default().with_trailing_newline(TrailingNewline::Preserve);
//! let mut blob = Blob::new("DB_CONNECTION_STRING=x\nports: []\n");
//! let metadata = BlobMetadata::new("docker-compose.yml");
//!
//! let removed = scrubber.apply(&mut blob, &metadata).unwrap();
//! assert_eq!(removed, 1);
//! assert_eq!(blob.data, b"ports: []\n");
//! ```
//!
//! **Streaming** - scrub a reader into a writer with a checksum:
//!
//! ```no_run
//! use compose_scrub::{scrub_streaming, DigestAlgorithm, Scrubber};
//! use std::fs::File;
//!
//! let input = File::open("docker-compose.yml").unwrap();
//! let mut output = File::create("docker-compose.scrubbed.yml").unwrap();
//! let report = scrub_streaming(
//!     input,
//!     &mut output,
//!     b"docker-compose.yml",
//!     &Scrubber::default(),
//!     Some(DigestAlgorithm::Sha256),
//! )
//! .unwrap();
//! println!("removed {} lines", report.lines_removed);
//! ```

pub mod error;
pub mod filter;
pub mod lines;

pub use error::{Result, ScrubError};
pub use filter::{
    scrub, scrub_file, scrub_streaming, Blob, BlobMetadata, DigestAlgorithm, DigestWriter,
    ScrubOutcome, ScrubReport, Scrubber, TrailingNewline, MARKER, TARGET_PATH,
};
