use std::borrow::Cow;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256, Sha512};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{Result, ScrubError};
use crate::lines::{ends_with_line_break, split_lines};

/// Logical path of the only file whose blobs are rewritten
pub const TARGET_PATH: &str = "docker-compose.yml";

/// Lines containing this substring anywhere are dropped
pub const MARKER: &str = "DB_CONNECTION_STRING=";

/// What happens to a trailing line break when lines are re-joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingNewline {
    /// Join with `\n` only, dropping any final line break
    #[default]
    Drop,
    /// Terminate the output with `\n` when the input ended with a line break,
    /// or when the last retained line is empty
    Preserve,
}

/// File content at one point in history, owned by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

/// Host-supplied record describing where a blob lives in the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobMetadata {
    pub path: Vec<u8>,
}

impl Blob {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Blob { data: data.into() }
    }
}

impl BlobMetadata {
    pub fn new(path: impl Into<Vec<u8>>) -> Self {
        BlobMetadata { path: path.into() }
    }
}

/// Result of scrubbing a single blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrubOutcome<'a> {
    /// Path did not match; the content is returned as given
    Untouched(&'a [u8]),
    /// Path matched and the content was re-joined
    Rewritten {
        content: Vec<u8>,
        lines_removed: usize,
    },
}

impl<'a> ScrubOutcome<'a> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ScrubOutcome::Untouched(content) => *content,
            ScrubOutcome::Rewritten { content, .. } => content.as_slice(),
        }
    }

    pub fn into_bytes(self) -> Cow<'a, [u8]> {
        match self {
            ScrubOutcome::Untouched(content) => Cow::Borrowed(content),
            ScrubOutcome::Rewritten { content, .. } => Cow::Owned(content),
        }
    }

    pub fn lines_removed(&self) -> usize {
        match self {
            ScrubOutcome::Untouched(_) => 0,
            ScrubOutcome::Rewritten { lines_removed, .. } => *lines_removed,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, ScrubOutcome::Rewritten { .. })
    }
}

/// Removes marker lines from blobs at the target path.
///
/// A `Scrubber` is immutable once built, so one instance can serve every
/// blob of a rewrite, from any number of threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrubber {
    target_path: String,
    marker: String,
    trailing_newline: TrailingNewline,
}

impl Default for Scrubber {
    fn default() -> Self {
        Scrubber {
            target_path: TARGET_PATH.to_string(),
            marker: MARKER.to_string(),
            trailing_newline: TrailingNewline::Drop,
        }
    }
}

impl Scrubber {
    /// Build a scrubber for a custom target path and marker.
    ///
    /// Both must be non-empty: an empty marker is contained in every line
    /// and would wipe the file.
    pub fn new(target_path: impl Into<String>, marker: impl Into<String>) -> Result<Self> {
        let target_path = target_path.into();
        let marker = marker.into();

        if target_path.is_empty() {
            return Err(ScrubError::InvalidConfig {
                details: "target path must not be empty".to_string(),
            });
        }
        if marker.is_empty() {
            return Err(ScrubError::InvalidConfig {
                details: "marker must not be empty".to_string(),
            });
        }

        Ok(Scrubber {
            target_path,
            marker,
            trailing_newline: TrailingNewline::Drop,
        })
    }

    pub fn with_trailing_newline(mut self, trailing_newline: TrailingNewline) -> Self {
        self.trailing_newline = trailing_newline;
        self
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn trailing_newline(&self) -> TrailingNewline {
        self.trailing_newline
    }

    /// Check whether a metadata path selects this scrubber's target.
    ///
    /// The path is decoded before comparison, so undecodable paths are an
    /// error even though they could never match.
    pub fn matches(&self, path: &[u8]) -> Result<bool> {
        let path = std::str::from_utf8(path).map_err(|source| ScrubError::InvalidPath { source })?;
        Ok(path == self.target_path)
    }

    /// Scrub one blob's content given its logical path
    ///
    /// This function:
    /// - Leaves content untouched unless the path equals the target exactly
    /// - Decodes matching content as UTF-8, failing rather than substituting
    /// - Drops every line containing the marker, keeping the rest in order
    /// - Re-joins retained lines with `\n` under the trailing newline policy
    pub fn scrub<'a>(&self, content: &'a [u8], path: &[u8]) -> Result<ScrubOutcome<'a>> {
        if !self.matches(path)? {
            trace!(path = %String::from_utf8_lossy(path), "path not targeted, skipping");
            return Ok(ScrubOutcome::Untouched(content));
        }

        let text = std::str::from_utf8(content).map_err(|source| ScrubError::InvalidContent {
            path: self.target_path.clone(),
            source,
        })?;

        let (scrubbed, lines_removed) = self.scrub_text(text);
        debug!(
            path = %self.target_path,
            lines_removed,
            bytes_in = content.len(),
            bytes_out = scrubbed.len(),
            "scrubbed blob"
        );

        Ok(ScrubOutcome::Rewritten {
            content: scrubbed.into_bytes(),
            lines_removed,
        })
    }

    /// Scrub a host blob in place, writing the result back into `blob.data`.
    ///
    /// Returns the number of lines removed. On error the blob is left as it
    /// was.
    pub fn apply(&self, blob: &mut Blob, metadata: &BlobMetadata) -> Result<usize> {
        let (content, lines_removed) = match self.scrub(&blob.data, &metadata.path)? {
            ScrubOutcome::Untouched(_) => return Ok(0),
            ScrubOutcome::Rewritten {
                content,
                lines_removed,
            } => (content, lines_removed),
        };
        blob.data = content;
        Ok(lines_removed)
    }

    fn scrub_text(&self, text: &str) -> (String, usize) {
        let mut output = String::with_capacity(text.len());
        let mut lines_removed = 0;
        let mut last_kept_empty = false;
        let mut kept_any = false;

        for line in split_lines(text) {
            if line.contains(self.marker.as_str()) {
                lines_removed += 1;
                continue;
            }
            if kept_any {
                output.push('\n');
            }
            output.push_str(line);
            kept_any = true;
            last_kept_empty = line.is_empty();
        }

        if self.trailing_newline == TrailingNewline::Preserve
            && kept_any
            && (ends_with_line_break(text) || last_kept_empty)
        {
            output.push('\n');
        }

        (output, lines_removed)
    }
}

/// Scrub content with the default target path and marker
pub fn scrub(content: &[u8], path: &[u8]) -> Result<Vec<u8>> {
    Ok(Scrubber::default().scrub(content, path)?.into_bytes().into_owned())
}

/// Supported digest algorithms for checksum computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-256 checksum
    Sha256,
    /// SHA-512 checksum
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Hex checksum of a complete buffer
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ScrubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(ScrubError::InvalidConfig {
                details: format!("unknown digest algorithm '{s}' (supported: sha256, sha512)"),
            }),
        }
    }
}

enum DigestState {
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Writer wrapper that computes a digest of everything written through it
pub struct DigestWriter<'a, W: Write> {
    inner: &'a mut W,
    state: DigestState,
}

impl<'a, W: Write> DigestWriter<'a, W> {
    pub fn new(inner: &'a mut W, algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm {
            DigestAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => DigestState::Sha512(Sha512::new()),
        };
        DigestWriter { inner, state }
    }

    /// Finalize the digest and return the hex-encoded checksum
    pub fn finalize(self) -> String {
        match self.state {
            DigestState::Sha256(hasher) => hex::encode(hasher.finalize()),
            DigestState::Sha512(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

impl<'a, W: Write> Write for DigestWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // Only hash what the inner writer accepted
        let n = self.inner.write(buf)?;
        match &mut self.state {
            DigestState::Sha256(hasher) => hasher.update(&buf[..n]),
            DigestState::Sha512(hasher) => hasher.update(&buf[..n]),
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Summary of one scrubbed blob as seen by a streaming or file host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScrubReport {
    /// True when the path matched and the content went through the scrubber
    pub rewritten: bool,
    /// True when the bytes produced differ from the bytes read
    pub changed: bool,
    pub lines_removed: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
    /// Hex checksum of the bytes written, when a digest was requested
    pub digest: Option<String>,
}

/// Read one blob from `input`, scrub it and write the result to `output`
///
/// Blobs at other paths are copied byte-for-byte. The whole blob is buffered
/// since line boundaries such as `\r\n` may straddle reads.
///
/// Returns the report, with `digest` set when an algorithm was given.
pub fn scrub_streaming<R: Read, W: Write>(
    mut input: R,
    output: &mut W,
    path: &[u8],
    scrubber: &Scrubber,
    digest_algorithm: Option<DigestAlgorithm>,
) -> Result<ScrubReport> {
    let mut content = Vec::new();
    input.read_to_end(&mut content)?;

    let outcome = scrubber.scrub(&content, path)?;
    let mut report = ScrubReport {
        rewritten: outcome.is_rewritten(),
        changed: outcome.as_bytes() != content.as_slice(),
        lines_removed: outcome.lines_removed(),
        bytes_in: content.len(),
        bytes_out: outcome.as_bytes().len(),
        digest: None,
    };

    match digest_algorithm {
        Some(algorithm) => {
            let mut digest_writer = DigestWriter::new(output, algorithm);
            digest_writer.write_all(outcome.as_bytes())?;
            digest_writer.flush()?;
            report.digest = Some(digest_writer.finalize());
        }
        None => {
            output.write_all(outcome.as_bytes())?;
            output.flush()?;
        }
    }

    Ok(report)
}

/// Scrub a file on disk in place, treating it as the blob at `logical_path`.
///
/// The file is only rewritten when its bytes change. The new content goes to
/// a uniquely named temporary file in the same directory, which takes over
/// the original's permissions and is then renamed over it. The digest, if
/// requested, covers the file's final content.
pub fn scrub_file(
    file: &Path,
    logical_path: &[u8],
    scrubber: &Scrubber,
    digest_algorithm: Option<DigestAlgorithm>,
) -> Result<ScrubReport> {
    let content = fs::read(file).map_err(|e| ScrubError::io(file, e))?;
    let outcome = scrubber.scrub(&content, logical_path)?;
    let scrubbed = outcome.as_bytes();
    let changed = scrubbed != content.as_slice();

    if changed {
        replace_file(file, scrubbed)?;
        debug!(file = %file.display(), "rewrote file");
    }

    Ok(ScrubReport {
        rewritten: outcome.is_rewritten(),
        changed,
        lines_removed: outcome.lines_removed(),
        bytes_in: content.len(),
        bytes_out: scrubbed.len(),
        digest: digest_algorithm.map(|algorithm| algorithm.hex_digest(scrubbed)),
    })
}

/// Atomically replace `file` with `data`, keeping its permissions
fn replace_file(file: &Path, data: &[u8]) -> Result<()> {
    let permissions = fs::metadata(file)
        .map_err(|e| ScrubError::io(file, e))?
        .permissions();
    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropping the temp file on any error below removes it
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| ScrubError::io(dir, e))?;
    temp.write_all(data)
        .map_err(|e| ScrubError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| ScrubError::io(temp.path(), e))?;
    fs::set_permissions(temp.path(), permissions).map_err(|e| ScrubError::io(temp.path(), e))?;

    temp.persist(file).map_err(|e| ScrubError::io(file, e.error))?;
    Ok(())
}
