//! Container extraction: a Zstandard-compressed tar stream holding exactly
//! one network log member.

use std::io::Read;

use tar::Archive;
use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};

/// Marker substring identifying the network log member inside a container.
pub const LOG_MEMBER_MARKER: &str = "application-network.json";

/// The single log member extracted from a container.
#[derive(Debug)]
pub struct LogMember {
    /// First path component of the member name; keys the output partitions.
    pub stem: String,
    text: String,
}

impl LogMember {
    /// Iterates the member's lines, terminators included. Forward-only.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split_inclusive('\n')
    }
}

/// Scans a decrypted container stream and extracts the single qualifying
/// log member: a regular file, non-empty, name containing
/// [`LOG_MEMBER_MARKER`]. Zero or several such members is a structural error.
pub fn extract_log_member<R: Read>(reader: R) -> IngestResult<LogMember> {
    let decoder = zstd::stream::read::Decoder::new(reader)?;
    let mut archive = Archive::new(decoder);

    let mut found: Option<(String, Vec<u8>)> = None;
    let mut matches = 0usize;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() || entry.size() == 0 {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        if !name.contains(LOG_MEMBER_MARKER) {
            continue;
        }
        matches += 1;
        if matches > 1 {
            // keep scanning so the error reports the true count
            continue;
        }
        debug!(member = %name, size = entry.size(), "extracting log member");
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        found = Some((name, data));
    }

    if matches != 1 {
        warn!(found = matches, "invalid container structure");
        return Err(IngestError::MemberCount { found: matches });
    }

    let (name, data) = found.expect("single match recorded");
    let stem = name
        .split('/')
        .next()
        .unwrap_or(name.as_str())
        .to_string();
    let text = String::from_utf8(data).map_err(|_| IngestError::NotUtf8 { name })?;
    Ok(LogMember { stem, text })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        let tarball = builder.into_inner().unwrap();
        zstd::encode_all(&tarball[..], 3).unwrap()
    }

    #[test]
    fn single_member_extracted() {
        let container = pack(&[
            ("host-1/logs/application-network.json.1", b"line one\nline two\n"),
            ("host-1/logs/application-http.json.1", b"noise\n"),
        ]);
        let member = extract_log_member(&container[..]).unwrap();
        assert_eq!(member.stem, "host-1");
        let lines: Vec<&str> = member.lines().collect();
        assert_eq!(lines, vec!["line one\n", "line two\n"]);
    }

    #[test]
    fn zero_members_is_structural_error() {
        let container = pack(&[("host-1/logs/application-http.json.1", b"noise\n")]);
        assert!(matches!(
            extract_log_member(&container[..]),
            Err(IngestError::MemberCount { found: 0 })
        ));
    }

    #[test]
    fn two_members_is_structural_error() {
        let container = pack(&[
            ("host-1/logs/application-network.json.1", b"a\n"),
            ("host-2/logs/application-network.json.1", b"b\n"),
        ]);
        assert!(matches!(
            extract_log_member(&container[..]),
            Err(IngestError::MemberCount { found: 2 })
        ));
    }

    #[test]
    fn empty_member_does_not_qualify() {
        let container = pack(&[
            ("host-1/logs/application-network.json.1", b""),
            ("host-1/logs/application-network.json.2", b"data\n"),
        ]);
        let member = extract_log_member(&container[..]).unwrap();
        assert_eq!(member.lines().count(), 1);
    }

    #[test]
    fn stem_without_separator_is_full_name() {
        let container = pack(&[("application-network.json.1", b"data\n")]);
        let member = extract_log_member(&container[..]).unwrap();
        assert_eq!(member.stem, "application-network.json.1");
    }

    #[test]
    fn garbage_stream_is_io_error() {
        assert!(matches!(
            extract_log_member(&b"not a container"[..]),
            Err(IngestError::Io(_))
        ));
    }

    #[test]
    fn final_line_without_terminator_is_kept() {
        let container = pack(&[("h/application-network.json", b"first\nsecond")]);
        let member = extract_log_member(&container[..]).unwrap();
        let lines: Vec<&str> = member.lines().collect();
        assert_eq!(lines, vec!["first\n", "second"]);
    }
}
