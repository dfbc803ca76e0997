//! Maven-2 repository layout: path to coordinates.
//!
//! Converts a stored item path such as
//! `com/example/app/1.0-SNAPSHOT/app-1.0-20240101.120000-3-sources.jar`
//! into its group/artifact/version coordinates, and recognises checksum and
//! signature side files.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";
const CHECKSUM_EXTENSIONS: [&str; 4] = ["md5", "sha1", "sha256", "sha512"];
const SIGNATURE_EXTENSION: &str = "asc";

/// Type recorded in `signatureType` for `.asc` files.
const SIGNATURE_TYPE: &str = "gpg";

/// Maven coordinates of a stored file.
///
/// Serialized as the `artifact` object of an outgoing notification. The
/// `hash` and `signature` flags are always present so subscribers see the
/// same shape for every artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gav {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub base_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    pub extension: String,
    pub name: String,
    pub snapshot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_build_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_time_stamp: Option<i64>,
    /// A checksum of the artifact.
    pub hash: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<String>,
    /// A detached signature of the artifact (or a checksum of one).
    pub signature: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<String>,
}

impl Gav {
    /// True for checksum and signature files.
    pub fn is_side_artifact(&self) -> bool {
        self.hash || self.signature
    }
}

/// Checksum and signature suffixes found at the end of a file name.
#[derive(Debug, Default, PartialEq, Eq)]
struct SideSuffixes {
    hash_type: Option<String>,
    signature_type: Option<String>,
}

impl std::fmt::Display for Gav {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.extension)
    }
}

fn timestamped_version() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{8}\.\d{6})-(\d+)").expect("timestamped version pattern is valid")
    })
}

/// Parses a Maven-2 layout path.
///
/// # Returns
/// * `Some(Gav)` for artifact files, including checksum and signature files
/// * `None` for directories, metadata files and paths outside the layout
pub fn path_to_gav(path: &str) -> Option<Gav> {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        return None;
    }

    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 4 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let file_name = segments[segments.len() - 1];
    let base_version = segments[segments.len() - 2];
    let artifact_id = segments[segments.len() - 3];
    let group_id = segments[..segments.len() - 3].join(".");

    if file_name.starts_with("maven-metadata") {
        return None;
    }

    let (stripped, side) = strip_side_suffixes(file_name);
    let remainder = stripped.strip_prefix(artifact_id)?.strip_prefix('-')?;

    let snapshot = base_version.ends_with(SNAPSHOT_SUFFIX);
    let (version, rest, snapshot_build_number, snapshot_time_stamp) = if !snapshot {
        let rest = remainder.strip_prefix(base_version)?;
        (base_version.to_string(), rest, None, None)
    } else if let Some(rest) = remainder.strip_prefix(base_version) {
        (base_version.to_string(), rest, None, None)
    } else {
        let prefix = &base_version[..base_version.len() - "SNAPSHOT".len()];
        let candidate = remainder.strip_prefix(prefix)?;
        let captures = timestamped_version().captures(candidate)?;
        let whole = captures.get(0)?.as_str();
        let time_stamp = NaiveDateTime::parse_from_str(&captures[1], "%Y%m%d.%H%M%S")
            .ok()?
            .and_utc()
            .timestamp_millis();
        let build_number = captures[2].parse().ok()?;
        (
            format!("{}{}", prefix, whole),
            &candidate[whole.len()..],
            Some(build_number),
            Some(time_stamp),
        )
    };

    let (classifier, extension) = split_classifier_and_extension(rest)?;

    Some(Gav {
        group_id,
        artifact_id: artifact_id.to_string(),
        version,
        base_version: base_version.to_string(),
        classifier,
        extension,
        name: file_name.to_string(),
        snapshot,
        snapshot_build_number,
        snapshot_time_stamp,
        hash: side.hash_type.is_some(),
        hash_type: side.hash_type,
        signature: side.signature_type.is_some(),
        signature_type: side.signature_type,
    })
}

/// Removes a trailing checksum suffix and then a signature suffix.
fn strip_side_suffixes(file_name: &str) -> (&str, SideSuffixes) {
    let mut name = file_name;
    let mut side = SideSuffixes::default();

    if let Some((stem, ext)) = name.rsplit_once('.') {
        if CHECKSUM_EXTENSIONS.contains(&ext) {
            side.hash_type = Some(ext.to_string());
            name = stem;
        }
    }
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if ext == SIGNATURE_EXTENSION {
            side.signature_type = Some(SIGNATURE_TYPE.to_string());
            name = stem;
        }
    }

    (name, side)
}

/// Splits what follows the version: `-classifier.ext` or `.ext`.
fn split_classifier_and_extension(rest: &str) -> Option<(Option<String>, String)> {
    if let Some(extension) = rest.strip_prefix('.') {
        if extension.is_empty() {
            return None;
        }
        return Some((None, extension.to_string()));
    }

    let rest = rest.strip_prefix('-')?;
    let (classifier, extension) = rest.split_once('.')?;
    if classifier.is_empty() || extension.is_empty() {
        return None;
    }
    Some((Some(classifier.to_string()), extension.to_string()))
}
