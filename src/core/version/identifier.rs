use std::cmp::Ordering;

use crate::core::error::{XToolError, XToolResult};

/// Suffix marking a pre-release identifier.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Pre-release qualifier of a version, ordered from least to most mature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Qualifier {
    Milestone(u64),
    ReleaseCandidate(u64),
    Snapshot,
    Other(String),
    Final,
}

/// A parsed XWiki version such as `9.5`, `13.10.4`, `14.0-rc-1` or
/// `15.2-SNAPSHOT`.
#[derive(Debug, Clone)]
pub struct XWikiVersion {
    release: Vec<u64>,
    qualifier: Qualifier,
}

impl XWikiVersion {
    pub fn parse(raw: &str) -> XToolResult<Self> {
        let trimmed = raw.trim();
        let split_at = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (core, rest) = trimmed.split_at(split_at);

        let core = core.trim_end_matches('.');
        if core.is_empty() {
            return Err(XToolError::InvalidVersion(raw.to_string()));
        }

        let release = core
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| XToolError::InvalidVersion(raw.to_string()))?;

        Ok(Self {
            release,
            qualifier: parse_qualifier(rest),
        })
    }

    pub fn is_snapshot(&self) -> bool {
        self.qualifier == Qualifier::Snapshot
    }

    fn release_component(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }
}

fn parse_qualifier(rest: &str) -> Qualifier {
    let rest = rest.trim_start_matches(['-', '.']).to_ascii_lowercase();
    if rest.is_empty() {
        return Qualifier::Final;
    }
    if rest.ends_with("snapshot") {
        return Qualifier::Snapshot;
    }

    let number = rest
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse::<u64>()
        .unwrap_or(0);

    if rest.starts_with("rc") {
        Qualifier::ReleaseCandidate(number)
    } else if rest.starts_with("milestone") || rest.starts_with('m') {
        Qualifier::Milestone(number)
    } else {
        Qualifier::Other(rest)
    }
}

impl Ord for XWikiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.release.len().max(other.release.len());
        (0..width)
            .map(|i| self.release_component(i).cmp(&other.release_component(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for XWikiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for XWikiVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for XWikiVersion {}

/// Whether the identifier designates a frequently-overwritten pre-release build.
pub fn is_prerelease(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX)
}

/// Order two raw identifiers; unparseable ones sort after valid ones, lexically.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    match (XWikiVersion::parse(left), XWikiVersion::parse(right)) {
        (Ok(l), Ok(r)) => l.cmp(&r).then_with(|| left.cmp(right)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}
