//! Release metadata index and document layout
//!
//! Every (project, workspace) keeps one small metadata document next to its
//! release documents:
//!
//! ```text
//! releases/{project}/{workspace}/.metadata.yml
//! releases/{project}/{workspace}/1.yaml
//! releases/{project}/{workspace}/2.yaml
//! ```
//!
//! The index is authoritative: a release document without an entry here is
//! invisible to readers.

use serde::{Deserialize, Serialize};
use stackyard_core::{Release, ReleasePhase};

use crate::error::{ReleaseError, Result};

/// File name of the metadata document
pub const METADATA_FILE: &str = ".metadata.yml";

/// Extension of release documents
pub const RELEASE_EXTENSION: &str = "yaml";

/// Key prefix shared by every release document of a scope
pub fn release_prefix(project: &str, workspace: &str) -> String {
    format!("releases/{}/{}", project, workspace)
}

/// Key of one release document
pub fn release_key(project: &str, workspace: &str, revision: u64) -> String {
    format!(
        "{}/{}.{}",
        release_prefix(project, workspace),
        revision,
        RELEASE_EXTENSION
    )
}

/// Key of the metadata document
pub fn metadata_key(project: &str, workspace: &str) -> String {
    format!("{}/{}", release_prefix(project, workspace), METADATA_FILE)
}

/// Index of every release recorded for a scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasesMetaData {
    /// Highest revision recorded; 0 when there is no history
    #[serde(default)]
    pub latest_revision: u64,

    #[serde(default, rename = "releaseMetaDatas")]
    pub release_meta_datas: Vec<ReleaseMetaData>,
}

/// Index entry for one release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMetaData {
    pub revision: u64,
    pub stack: String,
    /// Phase at creation time
    pub phase: ReleasePhase,
}

impl ReleasesMetaData {
    pub fn contains(&self, revision: u64) -> bool {
        self.release_meta_datas
            .iter()
            .any(|entry| entry.revision == revision)
    }

    /// All revisions, ascending and without duplicates
    pub fn revisions(&self) -> Vec<u64> {
        self.revisions_matching(|_| true)
    }

    /// Revisions created for `stack`, ascending and without duplicates
    pub fn stack_bound_revisions(&self, stack: &str) -> Vec<u64> {
        self.revisions_matching(|entry| entry.stack == stack)
    }

    fn revisions_matching(&self, filter: impl Fn(&ReleaseMetaData) -> bool) -> Vec<u64> {
        let mut revisions: Vec<u64> = self
            .release_meta_datas
            .iter()
            .filter(|entry| filter(entry))
            .map(|entry| entry.revision)
            .collect();
        revisions.sort_unstable();
        revisions.dedup();
        revisions
    }

    /// Entries in revision order
    pub fn entries(&self) -> Vec<ReleaseMetaData> {
        let mut entries = self.release_meta_datas.clone();
        entries.sort_by_key(|entry| entry.revision);
        entries.dedup_by_key(|entry| entry.revision);
        entries
    }

    /// A copy of this index with `release` appended
    pub fn with_release(&self, release: &Release) -> Self {
        let mut next = self.clone();
        next.release_meta_datas.push(ReleaseMetaData {
            revision: release.revision,
            stack: release.stack.clone(),
            phase: release.phase,
        });
        next.latest_revision = next.latest_revision.max(release.revision);
        next
    }
}

pub(crate) fn encode_metadata(metadata: &ReleasesMetaData, key: &str) -> Result<Vec<u8>> {
    encode(metadata, key)
}

/// Decode a metadata document; an absent document is an empty history
pub(crate) fn decode_metadata(data: Option<&[u8]>, key: &str) -> Result<ReleasesMetaData> {
    match data {
        Some(bytes) if !bytes.is_empty() => decode(bytes, key),
        _ => Ok(ReleasesMetaData::default()),
    }
}

pub(crate) fn encode_release(release: &Release, key: &str) -> Result<Vec<u8>> {
    encode(release, key)
}

pub(crate) fn decode_release(data: &[u8], key: &str) -> Result<Release> {
    decode(data, key)
}

fn encode<T: Serialize>(value: &T, key: &str) -> Result<Vec<u8>> {
    serde_yaml::to_string(value)
        .map(String::into_bytes)
        .map_err(|source| ReleaseError::Serialization {
            key: key.to_string(),
            source,
        })
}

fn decode<T: serde::de::DeserializeOwned>(data: &[u8], key: &str) -> Result<T> {
    serde_yaml::from_slice(data).map_err(|source| ReleaseError::Serialization {
        key: key.to_string(),
        source,
    })
}
