//! Workflow, job and chain-link types.

use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::UnknownName;

/// Wire name of the terminal chain sentinel.
pub const COMPLETE: &str = "COMPLETE";

/// Family of multi-step processing run by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowType {
    Core,
    Federation,
    Plugin,
    Topology,
    Unit,
    Asgs,
    Ecflow,
    Hecras,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 8] = [
        Self::Core,
        Self::Federation,
        Self::Plugin,
        Self::Topology,
        Self::Unit,
        Self::Asgs,
        Self::Ecflow,
        Self::Hecras,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "CORE",
            Self::Federation => "FEDERATION",
            Self::Plugin => "PLUGIN",
            Self::Topology => "TOPOLOGY",
            Self::Unit => "UNIT",
            Self::Asgs => "ASGS",
            Self::Ecflow => "ECFLOW",
            Self::Hecras => "HECRAS",
        }
    }

    /// Parse a workflow type name, ignoring ASCII case.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|workflow| workflow.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownName::new("workflow type", s))
    }
}

/// Stable numeric identity of a job step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of job the supervisor knows how to launch.
///
/// Each kind carries a fixed id; the same kind has the same id in every
/// workflow that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobType {
    Staging,
    Database,
    Provider,
    Consumer,
    Forensics,
    ObsMod,
    Geotiff2Cog,
    LoadGeoServer,
    FinalStaging,
}

impl JobType {
    pub const ALL: [JobType; 9] = [
        Self::Staging,
        Self::Database,
        Self::Provider,
        Self::Consumer,
        Self::Forensics,
        Self::ObsMod,
        Self::Geotiff2Cog,
        Self::LoadGeoServer,
        Self::FinalStaging,
    ];

    pub fn id(self) -> JobId {
        JobId(match self {
            Self::Staging => 1,
            Self::Database => 2,
            Self::Provider => 3,
            Self::Consumer => 4,
            Self::Forensics => 5,
            Self::ObsMod => 6,
            Self::Geotiff2Cog => 7,
            Self::LoadGeoServer => 8,
            Self::FinalStaging => 9,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Database => "database",
            Self::Provider => "provider",
            Self::Consumer => "consumer",
            Self::Forensics => "forensics",
            Self::ObsMod => "obs-mod",
            Self::Geotiff2Cog => "geotiff2cog",
            Self::LoadGeoServer => "load-geo-server",
            Self::FinalStaging => "final-staging",
        }
    }

    pub fn from_id(id: JobId) -> Option<Self> {
        Self::ALL.into_iter().find(|job_type| job_type.id() == id)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|job_type| job_type.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownName::new("job type", s))
    }
}

/// Where a chain link points: another job step, or the terminal sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextJob {
    Job(JobId),
    Complete,
}

impl NextJob {
    /// Decode the nullable column used by the relational store.
    pub fn from_db(next_job_id: Option<i32>) -> Self {
        match next_job_id {
            Some(id) => Self::Job(JobId(id)),
            None => Self::Complete,
        }
    }

    pub fn to_db(self) -> Option<i32> {
        match self {
            Self::Job(id) => Some(id.0),
            Self::Complete => None,
        }
    }

    pub fn job_id(self) -> Option<JobId> {
        match self {
            Self::Job(id) => Some(id),
            Self::Complete => None,
        }
    }

    /// Accepts `COMPLETE` (any case), a numeric id, or a job type name.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case(COMPLETE) {
            return Some(Self::Complete);
        }
        if let Ok(id) = s.parse::<i32>() {
            return Some(Self::Job(JobId(id)));
        }
        JobType::parse(s).map(|job_type| Self::Job(job_type.id()))
    }
}

impl From<JobType> for NextJob {
    fn from(value: JobType) -> Self {
        Self::Job(value.id())
    }
}

impl std::fmt::Display for NextJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Job(id) => write!(f, "{id}"),
            Self::Complete => write!(f, "{COMPLETE}"),
        }
    }
}

impl FromStr for NextJob {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownName::new("next job", s))
    }
}

impl Serialize for NextJob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Job(id) => serializer.serialize_i32(id.0),
            Self::Complete => serializer.serialize_str(COMPLETE),
        }
    }
}

/// One stored link of a workflow's job chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobLinkRow {
    pub job_id: JobId,
    pub job_name: String,
    #[serde(rename = "next_job_id")]
    pub next: NextJob,
}

/// Static launch metadata for one job step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobDefinition {
    pub image: String,
    pub command_line: Vec<String>,
    pub command_matrix: Vec<Vec<String>>,
    pub parallel: Option<serde_json::Value>,
}

/// A job definition together with the workflow and job it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinitionRow {
    pub workflow_type: WorkflowType,
    pub job_name: String,
    pub definition: JobDefinition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_type_parse_is_case_insensitive() {
        assert_eq!(WorkflowType::parse("asgs"), Some(WorkflowType::Asgs));
        assert_eq!(WorkflowType::parse("CORE"), Some(WorkflowType::Core));
        assert_eq!(WorkflowType::parse("nope"), None);
        assert!("nope".parse::<WorkflowType>().is_err());
    }

    #[test]
    fn job_type_table_round_trips_ids_and_names() {
        for job_type in JobType::ALL {
            assert_eq!(JobType::from_id(job_type.id()), Some(job_type));
            assert_eq!(JobType::parse(job_type.as_str()), Some(job_type));
        }
        assert_eq!(JobType::Staging.id(), JobId(1));
        assert_eq!(JobType::from_id(JobId(42)), None);
    }

    #[test]
    fn next_job_parses_sentinel_ids_and_names() {
        assert_eq!(NextJob::parse("complete"), Some(NextJob::Complete));
        assert_eq!(NextJob::parse("3"), Some(NextJob::Job(JobId(3))));
        assert_eq!(
            NextJob::parse("final-staging"),
            Some(NextJob::Job(JobType::FinalStaging.id()))
        );
        assert_eq!(NextJob::parse("bogus"), None);
    }

    #[test]
    fn next_job_maps_complete_to_null_column() {
        assert_eq!(NextJob::Complete.to_db(), None);
        assert_eq!(NextJob::from_db(None), NextJob::Complete);
        assert_eq!(NextJob::from_db(Some(4)), NextJob::Job(JobId(4)));
    }

    #[test]
    fn job_link_row_serializes_sentinel_as_string() {
        let row = JobLinkRow {
            job_id: JobId(9),
            job_name: "final-staging".to_string(),
            next: NextJob::Complete,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"job_id": 9, "job_name": "final-staging", "next_job_id": "COMPLETE"})
        );
    }
}
