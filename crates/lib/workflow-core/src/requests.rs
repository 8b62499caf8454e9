//! Test catalog, run request and run types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{UnknownName, WorkflowType};

/// Status a run request is queued with, and that a run can be reset to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    New,
    Debug,
    DoNotRerun,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Debug => "debug",
            Self::DoNotRerun => "do-not-rerun",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "debug" => Some(Self::Debug),
            "do-not-rerun" | "do not rerun" | "do not run" => Some(Self::DoNotRerun),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownName::new("run status", s))
    }
}

/// Side of a deployment the requested tests execute on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunLocation {
    Consumer,
    Provider,
}

impl RunLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "CONSUMER",
            Self::Provider => "PROVIDER",
        }
    }

    /// Only the exact upper-case wire names are recognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONSUMER" => Some(Self::Consumer),
            "PROVIDER" => Some(Self::Provider),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How long a test case is expected to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    Short,
    Long,
}

impl DurationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }

    /// Accepts the catalog's single-letter codes as well as the full names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "short" | "S" => Some(Self::Short),
            "long" | "L" => Some(Self::Long),
            _ => None,
        }
    }
}

impl std::fmt::Display for DurationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the test catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub label: String,
    pub duration_class: DurationClass,
}

impl TestCase {
    pub fn new(label: impl Into<String>, duration_class: DurationClass) -> Self {
        Self {
            label: label.into(),
            duration_class,
        }
    }
}

/// Named lists operators pick submission settings from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogKind {
    EnvironmentType,
    DbmsImage,
    OsImage,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 3] = [Self::EnvironmentType, Self::DbmsImage, Self::OsImage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnvironmentType => "environment-type",
            Self::DbmsImage => "dbms-image",
            Self::OsImage => "os-image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Database engine the test environment is provisioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Mysql,
    #[default]
    Postgres,
}

impl DbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mysql" => Some(Self::Mysql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

impl FromStr for DbType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownName::new("database type", s))
    }
}

/// One group of test labels bound to the location they run on.
///
/// Serializes as a single-key map, e.g. `{"CONSUMER": ["t1", "t2"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestBatch {
    #[serde(rename = "CONSUMER")]
    Consumer(Vec<String>),
    #[serde(rename = "PROVIDER")]
    Provider(Vec<String>),
}

impl TestBatch {
    pub fn new(location: RunLocation, tests: Vec<String>) -> Self {
        match location {
            RunLocation::Consumer => Self::Consumer(tests),
            RunLocation::Provider => Self::Provider(tests),
        }
    }

    pub fn location(&self) -> RunLocation {
        match self {
            Self::Consumer(_) => RunLocation::Consumer,
            Self::Provider(_) => RunLocation::Provider,
        }
    }

    pub fn tests(&self) -> &[String] {
        match self {
            Self::Consumer(tests) | Self::Provider(tests) => tests,
        }
    }

    pub fn len(&self) -> usize {
        self.tests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests().is_empty()
    }
}

/// Opaque payload stored with a run request and read by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunRequestPayload {
    pub workflow_type: WorkflowType,
    pub db_image: String,
    pub db_type: DbType,
    pub os_image: String,
    pub package_dir: String,
    pub tests: TestBatch,
}

/// Insert payload for one queued run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRunRequest {
    pub status: RunStatus,
    pub request_data: RunRequestPayload,
    pub request_group: String,
}

/// A persisted run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequestRecord {
    pub id: i64,
    pub status: RunStatus,
    pub request_data: RunRequestPayload,
    pub request_group: String,
    pub created_at: DateTime<Utc>,
}

/// Identity of an executed or executing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run property holding the supervisor-visible job status.
pub const RUN_STATUS_PROPERTY: &str = "supervisor_job_status";

/// Listing row for recent runs.
///
/// `status` is free-form: the supervisor writes its own states next to the
/// ones settable through [`RunStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub request_group: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}
