//! superv-settings - operator CLI for job orders, job images and run requests.
//!
//! Reads `SUPERV_DATABASE_URL` (and the batch size settings) from the
//! environment or a `.env` file, and prints every result as JSON.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use superv::lifecycle::{DEFAULT_DB_IMAGE, DEFAULT_OS_IMAGE, DEFAULT_RUN_LIMIT};
use superv::types::{CatalogKind, DbType, NextJob, RunId, RunStatus, WorkflowType};
use superv::{
    Config, JobDefinitions, JobOrderGraph, JobStep, RequestBatcher, RunLifecycle, Submission,
    WorkflowRegistry, parse_test_request,
};
use superv_backend_postgres::PostgresBackend;
use superv_job_order_backend::JobOrderBackend;
use superv_observability_setup::ObservabilityOptions;
use superv_run_request_backend::RunRequestBackend;
use tracing::debug;

#[derive(Parser)]
#[command(name = "superv-settings")]
#[command(about = "Inspect and edit supervisor job orders, job images and run requests")]
struct Cli {
    /// Write a chrome trace to this path (needs the `trace` feature)
    #[arg(long, global = true)]
    trace_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a workflow's job order
    JobOrder { workflow: String },
    /// Point one job at a new next job (job name, id, or COMPLETE)
    SetNextJob {
        workflow: String,
        job_name: String,
        next: String,
    },
    /// Restore a workflow's default job order
    ResetJobOrder { workflow: String },
    /// Show every job definition
    JobDefs,
    /// Show the image each job runs
    ComponentVersions,
    /// Change the image one job runs
    UpdateImage {
        workflow: String,
        job_name: String,
        image: String,
    },
    /// List the test catalog
    TestNames,
    /// List the test environment types
    EnvironmentTypes,
    /// List the database images
    DbmsImages,
    /// List the operating system images
    OsImages,
    /// Queue run requests for a set of tests
    Submit(SubmitArgs),
    /// Set a run's supervisor status
    SetRunStatus { run_id: i64, status: RunStatus },
    /// Show a run's properties
    RunProps { run_id: i64 },
    /// List request groups, newest first
    RequestGroups,
    /// Show the queued requests of one request group
    RequestStatus { request_group: String },
    /// List recent runs
    Runs {
        #[arg(long, default_value_t = DEFAULT_RUN_LIMIT)]
        limit: i64,
    },
}

#[derive(clap::Args)]
struct SubmitArgs {
    #[arg(long)]
    request_group: String,

    #[arg(long, default_value = "CORE")]
    workflow: String,

    #[arg(long, default_value = "CONSUMER")]
    location: String,

    /// Test label; repeat for several
    #[arg(long = "test")]
    tests: Vec<String>,

    /// Request body such as `{"CONSUMER": ["test_ils"]}`; replaces --location and --test
    #[arg(long, conflicts_with = "tests")]
    request_json: Option<String>,

    #[arg(long, default_value = "new")]
    status: RunStatus,

    #[arg(long, default_value = "postgres")]
    db_type: DbType,

    #[arg(long, default_value = "")]
    package_dir: String,

    #[arg(long, default_value = DEFAULT_OS_IMAGE)]
    os_image: String,

    #[arg(long, default_value = DEFAULT_DB_IMAGE)]
    db_image: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    superv_observability_setup::init(ObservabilityOptions {
        log_filter: config.log_filter.clone(),
        trace_path: cli.trace_path.clone(),
    });

    let result = run(cli.command, config).await;
    superv_observability_setup::flush();
    result
}

async fn run(command: Command, config: Config) -> Result<()> {
    let registry = Arc::new(WorkflowRegistry::builtin().context("validate default job orders")?);
    let backend = PostgresBackend::connect(config.database_url()?)
        .await
        .context("connect to postgres")?;
    debug!(?config, "loaded configuration");

    let graph = JobOrderGraph::new(backend.clone(), registry);
    let definitions = JobDefinitions::new(backend.clone(), config.image_freeze);
    let lifecycle = RunLifecycle::new(backend, RequestBatcher::new(config.batch_sizes));

    match command {
        Command::JobOrder { workflow } => {
            let workflow_type = WorkflowRegistry::parse_workflow_type(&workflow)?;
            print_json(&graph.get_order(workflow_type).await?)
        }
        Command::SetNextJob {
            workflow,
            job_name,
            next,
        } => {
            let workflow_type = WorkflowRegistry::parse_workflow_type(&workflow)?;
            let next_job =
                NextJob::parse(&next).ok_or_else(|| anyhow!("unknown next job {next:?}"))?;
            graph.update_link(workflow_type, &job_name, next_job).await?;
            let message = format!("The {workflow_type} {job_name} next job has been set to {next}");
            print_json(&job_order_report(&graph, workflow_type, message).await?)
        }
        Command::ResetJobOrder { workflow } => {
            let workflow_type = WorkflowRegistry::parse_workflow_type(&workflow)?;
            graph.reset_to_default(workflow_type).await?;
            let message = format!(
                "The job order for the {workflow_type} workflow has been reset to the defaults"
            );
            print_json(&job_order_report(&graph, workflow_type, message).await?)
        }
        Command::JobDefs => print_json(&definitions.all().await?),
        Command::ComponentVersions => print_json(&definitions.component_versions().await?),
        Command::UpdateImage {
            workflow,
            job_name,
            image,
        } => {
            let workflow_type = WorkflowRegistry::parse_workflow_type(&workflow)?;
            definitions
                .update_image(workflow_type, &job_name, &image)
                .await?;
            print_json(&json!({
                "message": format!("The {workflow_type} {job_name} image has been set to {image}")
            }))
        }
        Command::TestNames => print_json(&lifecycle.backend().list_test_cases().await?),
        Command::EnvironmentTypes => {
            print_json(&lifecycle.catalog(CatalogKind::EnvironmentType).await?)
        }
        Command::DbmsImages => print_json(&lifecycle.catalog(CatalogKind::DbmsImage).await?),
        Command::OsImages => print_json(&lifecycle.catalog(CatalogKind::OsImage).await?),
        Command::Submit(args) => {
            let submission = submission_from_args(args)?;
            print_json(&lifecycle.submit(&submission).await?)
        }
        Command::SetRunStatus { run_id, status } => {
            lifecycle.set_status(RunId(run_id), status).await?;
            print_json(&json!({
                "message": format!("Run {run_id} status set to {status}")
            }))
        }
        Command::RunProps { run_id } => print_json(&lifecycle.get_run_props(RunId(run_id)).await?),
        Command::RequestGroups => print_json(&lifecycle.request_groups().await?),
        Command::RequestStatus { request_group } => {
            print_json(&lifecycle.request_group_status(&request_group).await?)
        }
        Command::Runs { limit } => print_json(&lifecycle.recent_runs(limit).await?),
    }
}

/// A confirmation message with the job order it left behind.
#[derive(Debug, Serialize)]
struct JobOrderReport {
    message: String,
    job_order: Vec<JobStep>,
}

async fn job_order_report<B: JobOrderBackend>(
    graph: &JobOrderGraph<B>,
    workflow_type: WorkflowType,
    message: String,
) -> Result<JobOrderReport> {
    Ok(JobOrderReport {
        message,
        job_order: graph.get_order(workflow_type).await?,
    })
}

fn submission_from_args(args: SubmitArgs) -> Result<Submission> {
    let workflow_type = WorkflowRegistry::parse_workflow_type(&args.workflow)?;
    let (location, tests) = match &args.request_json {
        Some(body) => {
            let request = parse_test_request(body)?;
            (request.run_location, request.tests)
        }
        None => (args.location, args.tests),
    };

    let mut submission = Submission::new(workflow_type, location, tests, args.request_group);
    submission.run_status = args.status;
    submission.db_type = args.db_type;
    submission.package_dir = args.package_dir;
    submission.os_image = args.os_image;
    submission.db_image = args.db_image;
    Ok(submission)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
