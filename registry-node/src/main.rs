//! Blue Carbon Registry Node
//!
//! Loads configuration, seeds an in-memory registry and drives sample
//! projects through the verification pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Run the demo pipeline with defaults
//! registry-node demo
//!
//! # Run with a config file
//! registry-node --config registry.yaml demo
//!
//! # Print the default configuration
//! registry-node default-config > registry.yaml
//! ```

mod issuer;
mod seed;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use registry_types::{ActorContext, ActorRole, AssignmentStatus, Stage};
use verification_engine::{
    EngineConfig, InMemoryExpertDirectory, QueueQuery, QueueSort, TransitionRequest,
    VerificationRegistry,
};

use issuer::LocalIssuer;

#[derive(Parser, Debug)]
#[command(name = "registry-node")]
#[command(about = "Verification workflow runner for the blue carbon registry")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed sample projects and run them through the pipeline
    Demo,
    /// Print the default configuration as YAML
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let level = &config.general.log_level;
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("registry_node={level},verification_engine={level}"))
    })?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::DefaultConfig => {
            print!("{}", EngineConfig::default().to_yaml()?);
            Ok(())
        }
        Command::Demo => run_demo(config).await,
    }
}

async fn run_demo(config: EngineConfig) -> anyhow::Result<()> {
    info!(registry_id = %config.registry_id, "Starting registry demo");

    let directory = Arc::new(InMemoryExpertDirectory::new());
    for expert in seed::experts() {
        directory.upsert(expert);
    }

    let registry = VerificationRegistry::builder()
        .issuer(Arc::new(LocalIssuer::new(config.registry_id.clone())))
        .directory(directory)
        .config(config)
        .build();

    let admin = ActorContext::new("admin-1", ActorRole::Administrator);
    let officer = ActorContext::new("panchayat-officer-1", ActorRole::PanchayatOfficer);
    let verifier = ActorContext::new("verifier-1", ActorRole::Verifier);

    for project in seed::projects() {
        registry.submit_project(project, &officer).await?;
    }

    // NCCR-2024-001: GPS mismatch in the field update sends it back
    drive_to_compliance(&registry, "NCCR-2024-001", false, &admin, &officer, &verifier).await?;
    let outcome = registry.conclude_compliance("NCCR-2024-001", &verifier).await?;
    info!(
        project_id = "NCCR-2024-001",
        passed = outcome.result.passed(),
        stage = %outcome.receipt.to,
        "Compliance concluded"
    );

    // NCCR-2024-002: clean evidence all the way to a certificate
    drive_to_compliance(&registry, "NCCR-2024-002", true, &admin, &officer, &verifier).await?;
    registry.conclude_compliance("NCCR-2024-002", &verifier).await?;
    let certified = registry.generate_credits("NCCR-2024-002", None, &admin).await?;
    info!(
        project_id = %certified.id(),
        certificate_id = ?certified.certificate_id(),
        credits = ?certified.generated_credits(),
        "Credits generated"
    );

    // NCCR-2024-003 waits in expert review
    registry
        .attempt_transition(TransitionRequest::new("NCCR-2024-003", Stage::ExpertReview, verifier.clone()))
        .await?;

    // NCCR-2024-004: manipulated upload, then a rejected skip-ahead
    registry
        .attempt_transition(
            TransitionRequest::new("NCCR-2024-004", Stage::TamperedData, verifier.clone())
                .with_reason("Photo metadata inconsistent with GPS trail"),
        )
        .await?;
    if let Err(e) = registry
        .attempt_transition(TransitionRequest::new("NCCR-2024-004", Stage::ReadyForCredits, verifier.clone()))
        .await
    {
        warn!(kind = ?e.kind(), reason = %e.reason(), "Transition refused");
    }

    let counts = registry.queue().counts_by_stage().await?;
    println!("{}", serde_json::to_string_pretty(&counts)?);

    let queue = registry
        .queue()
        .query(&QueueQuery::default().sort(QueueSort::PriorityDesc))
        .await?;
    println!("{}", serde_json::to_string_pretty(&queue)?);

    let rejections = registry.audit().rejections(10).await;
    println!("{}", serde_json::to_string_pretty(&rejections)?);

    Ok(())
}

/// Submit field evidence, run expert review and enter Compliance Check.
async fn drive_to_compliance(
    registry: &VerificationRegistry,
    project_id: &str,
    gps_verified: bool,
    admin: &ActorContext,
    officer: &ActorContext,
    verifier: &ActorContext,
) -> anyhow::Result<()> {
    let project = registry.project(project_id).await?;

    registry
        .record_evidence(project_id, seed::panchayat_update(gps_verified), officer)
        .await?;
    registry
        .record_evidence(project_id, seed::gis_survey(project.hectares_restored()), officer)
        .await?;
    registry
        .record_evidence(project_id, seed::drone_media(88), officer)
        .await?;

    registry
        .attempt_transition(TransitionRequest::new(project_id, Stage::ExpertReview, verifier.clone()))
        .await?;

    let assignments = registry.assignments();
    let assignment = assignments.assign(project_id, "exp-meera", admin).await?;
    let expert = ActorContext::new(assignment.expert_id.clone(), ActorRole::Expert);
    assignments
        .advance(&assignment.id, AssignmentStatus::InProgress, &expert)
        .await?;
    assignments
        .upload_report(
            &assignment.id,
            seed::expert_report("approve", project.estimated_credits()),
            &expert,
        )
        .await?;
    assignments
        .advance(&assignment.id, AssignmentStatus::Completed, admin)
        .await?;

    registry
        .attempt_transition(TransitionRequest::new(project_id, Stage::ComplianceCheck, verifier.clone()))
        .await?;
    Ok(())
}
