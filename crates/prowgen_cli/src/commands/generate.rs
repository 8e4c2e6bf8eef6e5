//! Generate command - Expand job templates and write Prow jobs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use prowgen_templates::{JobGenerator, JobList, JobType, ProwJobWriter, TemplateLoader};

use super::{load_config, resolve};

#[derive(Args)]
pub struct GenerateArgs {
    /// Directory holding job templates as `<job type>/<repo>/<file>`
    #[arg(long, default_value = "templater/jobs")]
    jobs_dir: PathBuf,

    /// Directory Prow jobs are written to
    #[arg(long, default_value = "jobs")]
    output_dir: PathBuf,

    /// Generator configuration file (YAML)
    #[arg(short, long, env = "PROWGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Only generate this job type (repeatable); all job types by default
    #[arg(long = "job-type", value_name = "TYPE", value_parser = parse_job_type)]
    job_types: Vec<JobType>,

    /// Render every job without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn parse_job_type(value: &str) -> Result<JobType, String> {
    value.parse().map_err(|_| {
        format!(
            "unknown job type '{}', expected one of: presubmit, postsubmit, periodic",
            value
        )
    })
}

pub fn execute(args: GenerateArgs) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let jobs_dir = resolve(&current_dir, &args.jobs_dir);
    let output_dir = resolve(&current_dir, &args.output_dir);

    let config = load_config(args.config.as_deref())?;
    let registry = config.registry().context("Invalid axis configuration")?;

    let job_types = if args.job_types.is_empty() {
        JobType::all()
    } else {
        args.job_types.clone()
    };

    info!("Generating {} job type(s) from {:?}", job_types.len(), jobs_dir);

    // Generate everything before touching the output so a failure leaves it intact.
    let loader = TemplateLoader::new(&jobs_dir);
    let generator = JobGenerator::new(config.guard.clone());
    let mut generated: Vec<(JobType, BTreeMap<String, JobList>)> = Vec::new();
    for job_type in job_types.iter().copied() {
        let jobs = generator
            .generate_job_type(&config, &loader, &registry, job_type)
            .with_context(|| format!("Failed to generate {} jobs", job_type))?;
        generated.push((job_type, jobs));
    }

    let full_run = job_types.len() == JobType::all().len();
    let writer = ProwJobWriter::new(config, &output_dir);
    let mut total = 0;

    if args.dry_run {
        for (job_type, jobs_by_repo) in &generated {
            for (repo_name, jobs) in jobs_by_repo {
                for (file_name, job) in jobs {
                    writer
                        .render(*job_type, repo_name, file_name, job)
                        .with_context(|| format!("Failed to render {}", file_name))?;
                    println!("{}", writer.job_path(repo_name, file_name).display());
                    total += 1;
                }
            }
        }
        println!("\n🔍 Dry run: {} job file(s) would be written", total);
        return Ok(());
    }

    if full_run {
        writer.clean().context("Failed to clean output directory")?;
    }

    for (job_type, jobs_by_repo) in &generated {
        total += writer
            .write_job_type(*job_type, jobs_by_repo)
            .with_context(|| format!("Failed to write {} jobs", job_type))?
            .len();
    }

    println!("✅ Generated {} job file(s) under {}", total, output_dir.display());
    Ok(())
}
