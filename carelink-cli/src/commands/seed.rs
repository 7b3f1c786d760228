//! `carelink seed` - sample data for demos and local development

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use carelink_core::Config;
use carelink_server::db::{migrations, seed};

#[derive(Args, Debug)]
pub struct SeedArgs {
    #[command(subcommand)]
    pub target: SeedTarget,
}

#[derive(Subcommand, Debug)]
pub enum SeedTarget {
    /// Community resources (skipped when any exist)
    Resources,
    /// Display config, landmarks, FAQs and emergency contacts for a patient
    Display {
        /// Patient to seed (default: lowest patient id)
        #[arg(long)]
        patient_id: Option<i32>,
    },
}

pub async fn run_seed(args: SeedArgs, config: Config) -> Result<()> {
    let pool = super::connect(&config).await?;
    migrations::run(&pool).await.context("Migration failed")?;

    match args.target {
        SeedTarget::Resources => {
            let outcome = seed::seed_resources(&pool).await.context("Seeding resources failed")?;
            println!("Resources: {outcome}");
        }
        SeedTarget::Display { patient_id } => {
            let report = seed::seed_display(&pool, patient_id)
                .await
                .context("Seeding patient display failed")?;
            println!("Patient {} ({})", report.patient_id, report.patient_name);
            println!(
                "  config:    {}",
                if report.config_created { "created" } else { "already present" }
            );
            println!("  landmarks: {}", report.landmarks);
            println!("  faqs:      {}", report.faqs);
            println!("  contacts:  {}", report.contacts);
        }
    }
    Ok(())
}
