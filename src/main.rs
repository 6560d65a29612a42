// src/main.rs
//! Kiln - CLI Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(about = "Buildpack detection and build-plan resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run detection against an order and write the chosen group and plans
    Detect {
        /// Order file listing candidate groups
        #[arg(short, long, default_value = "order.toml")]
        order: String,

        /// Application directory
        #[arg(short, long, default_value = ".")]
        app: String,

        /// Platform inputs directory
        #[arg(short, long, default_value = "platform")]
        platform: String,

        /// Buildpack descriptor root
        #[arg(short, long, default_value = "buildpacks")]
        buildpacks: String,

        /// Stack buildpack descriptor root (defaults to --buildpacks)
        #[arg(long)]
        stack_buildpacks: Option<String>,

        /// Where to write the chosen group
        #[arg(short, long, default_value = "group.toml")]
        group: String,

        /// Where to write the build plan
        #[arg(long, default_value = "plan.toml")]
        plan: String,
    },

    /// Print the flattened groups of an order without running detect
    Expand {
        /// Order file listing candidate groups
        #[arg(short, long, default_value = "order.toml")]
        order: String,

        /// Buildpack descriptor root
        #[arg(short, long, default_value = "buildpacks")]
        buildpacks: String,

        /// Stack buildpack descriptor root (defaults to --buildpacks)
        #[arg(long)]
        stack_buildpacks: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            order,
            app,
            platform,
            buildpacks,
            stack_buildpacks,
            group,
            plan,
        } => commands::cmd_detect(
            &order,
            &app,
            &platform,
            &buildpacks,
            stack_buildpacks.as_deref(),
            &group,
            &plan,
        ),

        Commands::Expand {
            order,
            buildpacks,
            stack_buildpacks,
        } => commands::cmd_expand(&order, &buildpacks, stack_buildpacks.as_deref()),
    }
}
