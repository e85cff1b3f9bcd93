//! node-provision entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse flags
//!   3. Load tool settings
//!   4. Init logger once (flag > RUST_LOG > settings)
//!   5. Load the config template
//!   6. Run the provisioning pipeline
//!   7. Print the summary and exit

use clap::Parser;
use tracing::info;

use node_provision::centrifuge::CentrifugeCli;
use node_provision::cli::Cli;
use node_provision::contracts::DeploymentsFile;
use node_provision::error::AppError;
use node_provision::pipeline::Pipeline;
use node_provision::template::Template;
use node_provision::{config, logger};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let settings = config::load(cli.settings.as_deref())?;

    let effective_log_level = cli.log_level.as_deref().unwrap_or(settings.log_level.as_str());
    logger::init(effective_log_level, cli.log_level.is_some())?;

    info!(
        datadir = %cli.datadir.display(),
        template = %cli.template.display(),
        dev = cli.dev,
        centrifuge = %settings.centrifuge.binary.display(),
        "starting node provisioning"
    );

    let template = Template::load(&cli.template)?;
    let options = cli.resolve_options(&settings);

    let centrifuge = CentrifugeCli::new(&settings.centrifuge.binary, &settings.centrifuge.work_dir);
    let deployments = DeploymentsFile::new(&settings.deployments_file);
    if cli.dev {
        info!(deployments = %deployments.path().display(), "development mode: reading local contract deployment");
    }

    let report = Pipeline::new(&centrifuge, &centrifuge, &deployments).run(&template, &options)?;

    println!("✓ Node provisioned: identity_id={}", report.identity_id);
    println!("  datadir: {}", report.data_dir.display());
    println!("  config:  {}", report.config_path.display());
    for key in &report.keys {
        println!("  {:<8} {:<10} {}", key.key_type.to_string(), key.algorithm(), key.public_key.display());
    }
    println!("Run the node with: centrifuge run -c {}", report.config_path.display());

    Ok(())
}
