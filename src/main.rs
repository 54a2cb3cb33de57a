use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bandfam_messaging::app::{self, AppConfig};
use bandfam_messaging::error::SessionError;
use bandfam_messaging::ui::{login, main_window::Session};
use clap::Parser;
use log::error;
use tracing_subscriber::EnvFilter;

/// Terminal messaging client for theBandFam
#[derive(Parser, Debug)]
#[command(name = "bandfam")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Use the built-in sample conversations instead of the backend
    #[arg(long)]
    pub offline: bool,

    /// Config file (defaults to <config dir>/bandfam.toml)
    #[arg(long, env = "BANDFAM_CONFIG")]
    pub config: Option<PathBuf>,
}

fn run(args: Args) -> Result<(), SessionError> {
    let config_path = args.config.or_else(AppConfig::default_path);
    let mut config = AppConfig::load(config_path.as_deref());
    if args.offline {
        config.offline = true;
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();
    if !config.offline && !config.is_configured() {
        config = login::prompt_setup(&mut input, &mut out, config, config_path.as_deref())?;
    }

    let repository = Arc::from(app::open_repository(&config)?);
    let mut session = Session::mount(repository, config.identity())?;
    session.run(&mut input, &mut out)
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
