use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use wmserver::actor::controller::Collaborators;
use wmserver::actor::service::WindowManagerService;
use wmserver::common::config::{Config, config_file};
use wmserver::common::log;
use wmserver::ipc;
use wmserver::sys::render::InMemoryRenderService;

/// Boots the window manager service on a headless display, replays a
/// request script and prints a dump of the resulting window tree.
#[derive(Parser)]
#[command(name = "wmserver")]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// RON file holding a list of requests to replay, in order.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Dump arguments (`-a`, `-t`, `-w <id>`) to run once the script is done.
    #[arg(long, value_name = "ARGS", num_args = 1.., allow_hyphen_values = true)]
    dump: Option<Vec<String>>,

    /// Check the configuration file and exit.
    #[arg(long)]
    validate: bool,
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        match Config::read(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {e:#}", config_path.display());
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let issues = config.validate();
    if !issues.is_empty() {
        for issue in issues {
            eprintln!("{}", issue);
        }
        process::exit(1);
    }
    if opt.validate {
        println!("Config validation passed");
        return;
    }

    if let Err(e) = run(&opt, &config) {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn run(opt: &Cli, config: &Config) -> anyhow::Result<()> {
    ctrlc::set_handler(|| process::exit(130)).context("installing the interrupt handler")?;

    let render = InMemoryRenderService::new();
    let collaborators = Collaborators {
        render: render.clone(),
        ..Collaborators::headless()
    };
    let mut service = WindowManagerService::start(config, collaborators)?;

    if let Some(script) = &opt.script {
        for request in ipc::load_script(script)? {
            let response = ipc::handle(&service, &*render, request);
            println!("{}", serde_json::to_string(&response)?);
        }
    }
    if let Some(args) = &opt.dump {
        let text = service.dump(args.clone()).context("dumping the window tree")?;
        print!("{text}");
    }

    service.shutdown();
    Ok(())
}
