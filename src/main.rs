mod cli;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vaportal::{api, config, events, shell};

#[derive(Parser)]
#[command(
    name = "vaportal",
    about = "Terminal client for the Turma Labs VA management portal"
)]
pub struct Args {
    #[arg(long, env = "VAPORTAL_BASE_URL", help = "Backend base URL (overrides config)")]
    pub base_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Directory for the JSONL event log")]
    pub events_dir: Option<PathBuf>,

    #[arg(long, help = "Do not write an event log")]
    pub no_events: bool,

    #[arg(long, value_name = "MS", help = "Request timeout in milliseconds")]
    pub timeout_ms: Option<u64>,

    #[arg(short, long, help = "Prefill the username on the sign-in form")]
    pub username: Option<String>,

    #[arg(long, help = "Print the effective configuration and exit")]
    pub show_config: bool,

    #[arg(long, help = "Verbose output (print routing decisions)")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (print settings and request timing)")]
    pub debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    // CLI flags win over every config layer
    if let Some(base_url) = &args.base_url {
        cfg.server.base_url = Some(base_url.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        cfg.server.timeout_ms = Some(timeout_ms);
    }
    if let Some(dir) = &args.events_dir {
        cfg.events.dir = Some(dir.clone());
    }
    if args.no_events {
        cfg.events.enabled = Some(false);
    }

    if let Err(errors) = cfg.validate() {
        for error in &errors {
            eprintln!("Config error {}", error);
        }
        return Err(anyhow::anyhow!(
            "Invalid configuration ({} error(s))",
            errors.len()
        ));
    }

    if args.show_config {
        println!("base_url      = {}", cfg.base_url());
        println!("timeout_ms    = {}", cfg.timeout().as_millis());
        println!("landing_route = {}", cfg.landing_route());
        println!("prompt        = {}", cfg.prompt());
        if cfg.events_enabled() {
            println!("events        = {}", cfg.events_dir().display());
        } else {
            println!("events        = disabled");
        }
        return Ok(());
    }

    if args.debug {
        eprintln!("[DEBUG] Base URL: {}", cfg.base_url());
        eprintln!("[DEBUG] Timeout: {:?}", cfg.timeout());
        eprintln!("[DEBUG] Landing route: {}", cfg.landing_route());
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let event_log = if cfg.events_enabled() {
        events::EventLog::open(&cfg.events_dir(), &run_id)?
    } else {
        events::EventLog::disabled()
    };
    if args.debug {
        if let Some(path) = &event_log.path {
            eprintln!("[DEBUG] Event log: {}", path.display());
        }
    }

    let client = Arc::new(api::HttpClient::new(cfg.base_url(), cfg.timeout()));
    let mut portal = shell::Shell::new(client, cfg.landing_route(), event_log);
    if let Some(username) = &args.username {
        if let Some(form) = portal.login_form_mut() {
            form.username = username.clone();
        }
    }

    cli::run_repl(cli::Context {
        args,
        config: cfg,
        shell: portal,
    })
}
