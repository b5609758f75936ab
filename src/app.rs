use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config;
use crate::controller::{self, Controller, Form, LoadOutcome};
use crate::data::{ListingService, RedditListingService};
use crate::gallery::Entry;
use crate::logging;
use crate::reddit::{self, Category};
use crate::ui;

/// Command line overrides for the configured start form.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub subreddit: Option<String>,
    pub category: Option<Category>,
}

pub fn run(run_opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let log_path = logging::init(None).context("init logging")?;

    let controller = build_controller(&cfg, run_opts)?;
    let status = format!(
        "Config: {}  Log: {}",
        friendly_path(config::default_path().as_ref()),
        friendly_path(Some(&log_path)),
    );
    let mut model = ui::Model::new(ui::Options {
        controller,
        status_message: status,
    });
    model.run()?;
    tracing::info!("loon exited");
    Ok(())
}

/// Runs a single load cycle and prints the entries in visual order.
pub fn print(run_opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    logging::init_stderr().context("init logging")?;
    let mut controller = build_controller(&cfg, run_opts)?;

    let outcome = controller.load();
    if let Some(notice) = controller.notice() {
        eprintln!("{}: {}", notice.title, notice.body);
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let now = Utc::now();
    for entry in controller.presenter().visual_order() {
        writeln!(out, "{}", entry_line(entry, now))?;
    }
    match outcome {
        Some(LoadOutcome::Errored) | None => anyhow::bail!("no posts could be loaded"),
        _ => Ok(()),
    }
}

fn build_controller(cfg: &config::Config, run_opts: RunOptions) -> Result<Controller> {
    let client = reddit::Client::new(reddit::ClientConfig {
        user_agent: cfg.reddit.user_agent.clone(),
        base_url: Some(cfg.reddit.base_url.clone()),
        timeout: cfg.reddit.timeout,
        http_client: None,
    })
    .context("create reddit client")?;
    let service: Arc<dyn ListingService> = Arc::new(RedditListingService::new(Arc::new(client)));

    let form = Form {
        subreddit: run_opts
            .subreddit
            .unwrap_or_else(|| cfg.ui.subreddit.clone()),
        category: run_opts.category.unwrap_or(cfg.ui.category),
        limit: cfg.ui.limit(),
    };
    Ok(Controller::new(
        service,
        controller::Options {
            form,
            sort: cfg.ui.sort_key(),
            region: cfg.reddit.region.clone(),
            base_url: cfg.reddit.base_url.clone(),
        },
    ))
}

fn entry_line(entry: &Entry, now: chrono::DateTime<Utc>) -> String {
    let target = entry.thread_url.as_deref().unwrap_or(&entry.link);
    format!(
        "{:>3}  {:>6}  {:>4}  {}  {}",
        entry.order + 1,
        entry.score,
        ui::format_age(entry.created_utc, now),
        entry.title,
        target
    )
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/loon/config.yaml".to_string()
    }
}
