//! Headless pageplus driver.
//!
//! Starts the controller on a URL and reads commands from stdin:
//!
//! ```text
//! <url>                  navigate to a new URL
//! set <guid>.<key> <json> change an option
//! options                print the current options
//! quit                   stop
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use pageplus::{run_extension, Config, HeadlessPage, Startup};

fn print_help() {
    println!("Usage: pageplus [--config <path>] <url>");
    println!();
    println!("Reads commands from stdin: a URL to navigate, 'set <guid>.<key> <json>',");
    println!("'options' or 'quit'.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut url: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
            }
            _ => url = Some(arg),
        }
    }

    let config = match config_path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    };
    pageplus::logging::init(&config.general.log_filter);

    let url = url.unwrap_or_else(|| format!("{}/app/student#", config.school.base_url));
    let page = Arc::new(HeadlessPage::new(url));

    let (startup, notifications) = Startup::from_config(&config, page.clone(), page.clone())?;
    let Some(mut extension) = run_extension(startup)? else {
        return Ok(());
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut parts = line.splitn(3, ' ');

        match parts.next() {
            None | Some("") => {}
            Some("quit") => break,
            Some("options") => {
                let flat = extension.options()?.flatten();
                println!("{}", serde_json::to_string_pretty(&flat)?);
            }
            Some("set") => {
                let (Some(path), Some(raw)) = (parts.next(), parts.next()) else {
                    eprintln!("Usage: set <guid>.<key> <json>");
                    continue;
                };
                let Some((guid, key)) = path.split_once('.') else {
                    eprintln!("Option path must look like <guid>.<key>");
                    continue;
                };
                let value = match serde_json::from_str(raw) {
                    Ok(value) => value,
                    Err(e) => {
                        eprintln!("'{}' is not valid JSON: {}", raw, e);
                        continue;
                    }
                };
                if let Err(e) = extension.set_option(guid, key, value) {
                    eprintln!("Error: {}", e);
                }
            }
            Some(_) => {
                let old_url = page.navigate(line);
                extension.hash_changed(old_url, line)?;
            }
        }

        extension.flush().await?;
        notifications.tick(Instant::now(), false);
        for n in notifications.active() {
            println!("[{}] {}: {}", n.id, n.from, n.text);
        }
    }

    extension.shutdown().await?;
    Ok(())
}
