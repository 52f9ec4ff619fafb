// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use runtime::ApiRuntime;
use std::env;
use std::path::PathBuf;

use aktien_app::{AppState, ViewKind};
use aktien_store::Store;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `aktien --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = config.db_path()?;
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or AKTIEN_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    let client = aktien_api::Client::new(config.base_url(), config.timeout()?).with_context(
        || {
            format!(
                "invalid [server] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        },
    )?;

    if options.check_only {
        return Ok(());
    }

    let mut state = AppState::default();
    state.view = options.view.unwrap_or_else(|| config.default_view());

    let mut runtime = ApiRuntime::new(client, store);
    aktien_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    view: Option<ViewKind>,
    print_config_path: bool,
    print_db_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        view: None,
        print_config_path: false,
        print_db_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--view" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--view requires watchlist or screener"))?;
                options.view = Some(ViewKind::parse(value.as_ref()).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown view {:?}; use watchlist or screener",
                        value.as_ref()
                    )
                })?);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-db-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("aktien");
    println!("  --config <path>          Use a specific config path");
    println!("  --view <name>            Start on watchlist or screener");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-db-path          Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config, store, and client setup");
    println!("  --help                   Show this help");
}
