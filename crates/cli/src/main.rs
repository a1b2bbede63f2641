//! veclayer CLI: inspect and maintain the collections behind a RAG backend.
//!
//! `veclayer [--config FILE] [--backend NAME] [--json] [-v] COMMAND`
//!
//! Exit codes: 0 success, 1 error, 2 backend unavailable on a read.

mod commands;
mod format;
mod parse;

use std::process;

use clap::ArgMatches;
use tracing::Level;
use veclayer::{BackendRegistry, ReadOutcome, VectorLayer};

use commands::build_cli;
use format::{format_error, format_output, CliOutput, OutputMode};
use parse::{matches_to_action, CliAction, LayerAction};

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_UNAVAILABLE: i32 = 2;

fn main() {
    let matches = build_cli().get_matches();
    init_logging(matches.get_count("verbose"));

    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(EXIT_ERROR);
        }
    };

    let action = match action {
        CliAction::Backends => {
            let names = BackendRegistry::with_defaults().names();
            println!("{}", format_output(&CliOutput::Names(names), mode));
            process::exit(EXIT_OK);
        }
        CliAction::Layer(action) => action,
    };

    let layer = match open_layer(&matches) {
        Ok(layer) => layer,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(EXIT_ERROR);
        }
    };

    let code = run(&layer, action, mode);
    if let Err(e) = layer.close() {
        tracing::warn!(error = %e, "close failed");
    }
    process::exit(code);
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => return,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_layer(matches: &ArgMatches) -> veclayer::Result<VectorLayer> {
    let mut builder = VectorLayer::builder();
    if let Some(path) = matches.get_one::<String>("config") {
        builder = builder.config_file(path);
    }
    if let Some(backend) = matches.get_one::<String>("backend") {
        builder = builder.backend(backend.clone());
    }
    if let Some(prefix) = matches.get_one::<String>("prefix") {
        builder = builder.collection_prefix(prefix.clone());
    }
    builder.build()
}

fn run(layer: &VectorLayer, action: LayerAction, mode: OutputMode) -> i32 {
    let result = match action {
        LayerAction::List => layer.list_collections().map(CliOutput::Names),
        LayerAction::Has { collection } => layer.has_collection(&collection).map(CliOutput::Bool),
        LayerAction::Get { collection } => {
            return print_read(layer.get(&collection).map(CliOutput::Items), mode)
        }
        LayerAction::Query {
            collection,
            filter,
            limit,
        } => {
            let outcome = layer.query(&collection, &filter, limit);
            return print_read(outcome.map(CliOutput::Items), mode);
        }
        LayerAction::Search {
            collection,
            vectors,
            limit,
        } => {
            let outcome = layer.search(&collection, &vectors, limit);
            return print_read(outcome.map(CliOutput::Hits), mode);
        }
        LayerAction::Delete {
            collection,
            selector,
        } => layer.delete(&collection, &selector).map(|_| CliOutput::Ok),
        LayerAction::Drop { collection } => {
            layer.delete_collection(&collection).map(|_| CliOutput::Ok)
        }
        LayerAction::Reset => layer.reset().map(|_| CliOutput::Ok),
    };

    match result {
        Ok(output) => {
            println!("{}", format_output(&output, mode));
            EXIT_OK
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            EXIT_ERROR
        }
    }
}

fn print_read(outcome: ReadOutcome<CliOutput>, mode: OutputMode) -> i32 {
    match outcome {
        ReadOutcome::Found(output) => {
            println!("{}", format_output(&output, mode));
            EXIT_OK
        }
        ReadOutcome::Missing => {
            println!("{}", format_output(&CliOutput::Missing, mode));
            EXIT_OK
        }
        ReadOutcome::Unavailable(e) => {
            eprintln!("{}", format_error(&veclayer::Error::from(e), mode));
            EXIT_UNAVAILABLE
        }
    }
}
