#![deny(clippy::panic, clippy::print_stdout, clippy::unwrap_used)]

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;
use cocoon::actions;
use cocoon::config::cli::{Args, Command, SandboxCommand, VolumeCommand};
use cocoon::logger::CocoonLogger;
use cocoon::util::{
    print_json_output, set_json_output, set_should_print_output,
};
use log::Log;
use serde_json::Value;

pub fn main() -> Result<()> {
    let logger = CocoonLogger::new(log::LevelFilter::Info)
        .init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    // Tab completion requests never reach normal dispatch.
    if std::env::var("COMPLETE").is_ok() {
        CompleteEnv::with_factory(Args::command).complete();
        return Ok(());
    }

    let args = Args::parse();
    logger.set_level(args.log_level.unwrap_or(log::LevelFilter::Info));
    set_should_print_output(!args.json);

    let result = match args.command {
        Command::Sandbox(action) => match action {
            SandboxCommand::Create(create_args) => {
                actions::create(create_args)
            }
            SandboxCommand::Delete {
                name,
                delete_volumes,
                keep_volumes,
            } => actions::delete(&name, delete_volumes, keep_volumes),
            SandboxCommand::List => actions::list(),
            SandboxCommand::Connect { name, shell } => {
                actions::connect(&name, &shell)
            }
        },
        Command::Volume(action) => match action {
            VolumeCommand::List => actions::volume_list(),
            VolumeCommand::Delete { name, force } => {
                actions::volume_delete(&name, force)
            }
        },
        Command::Materialize(materialize_args) => {
            actions::materialize(materialize_args)
        }
    };

    if args.json {
        match &result {
            Ok(()) => {
                set_json_output("status", &Value::String("success".into()));
            }
            Err(e) => {
                set_json_output("status", &Value::String("error".into()));
                set_json_output("error", &Value::String(e.to_string()));
            }
        }
        print_json_output()?;
        if result.is_err() {
            logger.flush();
            std::process::exit(1);
        }
        return Ok(());
    }

    logger.flush();
    result
}
