mod cli;

use std::process::ExitCode;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wlx_randr::{
    ValidationError, WlRandr, WlRandrError, changes, report,
    transaction::SubmitKind,
};

use crate::cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let matches = Cli::command().get_matches();
    let args = match Cli::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    match run(&args, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli, matches: &ArgMatches) -> Result<(), WlRandrError> {
    let directives = cli::directives(matches)?;

    let (mut randr, mut event_queue) = WlRandr::connect()?;
    randr.wait_for_sync(&mut event_queue)?;
    let version = randr.version();

    if let Some(unknown) = args
        .output
        .iter()
        .find(|name| randr.mirror().head_by_name(name).is_none())
    {
        return Err(ValidationError::UnknownOutput(unknown.clone()).into());
    }

    if !directives.is_empty() {
        changes::apply_directives(randr.mirror_mut(), &directives, version)?;
        let kind = if args.dryrun {
            SubmitKind::Test
        } else {
            SubmitKind::Apply
        };
        randr.commit(&mut event_queue, kind)?;
        debug!(?kind, "configuration accepted");
        return Ok(());
    }

    let reports = report::collect(randr.mirror(), version);
    if args.json {
        println!("{}", report::to_json(&reports)?);
    } else {
        print!("{}", report::to_text(&reports, version));
    }
    Ok(())
}
