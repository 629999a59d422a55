use std::io::{self, BufWriter};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use urlcat::app::App;
use urlcat::config::{ConfigLoader, ConfigOverrides};
use urlcat::error::CatError;
use urlcat::output::{OutputMode, SummaryOutput};

const EXIT_INVALID_ARGS: u8 = 1;
const EXIT_UNPROCESSABLE_IDENTIFIER: u8 = 2;
const EXIT_UNABLE_TO_COPY: u8 = 3;
const EXIT_UNABLE_TO_CLOSE: u8 = 4;

#[derive(Parser)]
#[command(name = "urlcat")]
#[command(
    about = "Concatenate local files, HTTP(S) resources and S3 objects to stdout, in argument order"
)]
#[command(version, author)]
struct Cli {
    /// Locations in the form [scheme:][//[userinfo@]host][/]path[?query][#fragment]
    identifiers: Vec<String>,

    /// Maximum number of sources opened at the same time
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,

    /// Seconds allowed for opening all sources
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to a JSON configuration file
    #[arg(long)]
    config: Option<String>,

    /// Print the transfer summary as JSON
    #[arg(long)]
    json_summary: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_INVALID_ARGS),
            };
        }
    };

    if let Err(report) = run(cli) {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CatError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatError) -> u8 {
    match error {
        CatError::UnprocessableIdentifier { .. } => EXIT_UNPROCESSABLE_IDENTIFIER,
        CatError::Copy(_) => EXIT_UNABLE_TO_COPY,
        CatError::Close(_) => EXIT_UNABLE_TO_CLOSE,
        CatError::NoIdentifiers
        | CatError::InvalidConcurrency(_)
        | CatError::ConfigRead(_)
        | CatError::ConfigParse(_)
        | CatError::InvalidConfig(_)
        | CatError::TransportSetup { .. } => EXIT_INVALID_ARGS,
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if cli.identifiers.is_empty() {
        return Err(CatError::NoIdentifiers.into());
    }

    let overrides = ConfigOverrides {
        concurrency: cli.concurrency,
        open_timeout_secs: cli.timeout,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), &overrides)?;
    let app = App::from_config(config)?;

    let mut stdout = BufWriter::new(io::stdout().lock());
    let summary = app.cat(&cli.identifiers, &mut stdout)?;
    drop(stdout);

    let mode = if cli.json_summary {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    // Summary failures do not change the exit code.
    let _ = SummaryOutput::print(&summary, mode);
    Ok(())
}
