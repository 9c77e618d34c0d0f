use clap::{
    builder::{styling::AnsiColor, Styles},
    ArgAction, Parser, Subcommand,
};
use zkoracle::{
    cmd::validate::ValidateCommand,
    common::{init_tracing, LogFormat, Verbosity},
};
use zkoracle_cli_runner::CliRunner;
use zkoracle_version::SHORT_VERSION;

#[derive(Debug, Parser)]
#[command(
    name = "zkoracle",
    about = "Validator node for the zkOracle block attestation network.",
    version = SHORT_VERSION.as_str(),
    term_width = 80,
    styles = get_color_style()
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level of the log messages.
    ///
    /// Pass multiple times to increase the verbosity (e.g. -v, -vv).
    /// - 0: info
    /// - 1 (-v): debug
    /// - 2 (-vv): trace
    ///
    /// `RUST_LOG` overrides this flag.
    #[arg(help_heading = "Display options", global = true, short, long, verbatim_doc_comment, action = ArgAction::Count)]
    verbosity: Verbosity,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        help_heading = "Display options",
        help = "Format of the log output."
    )]
    log_format: LogFormat,
}

impl Cli {
    pub fn run(self) -> eyre::Result<()> {
        init_tracing(self.verbosity, self.log_format)?;

        let runner = CliRunner::new()?;
        match self.command {
            Commands::Validate(validate) => {
                runner.run_command_until_exit(|ctx| validate.execute(ctx))
            }
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch the oracle contract and vote on requested blocks.
    #[command(name = "validate")]
    Validate(ValidateCommand),
}

fn get_color_style() -> Styles {
    Styles::styled()
        .usage(AnsiColor::Green.on_default().bold().underline())
        .header(AnsiColor::Yellow.on_default().bold().underline())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}
