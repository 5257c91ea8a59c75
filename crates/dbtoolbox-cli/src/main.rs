use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::serve::ServeOptions;

#[derive(Parser, Debug)]
#[command(
    name = "dbtoolbox",
    version,
    about = "Serve parameterized database tools over HTTP and MCP"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,

    #[command(flatten)]
    files: ToolsFileArgs,

    #[command(flatten)]
    serve: ServeArgs,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server (the default when no command is given)
    Serve,

    /// Validate tools files without connecting to any database
    Check,
}

#[derive(Args, Debug)]
struct ToolsFileArgs {
    /// Tools file to load
    #[arg(
        long = "tools-file",
        global = true,
        env = "DBTOOLBOX_TOOLS_FILE",
        default_value = "tools.yaml",
        conflicts_with = "tools_files"
    )]
    tools_file: PathBuf,

    /// Several tools files, merged. Names must not collide across files.
    #[arg(long = "tools-files", global = true, value_delimiter = ',', num_args = 1..)]
    tools_files: Vec<PathBuf>,
}

impl ToolsFileArgs {
    fn paths(&self) -> Vec<PathBuf> {
        if self.tools_files.is_empty() {
            vec![self.tools_file.clone()]
        } else {
            self.tools_files.clone()
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address of the interface the server listens on
    #[arg(short, long, global = true, default_value = "127.0.0.1")]
    address: String,

    /// Port the server listens on
    #[arg(short, long, global = true, default_value_t = 5000)]
    port: u16,

    /// Serve MCP over stdin/stdout instead of HTTP
    #[arg(long, global = true, default_value_t = false)]
    stdio: bool,
}

#[derive(Args, Debug)]
struct LoggingArgs {
    /// Minimum level of logs emitted (overridden by RUST_LOG)
    #[arg(long = "log-level", global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log output format
    #[arg(long = "logging-format", global = true, value_enum, default_value_t = LoggingFormat::Standard)]
    logging_format: LoggingFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LoggingFormat {
    Standard,
    Json,
}

/// Install the global subscriber. With `to_stderr`, stdout stays free for
/// protocol traffic.
fn init_logging(args: &LoggingArgs, to_stderr: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (args.logging_format, to_stderr) {
        (LoggingFormat::Json, true) => builder.json().with_writer(std::io::stderr).init(),
        (LoggingFormat::Json, false) => builder.json().init(),
        (LoggingFormat::Standard, true) => builder.with_writer(std::io::stderr).init(),
        (LoggingFormat::Standard, false) => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_logging(&cli.logging, cli.serve.stdio);
            commands::serve::serve(ServeOptions {
                tools_files: cli.files.paths(),
                address: cli.serve.address,
                port: cli.serve.port,
                stdio: cli.serve.stdio,
            })
            .await?
        }
        Command::Check => {
            init_logging(&cli.logging, true);
            commands::check::run(&cli.files.paths())?
        }
    }

    Ok(())
}
