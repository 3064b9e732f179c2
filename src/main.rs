use clap::{Parser as ClapParser, Subcommand};
use docql::cli::{self, CliError, FoldOptions, TranslateOptions};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "docql")]
#[command(about = "docql - compile LINQ-style expression trees into document database SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a JSON-encoded query expression
    Translate {
        /// JSON request (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Print only the query text
        #[arg(long)]
        text_only: bool,
    },

    /// Constant-fold a JSON-encoded expression
    Fold {
        /// JSON request (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Translate {
            input,
            pretty,
            text_only,
        } => read_input(input).and_then(|input| {
            cli::execute_translate(&TranslateOptions {
                input,
                pretty,
                text_only,
            })
        }),
        Commands::Fold { input, pretty } => {
            read_input(input).and_then(|input| cli::execute_fold(&FoldOptions { input, pretty }))
        }
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Falls back to stdin when it is piped.
fn read_input(input: Option<String>) -> Result<Option<String>, CliError> {
    match input {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        None => Ok(None),
    }
}
