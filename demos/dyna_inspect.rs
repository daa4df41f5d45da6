//! A small inspection CLI exercising `binout`, `d3plot` and key file
//! parsing end to end, in the spirit of the library's own test fixtures.

use clap::{Parser, Subcommand};
use dynareadout::{Binout, D3plot, KeyFile};
use dynareadout::key::ParseConfig;

#[derive(Parser)]
#[command(name = "dyna-inspect", about = "Inspect LS-DYNA binout/d3plot/key files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the variable tree of a binout file family.
    Binout { pattern: String },
    /// Print control-data summary and state count of a d3plot file family.
    D3plot { path: String },
    /// Print the keywords found in a key file deck.
    Key {
        path: String,
        #[arg(long)]
        no_includes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Binout { pattern } => {
            let binout = Binout::open(&pattern)?;
            print!("{}", binout.debug_tree());
            for (path, message) in binout.file_errors() {
                eprintln!("warning: {}: {message}", path.display());
            }
        }
        Command::D3plot { path } => {
            let plot = D3plot::open(&path)?;
            let control = plot.control();
            println!("title: {}", control.title.trim());
            println!("numnp: {}", control.numnp);
            println!("parts: {}", plot.num_parts());
            println!("states: {}", plot.states().len());
        }
        Command::Key { path, no_includes } => {
            let config = ParseConfig {
                parse_includes: !no_includes,
                ..ParseConfig::default()
            };
            let key_file = KeyFile::parse(&path, &config)?;
            for keyword in key_file.keywords() {
                println!("*{} ({} cards)", keyword.name, keyword.cards.len());
            }
            for warning in key_file.warnings() {
                eprintln!("warning: {warning}");
            }
        }
    }

    Ok(())
}
