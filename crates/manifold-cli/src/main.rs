//! Manifold CLI - per-component parameter overrides for Kubernetes manifests

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::Session;
use commands::component::ListFormat;
use commands::param::ParamFormat;
use commands::show::ShowFormat;

#[derive(Parser)]
#[command(name = "manifold")]
#[command(author = "Manifold Contributors")]
#[command(version)]
#[command(about = "Manage per-component parameter overrides for Kubernetes manifests", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// App root directory (containing app.yaml)
    #[arg(long, global = true, default_value = ".", env = "MANIFOLD_APP")]
    app: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the components of the app
    #[command(subcommand)]
    Component(ComponentCommands),

    /// List, set and delete parameter overrides
    #[command(subcommand)]
    Param(ParamCommands),

    /// Print materialized objects
    Show {
        /// Components to show (default: all)
        components: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ShowFormat::Yaml)]
        output: ShowFormat,
    },
}

#[derive(Subcommand)]
enum ComponentCommands {
    /// List components
    List {
        /// Output format (default: names only)
        #[arg(short, long, value_enum)]
        output: Option<ListFormat>,
    },
}

#[derive(Subcommand)]
enum ParamCommands {
    /// List overrides in effect
    List {
        /// Only this component
        component: Option<String>,

        /// Only this document of the component
        #[arg(long, requires = "component")]
        index: Option<usize>,

        /// List every overridable path with its current base value instead
        #[arg(long)]
        available: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ParamFormat::Table)]
        output: ParamFormat,
    },

    /// Set an override
    Set {
        component: String,

        /// Dot-separated path, e.g. spec.replicas
        key: String,

        /// Value; true/false/null, numbers and JSON arrays or objects are typed
        value: String,

        /// Scope the override to one document of the component
        #[arg(long)]
        index: Option<usize>,

        /// Store the value as a string, whatever it looks like
        #[arg(long)]
        as_string: bool,
    },

    /// Delete an override
    Delete {
        component: String,

        /// Dot-separated path, e.g. spec.replicas
        key: String,

        /// Delete from the scope of one document
        #[arg(long)]
        index: Option<usize>,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    match cli.command {
        Commands::Component(ComponentCommands::List { output }) => {
            let session = Session::open(&cli.app)?;
            commands::component::list(&session, output)
        }

        Commands::Param(ParamCommands::List {
            component,
            index,
            available,
            output,
        }) => {
            let session = Session::open(&cli.app)?;
            commands::param::list(&session, component.as_deref(), index, available, output)
        }

        Commands::Param(ParamCommands::Set {
            component,
            key,
            value,
            index,
            as_string,
        }) => {
            let mut session = Session::open(&cli.app)?;
            commands::param::set(&mut session, &component, &key, &value, index, as_string)
        }

        Commands::Param(ParamCommands::Delete { component, key, index }) => {
            let mut session = Session::open(&cli.app)?;
            commands::param::delete(&mut session, &component, &key, index)
        }

        Commands::Show { components, output } => {
            let session = Session::open(&cli.app)?;
            commands::show::run(&session, &components, output)
        }
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
