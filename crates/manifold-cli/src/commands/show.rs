//! Show command - print materialized objects

use clap::ValueEnum;
use console::style;
use miette::IntoDiagnostic;
use serde_json::Value as JsonValue;

use super::Session;
use crate::display;
use crate::error::{CliError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ShowFormat {
    /// A multi-document YAML stream
    #[default]
    Yaml,
    /// A JSON array of objects
    Json,
}

pub fn run(session: &Session, names: &[String], output: ShowFormat) -> Result<()> {
    let components = session.select(names)?;
    let m = session.materializer();

    // Documents that fail to parse are reported; their siblings are still shown
    let mut objects = Vec::new();
    let mut failed = 0;
    for component in &components {
        let report = component.objects_report(&m)?;
        for err in &report.errors {
            display::warning(&err.to_string());
            failed += 1;
        }
        for doc in report.documents {
            objects.push((component.name().to_string(), doc));
        }
    }

    match output {
        ShowFormat::Yaml => {
            for (name, doc) in &objects {
                let yaml = serde_yaml::to_string(doc.tree.inner()).into_diagnostic()?;
                println!("---");
                println!("{}", style(format!("# Source: {}[{}]", name, doc.index)).dim());
                print!("{}", yaml);
            }
        }
        ShowFormat::Json => {
            let items: Vec<&JsonValue> = objects.iter().map(|(_, doc)| doc.tree.inner()).collect();
            let json = serde_json::to_string_pretty(&items).into_diagnostic()?;
            println!("{}", json);
        }
    }

    if failed > 0 {
        return Err(CliError::Parse {
            message: format!("{} document(s) could not be parsed", failed),
            help: Some("The remaining documents were printed above".to_string()),
        });
    }
    Ok(())
}
