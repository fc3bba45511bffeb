//! Component command - list the components of an app

use clap::ValueEnum;
use console::style;
use miette::IntoDiagnostic;

use super::Session;
use crate::display::summary_table;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// One row per object: component, type, index, apiversion, kind, name
    Wide,
    /// Object summaries as a JSON array
    Json,
}

pub fn list(session: &Session, output: Option<ListFormat>) -> Result<()> {
    let components = session.app.components()?;

    let Some(format) = output else {
        if components.is_empty() {
            println!(
                "No components found in {}",
                style(session.app.components_dir.display()).dim()
            );
        }
        for component in &components {
            println!("{}", component.name());
        }
        return Ok(());
    };

    let m = session.materializer();
    let mut summaries = Vec::new();
    for component in &components {
        summaries.extend(component.summarize(&m)?);
    }

    match format {
        ListFormat::Wide => summary_table(&summaries).print(),
        ListFormat::Json => {
            let json = serde_json::to_string_pretty(&summaries).into_diagnostic()?;
            println!("{}", json);
        }
    }

    Ok(())
}
