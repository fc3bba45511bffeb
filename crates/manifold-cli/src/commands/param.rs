//! Param command - list, set and delete parameter overrides

use clap::ValueEnum;
use console::style;
use manifold_core::{ParamOptions, ParamPath, ValueStyle, parse_param_value, params::display_value};
use miette::IntoDiagnostic;
use serde_json::Value as JsonValue;

use super::Session;
use crate::display::{self, param_table};
use crate::error::{CliError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ParamFormat {
    #[default]
    Table,
    Json,
}

pub fn list(
    session: &Session,
    component: Option<&str>,
    index: Option<usize>,
    available: bool,
    output: ParamFormat,
) -> Result<()> {
    let components = match component {
        Some(name) => vec![session.app.component(name)?],
        None => session.app.components()?,
    };

    let m = session.materializer();
    let mut rows = Vec::new();
    for component in &components {
        let entries = if available {
            component.available_params(&m, index)?
        } else {
            component.params(&m, index)?
        };
        rows.extend(entries);
    }

    match output {
        ParamFormat::Json => {
            let json = serde_json::to_string_pretty(&rows).into_diagnostic()?;
            println!("{}", json);
        }
        ParamFormat::Table => {
            let table = param_table(&rows);
            if table.is_empty() {
                println!("{}", style("No parameters set").dim());
            } else {
                table.print();
            }
        }
    }

    Ok(())
}

pub fn set(
    session: &mut Session,
    component: &str,
    key: &str,
    raw_value: &str,
    index: Option<usize>,
    as_string: bool,
) -> Result<()> {
    let component = session.app.component(component)?;
    let path = parse_key(key)?;

    // The targeted document has to exist before a scope is written for it
    if let Some(i) = index {
        component.available_params(&session.materializer(), Some(i))?;
    }

    let (value, value_style) = if as_string {
        (JsonValue::String(raw_value.to_string()), ValueStyle::String)
    } else {
        (parse_param_value(raw_value), ValueStyle::Auto)
    };
    let shown = display_value(&value);

    component.set_param(
        &mut session.store,
        &session.app.whitelist,
        &path,
        value,
        &ParamOptions {
            index,
            style: value_style,
        },
    )?;
    session.store.persist()?;

    display::success(&format!(
        "Set {} {} = {}",
        target(component.name(), index),
        style(&path).cyan(),
        shown
    ));
    Ok(())
}

pub fn delete(session: &mut Session, component: &str, key: &str, index: Option<usize>) -> Result<()> {
    let component = session.app.component(component)?;
    let path = parse_key(key)?;

    component.delete_param(&mut session.store, &path, &ParamOptions::for_index(index))?;
    session.store.persist()?;

    display::success(&format!(
        "Deleted {} {}",
        target(component.name(), index),
        style(&path).cyan()
    ));
    Ok(())
}

fn parse_key(key: &str) -> Result<ParamPath> {
    ParamPath::parse(key).map_err(|e| {
        CliError::input_with_help(
            e.to_string(),
            "Keys are dot-separated paths such as `spec.replicas` or `metadata.name`",
        )
    })
}

fn target(component: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}[{}]", component, i),
        None => component.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("spec.replicas").unwrap().to_string(), "spec.replicas");
        let err = parse_key("spec..replicas").unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::ERROR);
    }

    #[test]
    fn test_target() {
        assert_eq!(target("rbac", Some(1)), "rbac[1]");
        assert_eq!(target("web", None), "web");
    }
}
