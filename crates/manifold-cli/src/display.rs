//! Display formatting for CLI output
//!
//! Column-aligned tables for component summaries and parameter rows.

use console::style;
use manifold_core::{ParamEntry, Summary};

/// Column gap between table cells
const GAP: usize = 3;

/// Left-aligned table with an upper-case header row
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_uppercase()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        widths
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == last {
                    cell.clone()
                } else {
                    format!("{:<width$}", cell, width = widths[i] + GAP)
                }
            })
            .collect::<String>()
    }

    /// Header and rows as plain text lines
    pub fn lines(&self) -> Vec<String> {
        let widths = self.widths();
        std::iter::once(&self.headers)
            .chain(self.rows.iter())
            .map(|cells| Self::line(cells, &widths))
            .collect()
    }

    pub fn print(&self) {
        let mut lines = self.lines().into_iter();
        if let Some(header) = lines.next() {
            println!("{}", style(header).bold());
        }
        for line in lines {
            println!("{}", line);
        }
    }
}

/// Table of object summaries, as shown by `component list -o wide`
pub fn summary_table(summaries: &[Summary]) -> Table {
    let mut table = Table::new(&["component", "type", "index", "apiversion", "kind", "name"]);
    for s in summaries {
        table.push(vec![
            s.component.clone(),
            s.file_type.to_string(),
            s.index.to_string(),
            s.api_version.clone(),
            s.kind.clone(),
            s.name.clone(),
        ]);
    }
    table
}

/// Table of parameter rows, as shown by `param list`
pub fn param_table(entries: &[ParamEntry]) -> Table {
    let mut table = Table::new(&["component", "index", "key", "value"]);
    for entry in entries {
        table.push(vec![
            entry.component.clone(),
            entry.index.to_string(),
            entry.key.to_string(),
            entry.value_string(),
        ]);
    }
    table
}

/// Print a success line to stdout
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print a warning line to stderr
pub fn warning(message: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), message);
}
