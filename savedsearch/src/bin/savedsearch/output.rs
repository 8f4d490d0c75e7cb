use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be rendered as a table or a single line
pub trait TableDisplay {
    fn to_table(&self, output: &OutputManager) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn is_json(&self) -> bool {
        self.options.output_format == OutputFormat::Json
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(self);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    /// Print a bare value: the text itself, or a JSON string in JSON mode
    pub fn value(&self, text: &str) -> Result<()> {
        if self.options.quiet {
            return Ok(());
        }
        if self.is_json() {
            println!("{}", serde_json::to_string(text)?);
        } else {
            println!("{text}");
        }
        Ok(())
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.success)
            } else {
                format!("{} {}", ICONS.success.color(THEME.success), message.color(THEME.success))
            };
            println!("{output}");
        }
    }

    pub fn error(&self, message: &str) {
        let output = if self.options.no_color {
            format!("{} {message}", ICONS.error)
        } else {
            format!("{} {}", ICONS.error.color(THEME.error), message.color(THEME.error))
        };
        eprintln!("{output}");
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.warning)
            } else {
                format!("{} {}", ICONS.warning.color(THEME.warning), message.color(THEME.warning))
            };
            eprintln!("{output}");
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.info)
            } else {
                format!("{} {}", ICONS.info.color(THEME.info), message.color(THEME.info))
            };
            println!("{output}");
        }
    }

    /// Display verbose information (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.arrow)
            } else {
                format!("{} {}", ICONS.arrow.color(THEME.muted), message.color(THEME.muted))
            };
            eprintln!("{output}");
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("  {} {text}", ICONS.bullet)
            } else {
                format!("  {} {text}", ICONS.bullet.color(THEME.muted))
            };
            println!("{output}");
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("{key}: {value}")
            } else {
                format!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value))
            };
            println!("{output}");
        }
    }

    /// Create a themed table with a header row
    pub fn table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }

        let header_cells: Vec<Cell> = headers
            .iter()
            .map(|header| {
                let cell = Cell::new(header).add_attribute(Attribute::Bold);
                if self.options.no_color { cell } else { cell.fg(TableColor::Cyan) }
            })
            .collect();
        table.set_header(header_cells);
        table
    }
}
