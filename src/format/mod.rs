//! Rendering of [`MetricSample`]s as a table, JSON lines or a custom template.
//!
//! A format string is one of:
//!
//! - `table`: the default table for the daemon's platform.
//! - `json`: one JSON object per workload.
//! - `table <template>`: a header line followed by one row per workload, with
//!   tab-separated cells aligned.
//! - `<template>`: one row per workload, nothing else.
//!
//! Templates are parsed up front by [`StatsFormat::new`], so rendering itself cannot fail.

use std::collections::BTreeMap;

use crate::stats::MetricSample;
use crate::workload::{self, OsFamily};

mod error;
mod tabwriter;
mod template;
mod units;

pub use error::{Error, Result};
pub use tabwriter::align_tabs;
pub use template::{Column, Template};
pub use units::{bytes_size, format_significant, human_size_with_precision};

use template::Segment;

pub const TABLE_FORMAT_KEY: &str = "table";
pub const JSON_FORMAT_KEY: &str = "json";

const DEFAULT_TABLE_FORMAT: &str = "table {{.ID}}\t{{.Name}}\t{{.CPUPerc}}\t{{.MemUsage}}\t{{.MemPerc}}\t{{.NetIO}}\t{{.BlockIO}}\t{{.PIDs}}";
const WINDOWS_DEFAULT_TABLE_FORMAT: &str =
    "table {{.ID}}\t{{.Name}}\t{{.CPUPerc}}\t{{.MemUsage}}\t{{.NetIO}}\t{{.BlockIO}}";
const JSON_FORMAT: &str = "{{json .}}";

const PLACEHOLDER: &str = "--";

/// A parsed output format, bound to the platform family whose columns it renders.
#[derive(Debug, Clone)]
pub struct StatsFormat {
    table: bool,
    template: Template,
    os: OsFamily,
    trunc: bool,
}

impl StatsFormat {
    /// Parses `source`. With `trunc` set, ids are shortened to 12 characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the template is invalid.
    pub fn new(source: &str, os: OsFamily, trunc: bool) -> Result<Self> {
        let source = match source {
            TABLE_FORMAT_KEY if os.is_windows() => WINDOWS_DEFAULT_TABLE_FORMAT,
            TABLE_FORMAT_KEY => DEFAULT_TABLE_FORMAT,
            JSON_FORMAT_KEY => JSON_FORMAT,
            other => other,
        };
        let (table, body) = match source.strip_prefix(TABLE_FORMAT_KEY) {
            Some(body) => (true, body),
            None => (false, source),
        };
        let body = body.trim_matches(' ').replace("\\t", "\t").replace("\\n", "\n");

        Ok(Self {
            table,
            template: Template::parse(&body)?,
            os,
            trunc,
        })
    }

    /// Renders `samples` in order. Table formats always produce a header line, other
    /// formats produce nothing for an empty slice.
    pub fn render(&self, samples: &[MetricSample]) -> String {
        let mut rows = String::new();
        for sample in samples {
            let row = Row {
                sample,
                os: self.os,
                trunc: self.trunc,
            };
            self.execute(&mut rows, |column| row.value(column), || row.to_json());
            rows.push('\n');
        }

        if !self.table {
            return rows;
        }
        let mut text = String::new();
        self.execute(&mut text, |column| header(column, self.os).to_owned(), String::new);
        text.push('\n');
        text.push_str(&rows);
        align_tabs(&text)
    }

    fn execute(
        &self,
        out: &mut String,
        value: impl Fn(Column) -> String,
        whole: impl Fn() -> String,
    ) {
        for segment in self.template.segments() {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Column(column) => out.push_str(&value(*column)),
                Segment::Json(None) => out.push_str(&whole()),
                Segment::Json(Some(column)) => {
                    let value = value(*column);
                    out.push_str(&serde_json::to_string(&value).unwrap_or(value));
                }
            }
        }
    }
}

/// The column title shown in table headers.
pub fn header(column: Column, os: OsFamily) -> &'static str {
    match column {
        Column::Container => "CONTAINER",
        Column::Name => "NAME",
        Column::ID => "CONTAINER ID",
        Column::CPUPerc => "CPU %",
        Column::MemUsage if os.is_windows() => "PRIV WORKING SET",
        Column::MemUsage => "MEM USAGE / LIMIT",
        Column::MemPerc => "MEM %",
        Column::NetIO => "NET I/O",
        Column::BlockIO => "BLOCK I/O",
        Column::PIDs => "PIDS",
    }
}

struct Row<'a> {
    sample: &'a MetricSample,
    os: OsFamily,
    trunc: bool,
}

impl Row<'_> {
    fn value(&self, column: Column) -> String {
        let s = self.sample;
        match column {
            Column::Container => s.container.clone(),
            Column::Name => match s.name.get(1..) {
                Some(name) if !name.is_empty() => name.to_owned(),
                _ => PLACEHOLDER.to_owned(),
            },
            Column::ID if self.trunc => workload::truncate_id(&s.id).to_owned(),
            Column::ID => s.id.clone(),
            Column::CPUPerc if s.is_invalid => PLACEHOLDER.to_owned(),
            Column::CPUPerc => format!("{:.2}%", s.cpu_percentage),
            Column::MemUsage if s.is_invalid => format!("{PLACEHOLDER} / {PLACEHOLDER}"),
            Column::MemUsage if self.os.is_windows() => bytes_size(s.memory as f64),
            Column::MemUsage => format!(
                "{} / {}",
                bytes_size(s.memory as f64),
                bytes_size(s.memory_limit as f64)
            ),
            Column::MemPerc if s.is_invalid || self.os.is_windows() => PLACEHOLDER.to_owned(),
            Column::MemPerc => format!("{:.2}%", s.memory_percentage),
            Column::NetIO if s.is_invalid => PLACEHOLDER.to_owned(),
            Column::NetIO => io_pair(s.network_rx, s.network_tx),
            Column::BlockIO if s.is_invalid => PLACEHOLDER.to_owned(),
            Column::BlockIO => io_pair(s.block_read, s.block_write),
            Column::PIDs if s.is_invalid || self.os.is_windows() => PLACEHOLDER.to_owned(),
            Column::PIDs => s.pids_current.to_string(),
        }
    }

    fn to_json(&self) -> String {
        let fields: BTreeMap<&str, String> = Column::ALL
            .into_iter()
            .map(|column| (column.field(), self.value(column)))
            .collect();
        serde_json::to_string(&fields).unwrap_or_default()
    }
}

fn io_pair(first: u64, second: u64) -> String {
    format!(
        "{} / {}",
        human_size_with_precision(first as f64, 3),
        human_size_with_precision(second as f64, 3)
    )
}
