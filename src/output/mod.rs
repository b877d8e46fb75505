//! Output formatting and management

use crate::discovery::NeighborEntry;
use crate::inference::{ClassificationResult, LabelSummary, ThreatLabel};
use crate::network::DeviceInfo;
use crate::scanner::ScanReport;
use crate::top_ports::service_name;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<PathBuf>,
    pub colored: bool,
    pub show_closed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            show_closed: false,
        }
    }
}

/// Renders results and writes them to stdout or a file
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        if !config.colored {
            colored::control::set_override(false);
        }
        Self { config }
    }

    pub fn format(&self) -> OutputFormat {
        self.config.format
    }

    /// Write an exposure scan report
    pub fn write_scan(&self, report: &ScanReport) -> io::Result<()> {
        let output = match self.config.format {
            OutputFormat::Text => self.format_scan_text(report),
            OutputFormat::Json => to_json(report)?,
            OutputFormat::Csv => self.format_scan_csv(report)?,
        };
        self.emit(&output)
    }

    /// Write a neighbor listing, sorted by address
    pub fn write_neighbors(&self, neighbors: &HashSet<NeighborEntry>) -> io::Result<()> {
        let mut sorted: Vec<NeighborEntry> = neighbors.iter().copied().collect();
        sorted.sort();

        let output = match self.config.format {
            OutputFormat::Text => format_neighbors_text(&sorted),
            OutputFormat::Json => to_json(&sorted)?,
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(["ip_address"]).map_err(csv_to_io)?;
                for entry in &sorted {
                    writer.write_record([entry.ip.to_string()]).map_err(csv_to_io)?;
                }
                finish_csv(writer)?
            }
        };
        self.emit(&output)
    }

    /// Write labelled rows followed by a per-label summary
    /// `columns` names the feature columns of CSV output; absent names fall back to `feature_N`
    pub fn write_predictions(
        &self,
        results: &[ClassificationResult],
        columns: Option<&[String]>,
    ) -> io::Result<()> {
        let summary = LabelSummary::from_results(results);
        let output = match self.config.format {
            OutputFormat::Text => format_predictions_text(results, &summary),
            OutputFormat::Json => to_json(&JsonPredictions {
                results,
                summary: summary.iter().map(|(label, count)| (label.as_str(), count)).collect(),
            })?,
            OutputFormat::Csv => format_predictions_csv(results, columns)?,
        };
        self.emit(&output)
    }

    pub fn write_device_info(&self, info: &DeviceInfo) -> io::Result<()> {
        let output = match self.config.format {
            OutputFormat::Text => {
                let mut out = format!("{}\n", "DEVICE INFORMATION".bold());
                for (key, value) in info.rows() {
                    out.push_str(&format!("  {:<14} {}\n", key, value));
                }
                out
            }
            OutputFormat::Json => to_json(info)?,
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(["field", "value"]).map_err(csv_to_io)?;
                for (key, value) in info.rows() {
                    writer.write_record([key, value.as_str()]).map_err(csv_to_io)?;
                }
                finish_csv(writer)?
            }
        };
        self.emit(&output)
    }

    fn emit(&self, output: &str) -> io::Result<()> {
        match &self.config.file {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(output.as_bytes())?;
                log::info!("Results written to {}", path.display());
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(output.as_bytes())?;
                handle.flush()?;
            }
        }
        Ok(())
    }

    fn format_scan_text(&self, report: &ScanReport) -> String {
        let mut output = format!(
            "\n{} {} ({} ports, {:.2}s)\n",
            "EXPOSURE SCAN".bold(),
            report.host,
            report.ports.len(),
            report.duration.as_secs_f64()
        );

        if report.open_ports.is_empty() {
            output.push_str(&format!("  {}\n", "No open ports found".green()));
        } else {
            output.push_str(&format!("{}\n", "OPEN PORTS:".red().bold()));
            for port in &report.open_ports {
                output.push_str(&format!(
                    "  {} {}\n",
                    format!("{:<10}", format!("{}/tcp", port)).red(),
                    service_name(*port).unwrap_or("unknown")
                ));
            }
        }

        if self.config.show_closed {
            let closed = report.closed_ports();
            if !closed.is_empty() {
                output.push_str(&format!("{}\n", "CLOSED PORTS:".dimmed()));
                for port in closed {
                    output.push_str(&format!("  {}\n", format!("{}/tcp", port).dimmed()));
                }
            }
        }

        output
    }

    fn format_scan_csv(&self, report: &ScanReport) -> io::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["host", "port", "state", "service"])
            .map_err(csv_to_io)?;

        for port in &report.ports {
            let open = report.open_ports.binary_search(port).is_ok();
            if !open && !self.config.show_closed {
                continue;
            }
            writer
                .write_record([
                    report.host.to_string(),
                    port.to_string(),
                    (if open { "open" } else { "closed" }).to_string(),
                    service_name(*port).unwrap_or("").to_string(),
                ])
                .map_err(csv_to_io)?;
        }
        finish_csv(writer)
    }
}

#[derive(Serialize)]
struct JsonPredictions<'a> {
    results: &'a [ClassificationResult],
    summary: Vec<(&'static str, usize)>,
}

fn format_neighbors_text(sorted: &[NeighborEntry]) -> String {
    if sorted.is_empty() {
        return "No neighbors found\n".to_string();
    }
    let mut output = format!("{} ({})\n", "NEIGHBORS".bold(), sorted.len());
    for entry in sorted {
        output.push_str(&format!("  {}\n", entry.ip.to_string().cyan()));
    }
    output
}

/// Pads before coloring so escape codes do not count toward the width
fn label_cell(label: ThreatLabel, width: usize) -> ColoredString {
    let text = format!("{:<width$}", label.as_str(), width = width);
    match label {
        ThreatLabel::Normal => text.green(),
        ThreatLabel::Probe => text.yellow(),
        _ => text.red().bold(),
    }
}

fn format_predictions_text(results: &[ClassificationResult], summary: &LabelSummary) -> String {
    let mut output = String::new();

    if results.len() == 1 {
        let result = &results[0];
        output.push_str(&format!(
            "Prediction: {} ({:.1}%)\n",
            label_cell(result.label, 0),
            result.confidence * 100.0
        ));
        return output;
    }

    output.push_str(&format!("{:>6}  {:<8} {:>10}\n", "ROW", "LABEL", "CONFIDENCE"));
    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!(
            "{:>6}  {} {:>9.1}%\n",
            i + 1,
            label_cell(result.label, 8),
            result.confidence * 100.0
        ));
    }

    output.push_str(&format!("\n{}\n", "SUMMARY".bold()));
    for (label, count) in summary.iter() {
        output.push_str(&format!("  {:<8} {}\n", label.as_str(), count));
    }
    output.push_str(&format!(
        "  {} of {} rows flagged as attacks\n",
        summary.attacks(),
        summary.total()
    ));
    output
}

/// Feature columns followed by the predicted label
fn format_predictions_csv(
    results: &[ClassificationResult],
    columns: Option<&[String]>,
) -> io::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<String> = match columns {
        Some(names) if names.len() == crate::inference::FEATURE_COUNT => names.to_vec(),
        _ => (1..=crate::inference::FEATURE_COUNT)
            .map(|i| format!("feature_{}", i))
            .collect(),
    };
    header.push("Prediction".to_string());
    writer.write_record(&header).map_err(csv_to_io)?;

    for result in results {
        let mut record: Vec<String> = result.input.as_slice().iter().map(|v| v.to_string()).collect();
        record.push(result.label.to_string());
        writer.write_record(&record).map_err(csv_to_io)?;
    }
    finish_csv(writer)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> io::Result<String> {
    let mut json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    json.push('\n');
    Ok(json)
}

fn csv_to_io(e: csv::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> io::Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
