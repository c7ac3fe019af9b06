//! External converter: run LibreOffice (or a compatible CLI) headless.
//!
//! Every run gets its own scratch directory and its own LibreOffice user
//! profile inside it. LibreOffice refuses to start a second instance against a
//! profile that is already in use, so sharing `~/.config/libreoffice` would
//! serialise (or break) concurrent conversions.
//!
//! The child is spawned with `kill_on_drop(true)`: when the timeout fires the
//! `wait_with_output` future is dropped and tokio kills the process.

use crate::config::EngineConfig;
use crate::error::DocError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Prefix of the per-call scratch directories created under the storage root.
pub const SCRATCH_PREFIX: &str = ".doc2json-scratch-";

/// Output formats the converter is allowed to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Txt,
    Csv,
    Html,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 4] = [
        TargetFormat::Pdf,
        TargetFormat::Txt,
        TargetFormat::Csv,
        TargetFormat::Html,
    ];

    /// Parse a caller-supplied format name (`"PDF"`, `" .txt "`, …).
    pub fn parse(s: &str) -> Result<Self, DocError> {
        let normalised = s.trim().trim_start_matches('.').to_lowercase();
        match normalised.as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "txt" => Ok(TargetFormat::Txt),
            "csv" => Ok(TargetFormat::Csv),
            "html" => Ok(TargetFormat::Html),
            _ => Err(DocError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Txt => "txt",
            TargetFormat::Csv => "csv",
            TargetFormat::Html => "html",
        }
    }

    /// LibreOffice export filter for this format.
    pub fn filter(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "writer_pdf_Export",
            TargetFormat::Txt => "Text (encoded)",
            TargetFormat::Csv => "Text - txt - csv (StarCalc)",
            TargetFormat::Html => "HTML (StarWriter)",
        }
    }

    /// File extension of the produced file, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => ".pdf",
            TargetFormat::Txt => ".txt",
            TargetFormat::Csv => ".csv",
            TargetFormat::Html => ".html",
        }
    }

    /// Value passed to `--convert-to`.
    pub fn convert_to_arg(&self, explicit_filter: bool) -> String {
        if explicit_filter {
            format!("{}:{}", self.as_str(), self.filter())
        } else {
            self.as_str().to_string()
        }
    }
}

impl FromStr for TargetFormat {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetFormat::parse(s)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the converter command line (without spawning it).
pub fn build_command(
    config: &EngineConfig,
    input: &Path,
    format: TargetFormat,
    outdir: &Path,
) -> Command {
    let mut cmd = Command::new(&config.converter_program);
    cmd.arg(format!(
        "-env:UserInstallation=file://{}",
        outdir.join(".profile").display()
    ))
    .arg("--headless")
    .arg("--convert-to")
    .arg(format.convert_to_arg(config.explicit_filters))
    .arg("--outdir")
    .arg(outdir)
    .arg(input)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
    cmd
}

/// Run the converter against `input`, writing into `outdir`, and return the
/// path of the produced file.
///
/// `outdir` must be absolute: it is embedded in a `file://` URL for the
/// LibreOffice profile.
pub async fn run_converter(
    config: &EngineConfig,
    input: &Path,
    format: TargetFormat,
    outdir: &Path,
) -> Result<PathBuf, DocError> {
    let secs = config.converter_timeout_secs;
    info!(
        "Converting {} → {} with '{}' (timeout {}s)",
        input.display(),
        format,
        config.converter_program,
        secs
    );
    debug!("Export filter: {}", format.filter());

    let child = build_command(config, input, format, outdir)
        .spawn()
        .map_err(|e| DocError::ConversionFailed {
            reason: format!(
                "Failed to launch converter '{}': {}",
                config.converter_program, e
            ),
        })?;

    let output = match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
        .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(DocError::ConversionFailed {
                reason: format!("Converter I/O error: {e}"),
            })
        }
        Err(_) => {
            warn!("Converter timed out after {}s on {}", secs, input.display());
            return Err(DocError::ConversionFailed {
                reason: format!("LibreOffice conversion timed out after {secs} seconds"),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DocError::ConversionFailed {
            reason: format!("LibreOffice conversion failed: {}", stderr.trim()),
        });
    }

    find_output(outdir, format)?.ok_or_else(|| DocError::ConversionFailed {
        reason: "No converted file found".to_string(),
    })
}

/// Locate the produced file by extension. Sorted so the pick is stable when
/// the tool leaves more than one candidate behind.
fn find_output(outdir: &Path, format: TargetFormat) -> Result<Option<PathBuf>, DocError> {
    let wanted = format.as_str();
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(outdir)
        .map_err(|e| DocError::io(outdir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}
