//! PDF conversion through external `pdftotext` / `pdfinfo` executables.
//!
//! Both tools are located once at startup by probing a directory for
//! platform-suffixed file names, e.g. `pdftotext-linux-x86_64`. A sidecar file
//! `<name>.version` may carry the tool version.

use crate::error::{FulltextError, Result};
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

pub const CONVERTER_NAME: &str = "pdftotext";
pub const INFO_NAME: &str = "pdfinfo";

static PAGES_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Pages:[^0-9]+([0-9]+)").unwrap());

/// An executable found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTool {
    pub path: PathBuf,
    pub version: String,
}

impl RegisteredTool {
    /// Probe `dir` for `<name>-<platform>[.exe]` and its version sidecar.
    pub fn probe(dir: &Path, name: &str) -> Option<Self> {
        let file_name = platform_file_name(name);
        let path = dir.join(&file_name);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "{} not found", file_name);
            return None;
        }

        let version = std::fs::read_to_string(dir.join(format!("{}.version", file_name)))
            .ok()
            .and_then(|content| content.split_whitespace().next().map(str::to_string))
            .unwrap_or_else(|| "UNKNOWN".to_string());

        tracing::info!(
            tool = name,
            version = %version,
            path = %path.display(),
            "Registered PDF tool"
        );
        Some(Self { path, version })
    }

    fn run(&self, name: &str, args: &[&OsStr]) -> Result<()> {
        tracing::debug!(tool = name, ?args, "Running external tool");
        let output = Command::new(&self.path)
            .args(args)
            .output()
            .map_err(|e| FulltextError::tool(name, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FulltextError::tool(
                name,
                format!("{} ({})", output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

/// `<name>-<os>-<arch>`, with `.exe` appended on Windows.
pub fn platform_file_name(name: &str) -> String {
    let mut file_name = format!(
        "{}-{}-{}",
        name,
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    if cfg!(windows) {
        file_name.push_str(".exe");
    }
    file_name
}

/// The converter executables available to this process.
#[derive(Debug, Clone, Default)]
pub struct PdfTools {
    converter: Option<RegisteredTool>,
    info: Option<RegisteredTool>,
}

impl PdfTools {
    /// Probe `dir` for both tools. A missing converter disables PDF indexing.
    pub fn discover(dir: &Path) -> Self {
        let converter = RegisteredTool::probe(dir, CONVERTER_NAME);
        if converter.is_none() {
            tracing::info!(dir = %dir.display(), "{} not found -- PDF indexing disabled", CONVERTER_NAME);
        }
        Self {
            converter,
            info: RegisteredTool::probe(dir, INFO_NAME),
        }
    }

    pub fn converter(&self) -> Option<&RegisteredTool> {
        self.converter.as_ref()
    }

    pub fn info(&self) -> Option<&RegisteredTool> {
        self.info.as_ref()
    }

    pub fn converter_is_registered(&self) -> bool {
        self.converter.is_some()
    }

    pub fn info_is_registered(&self) -> bool {
        self.info.is_some()
    }
}

/// Where conversion output goes and how much of the document to convert.
#[derive(Debug, Clone)]
pub struct ConversionRequest<'a> {
    pub input: &'a Path,
    pub cache_file: &'a Path,
    pub info_file: &'a Path,
    /// `None` converts every page.
    pub max_pages: Option<u32>,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub total_pages: Option<u32>,
    pub indexed_pages: Option<u32>,
}

/// Runs the info tool (optional) and the converter (mandatory).
///
/// Info-tool failures only leave the page total unknown. Converter failures
/// and a missing cache file afterwards are errors.
pub fn convert(tools: &PdfTools, request: &ConversionRequest<'_>) -> Result<Conversion> {
    let converter = tools
        .converter()
        .ok_or_else(|| FulltextError::tool(CONVERTER_NAME, "not registered"))?;

    let total_pages = match tools.info() {
        Some(info) => {
            match info.run(
                INFO_NAME,
                &[request.input.as_os_str(), request.info_file.as_os_str()],
            ) {
                Ok(()) => total_pages_from_file(request.info_file),
                Err(e) => {
                    tracing::warn!(error = %e, input = %request.input.display(), "Error running {}", INFO_NAME);
                    None
                }
            }
        }
        None => {
            tracing::debug!("{} is not available", INFO_NAME);
            None
        }
    };

    // A stale cache from an earlier run must not be mistaken for fresh output
    if request.cache_file.exists() {
        std::fs::remove_file(request.cache_file)?;
    }

    let limit = request.max_pages.map(|n| n.to_string());
    let mut args = vec![OsStr::new("-enc"), OsStr::new("UTF-8"), OsStr::new("-nopgbrk")];
    if let Some(limit) = &limit {
        args.push(OsStr::new("-l"));
        args.push(OsStr::new(limit));
    }
    args.push(request.input.as_os_str());
    args.push(request.cache_file.as_os_str());

    converter.run(CONVERTER_NAME, &args)?;

    if !request.cache_file.exists() {
        let file_name = request
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.input.display().to_string());
        let non_ascii = !file_name.is_ascii();
        tracing::error!(file = %file_name, non_ascii, "Converter produced no output");
        return Err(FulltextError::ExtractionOutputMissing {
            file_name,
            non_ascii,
        });
    }

    let indexed_pages = match request.max_pages {
        None => total_pages,
        Some(max) => total_pages.map(|total| total.min(max)),
    };

    Ok(Conversion {
        total_pages,
        indexed_pages,
    })
}

/// Reads the page count from an info sidecar file.
pub fn total_pages_from_file(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    let pages = parse_page_count(&content);
    if pages.is_none() {
        tracing::debug!(path = %path.display(), "No page count in info file");
    }
    pages
}

/// Extracts `N` from a `Pages:   N` line.
pub fn parse_page_count(info: &str) -> Option<u32> {
    PAGES_LINE
        .captures(info)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
