//! Runtime configuration loaded from TOML.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FULLTEXT_MCP_CONFIG";

const DEFAULT_TEXT_MAX_LENGTH: usize = 500_000;
const DEFAULT_PDF_MAX_PAGES: u32 = 100;

/// Upper bound on the number of characters extracted from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "LimitRepr")]
pub enum TextLimit {
    Chars(usize),
    /// No truncation. Written as `false` in the config file.
    Disabled,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LimitRepr {
    Chars(usize),
    Flag(bool),
}

impl TryFrom<LimitRepr> for TextLimit {
    type Error = String;

    fn try_from(repr: LimitRepr) -> Result<Self, Self::Error> {
        match repr {
            LimitRepr::Chars(n) => Ok(Self::Chars(n)),
            LimitRepr::Flag(false) => Ok(Self::Disabled),
            LimitRepr::Flag(true) => {
                Err("text_max_length must be a character count or false".to_string())
            }
        }
    }
}

impl TextLimit {
    pub const fn chars(self) -> Option<usize> {
        match self {
            Self::Chars(n) => Some(n),
            Self::Disabled => None,
        }
    }
}

impl Default for TextLimit {
    fn default() -> Self {
        Self::Chars(DEFAULT_TEXT_MAX_LENGTH)
    }
}

/// Full-text indexing settings. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FulltextConfig {
    /// Maximum number of characters indexed per document.
    pub text_max_length: TextLimit,
    /// Maximum number of PDF pages converted. 0 disables PDF indexing.
    pub pdf_max_pages: u32,
    /// Charset assumed for text attachments that carry none.
    pub default_charset: String,
    /// Let a byte-order mark override the declared charset.
    pub detect_charset: bool,
    /// Root directory for the database and item storage.
    pub data_dir: PathBuf,
    /// Directory probed for the PDF converter executables. Defaults to `data_dir`.
    pub tools_dir: Option<PathBuf>,
}

impl Default for FulltextConfig {
    fn default() -> Self {
        Self {
            text_max_length: TextLimit::default(),
            pdf_max_pages: DEFAULT_PDF_MAX_PAGES,
            default_charset: "utf-8".to_string(),
            detect_charset: true,
            data_dir: dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("fulltext-mcp"),
            tools_dir: None,
        }
    }
}

impl FulltextConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            tracing::debug!("No configuration file given, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the config file location from the environment or the first CLI argument.
    pub fn locate() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("fulltext.sqlite")
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }

    pub fn tools_dir(&self) -> &Path {
        self.tools_dir.as_deref().unwrap_or(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = FulltextConfig::parse("").unwrap();
        check!(config.text_max_length == TextLimit::Chars(500_000));
        check!(config.pdf_max_pages == 100);
        check!(config.default_charset == "utf-8");
        check!(config.detect_charset);
        check!(config.tools_dir() == config.data_dir.as_path());
    }

    #[rstest]
    #[case("text_max_length = 1000", TextLimit::Chars(1000))]
    #[case("text_max_length = false", TextLimit::Disabled)]
    fn test_text_limit(#[case] toml: &str, #[case] expected: TextLimit) {
        let config = FulltextConfig::parse(toml).unwrap();
        check!(config.text_max_length == expected);
    }

    #[rstest]
    #[case("text_max_length = true")]
    #[case("text_max_length = \"lots\"")]
    #[case("unknown_key = 1")]
    fn test_rejects_invalid(#[case] toml: &str) {
        check!(FulltextConfig::parse(toml).is_err());
    }

    #[test]
    fn test_paths() {
        let config = FulltextConfig::parse(
            "data_dir = \"/srv/ft\"\ntools_dir = \"/opt/tools\"\npdf_max_pages = 0",
        )
        .unwrap();
        check!(config.database_path() == PathBuf::from("/srv/ft/fulltext.sqlite"));
        check!(config.storage_dir() == PathBuf::from("/srv/ft/storage"));
        check!(config.tools_dir() == Path::new("/opt/tools"));
        check!(config.pdf_max_pages == 0);
    }

    #[test]
    fn test_load_missing_file() {
        let_assert!(Err(err) = FulltextConfig::load(Some(Path::new("/nonexistent/ft.toml"))));
        check!(err.to_string().contains("Failed to read config file"));
    }
}
