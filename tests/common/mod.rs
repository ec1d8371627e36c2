//! Shared test fixtures and utilities for integration tests.
//!
//! # Test Isolation Strategy
//!
//! Every test gets its own [`TestLibrary`]: a fresh temporary directory holding
//! the index database, the per-item storage directories, the attachment files
//! and (on unix) fake PDF tool scripts. Nothing is shared between tests.
//!
//! # Fake PDF tools
//!
//! [`FakeTool`] installs shell scripts named like the real `pdfinfo` /
//! `pdftotext` executables. The fake converter copies its input to its output,
//! so a "PDF" in these tests is a plain-text file.

use fulltext_mcp::extract::pdf::{CONVERTER_NAME, INFO_NAME, platform_file_name};
use fulltext_mcp::{Attachment, Fulltext, FulltextConfig, ItemId, LinkMode, SqliteAttachments};
use rstest::fixture;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary workspace directory for test isolation.
///
/// Provides basic filesystem operations within a temp directory that is
/// automatically cleaned up when dropped.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempWorkspace {
    /// Creates a new empty temporary workspace.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    /// Returns the root path of this workspace.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a directory (and all parent directories) within this workspace.
    ///
    /// # Panics
    /// Panics if directory creation fails.
    pub fn create_dir(&self, path: &str) -> PathBuf {
        let full_path = self.root.join(path);
        std::fs::create_dir_all(&full_path)
            .unwrap_or_else(|e| panic!("Failed to create directory '{}': {}", path, e));
        full_path
    }

    /// Creates a file with the given content within this workspace.
    ///
    /// Parent directories are created automatically if they don't exist.
    ///
    /// # Panics
    /// Panics if file creation fails.
    pub fn create_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent directory for '{}': {}", path, e)
            });
        }
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", path, e));
        full_path
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Shell-script stand-ins for the PDF executables.
#[allow(dead_code)] // Variants used across different integration test crates
#[derive(Debug, Clone, Copy)]
pub enum FakeTool {
    /// `pdfinfo` reporting a fixed page count.
    Info { pages: u32 },
    /// `pdftotext` copying its input to its output and logging its arguments.
    Converter,
    /// `pdftotext` exiting with an error.
    FailingConverter,
    /// `pdftotext` exiting successfully without writing anything.
    SilentConverter,
}

#[allow(dead_code)]
impl FakeTool {
    const fn name(self) -> &'static str {
        match self {
            Self::Info { .. } => INFO_NAME,
            _ => CONVERTER_NAME,
        }
    }

    fn script(self) -> String {
        match self {
            Self::Info { pages } => format!(
                "#!/bin/sh\nprintf 'Title:          test\\nPages:          {}\\nEncrypted:      no\\n' > \"$2\"\n",
                pages
            ),
            Self::Converter => "#!/bin/sh\n\
                 echo \"$@\" > \"$(dirname \"$0\")/pdftotext.args\"\n\
                 while [ $# -gt 2 ]; do shift; done\n\
                 cp \"$1\" \"$2\"\n"
                .to_string(),
            Self::FailingConverter => "#!/bin/sh\necho 'Syntax Error: broken PDF' >&2\nexit 1\n".to_string(),
            Self::SilentConverter => "#!/bin/sh\nexit 0\n".to_string(),
        }
    }

    /// Write the script into `dir` under its platform file name and make it executable.
    #[cfg(unix)]
    pub fn install(self, dir: &Path) {
        use std::os::unix::fs::PermissionsExt;

        let file_name = platform_file_name(self.name());
        let path = dir.join(&file_name);
        std::fs::write(&path, self.script()).expect("Failed to write fake tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake tool executable");
        std::fs::write(dir.join(format!("{file_name}.version")), "3.03\n")
            .expect("Failed to write tool version");
    }
}

/// A full-text index over an isolated attachment library.
#[allow(dead_code)] // Fields used across different integration test crates
pub struct TestLibrary {
    pub workspace: TempWorkspace,
    pub config: FulltextConfig,
    pub fulltext: Fulltext,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TestLibrary {
    pub fn new() -> Self {
        Self::build(&[], |_| {})
    }

    /// Install `tools`, let `configure` adjust the defaults, then open the index.
    pub fn build(tools: &[FakeTool], configure: impl FnOnce(&mut FulltextConfig)) -> Self {
        fulltext_mcp::tracing::init();

        let workspace = TempWorkspace::new();
        let tools_dir = workspace.create_dir("tools");
        #[cfg(unix)]
        for tool in tools {
            tool.install(&tools_dir);
        }
        #[cfg(not(unix))]
        let _ = tools;

        let mut config = FulltextConfig {
            data_dir: workspace.path().join("data"),
            tools_dir: Some(tools_dir),
            ..FulltextConfig::default()
        };
        configure(&mut config);

        let attachments = SqliteAttachments::open_in_memory().expect("Failed to open attachments");
        let fulltext =
            Fulltext::open(&config, Box::new(attachments)).expect("Failed to open full-text index");

        Self {
            workspace,
            config,
            fulltext,
        }
    }

    /// Registers an attachment whose file holds `content`.
    ///
    /// Managed attachments live in the item's storage directory; linked files
    /// live in a separate `files/` directory.
    pub fn add_attachment(
        &self,
        raw_id: i64,
        link_mode: LinkMode,
        mime_type: Option<&str>,
        charset: Option<&str>,
        file_name: &str,
        content: &str,
    ) -> ItemId {
        let id = ItemId::new(raw_id).expect("test ids are positive");
        let path = if link_mode.is_managed() {
            let dir = self.fulltext.layout().create_item_dir(id).expect("Failed to create item dir");
            let path = dir.join(file_name);
            std::fs::write(&path, content).expect("Failed to write attachment");
            path
        } else {
            self.workspace.create_file(&format!("files/{file_name}"), content)
        };

        self.fulltext
            .attachments()
            .register(&Attachment {
                id,
                link_mode,
                mime_type: mime_type.map(str::to_string),
                charset: charset.map(str::to_string),
                path: Some(path),
            })
            .expect("Failed to register attachment");
        id
    }

    /// Registers a UTF-8 `text/plain` file in managed storage.
    pub fn add_text(&self, raw_id: i64, content: &str) -> ItemId {
        self.add_attachment(
            raw_id,
            LinkMode::ImportedFile,
            Some("text/plain"),
            Some("utf-8"),
            "document.txt",
            content,
        )
    }

    /// Arguments the fake converter was last invoked with.
    pub fn converter_args(&self) -> Option<String> {
        std::fs::read_to_string(self.workspace.path().join("tools/pdftotext.args"))
            .ok()
            .map(|args| args.trim().to_string())
    }
}

impl Default for TestLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a library without PDF tools.
#[allow(dead_code)]
#[fixture]
pub fn library() -> TestLibrary {
    TestLibrary::new()
}

#[allow(dead_code)]
pub fn item(raw: i64) -> ItemId {
    ItemId::new(raw).expect("test ids are positive")
}
