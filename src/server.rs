//! MCP server exposing the full-text index over stdio.

use crate::fulltext::Fulltext;
use crate::tools::{
    ClearIndexRequest, FindTextRequest, IndexItemsRequest, IndexStateRequest,
    RebuildIndexRequest, RegisterAttachmentRequest, handle_clear_index, handle_find_text,
    handle_index_items, handle_index_state, handle_index_stats, handle_purge_unused_words,
    handle_rebuild_index, handle_register_attachment,
};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars::{self, JsonSchema, generate::SchemaSettings},
    tool, tool_handler, tool_router,
};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

/// MCP server for attachment full-text indexing and search.
///
/// The index is single-writer: every call takes the lock and runs its
/// blocking database and process work on the blocking thread pool.
#[derive(Clone)]
pub struct FulltextServer {
    fulltext: Arc<Mutex<Fulltext>>,

    /// Tool router for handling MCP tool calls
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for FulltextServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulltextServer").finish_non_exhaustive()
    }
}

impl FulltextServer {
    async fn run<F>(&self, handler: F) -> std::result::Result<String, String>
    where
        F: FnOnce(&Fulltext) -> std::result::Result<String, String> + Send + 'static,
    {
        let fulltext = Arc::clone(&self.fulltext);
        tokio::task::spawn_blocking(move || {
            let guard = fulltext.lock().map_err(|_poisoned| {
                tracing::error!("Full-text index state corrupted by an earlier panic");
                "Full-text index is unavailable".to_string()
            })?;
            handler(&guard)
        })
        .await
        .map_err(|e| format!("Tool task failed: {}", e))?
    }
}

#[tool_router]
impl FulltextServer {
    pub fn new(fulltext: Fulltext) -> Self {
        Self {
            fulltext: Arc::new(Mutex::new(fulltext)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Register or update an attachment: its id, how it is stored (link mode), MIME type, charset and file path. Attachments must be registered before they can be indexed or searched.",
        input_schema = inline_schema_for_type::<RegisterAttachmentRequest>()
    )]
    async fn register_attachment(
        &self,
        Parameters(request): Parameters<RegisterAttachmentRequest>,
    ) -> std::result::Result<String, String> {
        self.run(move |fulltext| handle_register_attachment(fulltext, request))
            .await
    }

    #[tool(
        description = "Extract and index the text of attachments. PDFs are converted with pdftotext when available. By default stops at the configured text length and page limits; set complete to index whole documents."
    )]
    async fn index_items(
        &self,
        Parameters(request): Parameters<IndexItemsRequest>,
    ) -> std::result::Result<String, String> {
        self.run(move |fulltext| handle_index_items(fulltext, request))
            .await
    }

    #[tool(
        description = "Show an attachment's indexing state (unavailable, unindexed, partial or indexed) with its page and character counters."
    )]
    async fn index_state(
        &self,
        Parameters(request): Parameters<IndexStateRequest>,
    ) -> std::result::Result<String, String> {
        self.run(move |fulltext| handle_index_state(fulltext, request))
            .await
    }

    #[tool(
        description = "Count fully indexed, partially indexed and unindexed attachments, and the number of distinct words in the index."
    )]
    async fn index_stats(&self) -> std::result::Result<String, String> {
        self.run(handle_index_stats).await
    }

    #[tool(
        description = "Search the extracted text of attachments for a phrase or regular expression. Returns a short excerpt from each matching attachment, in the order given."
    )]
    async fn find_text(
        &self,
        Parameters(request): Parameters<FindTextRequest>,
    ) -> std::result::Result<String, String> {
        self.run(move |fulltext| handle_find_text(fulltext, request))
            .await
    }

    #[tool(
        description = "Drop and rebuild the index of every attachment that has a file. Individual failures are reported without stopping the rebuild."
    )]
    async fn rebuild_index(
        &self,
        Parameters(request): Parameters<RebuildIndexRequest>,
    ) -> std::result::Result<String, String> {
        self.run(move |fulltext| handle_rebuild_index(fulltext, request))
            .await
    }

    #[tool(
        description = "Clear the word index and delete all extracted-text cache files."
    )]
    async fn clear_index(
        &self,
        Parameters(request): Parameters<ClearIndexRequest>,
    ) -> std::result::Result<String, String> {
        self.run(move |fulltext| handle_clear_index(fulltext, request))
            .await
    }

    #[tool(
        description = "Delete words that no attachment references anymore. Does nothing if no index entries were removed since the last purge."
    )]
    async fn purge_unused_words(&self) -> std::result::Result<String, String> {
        self.run(handle_purge_unused_words).await
    }
}

#[tool_handler]
impl ServerHandler for FulltextServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::V_2024_11_05)
            .with_server_info(Implementation::from_build_env())
            .with_instructions(
                "fulltext-mcp: full-text indexing and search for document attachments. \
                 Register attachments with register_attachment, index them with index_items, \
                 then search with find_text. PDF support requires pdftotext/pdfinfo executables \
                 in the tools directory.",
            )
    }
}

/// Expands tilde (`~`) in a path to the user's home directory.
///
/// - `~/foo` becomes `/home/user/foo`
/// - `~` becomes `/home/user`
/// - Other paths are returned unchanged
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped).display().to_string());
        }
    } else if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return Cow::Owned(home.display().to_string());
    }
    Cow::Borrowed(path)
}

/// Generate an inline JSON schema for MCP tools
///
/// Sets `inline_subschemas = true` so enums are emitted inline instead of as
/// `$ref` patterns, which MCP Inspector renders as dropdowns.
pub fn inline_schema_for_type<T: JsonSchema>() -> Arc<JsonObject> {
    let mut settings = SchemaSettings::draft07();
    settings.transforms = vec![Box::new(schemars::transform::AddNullable::default())];
    settings.inline_subschemas = true;

    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();
    let object = serde_json::to_value(schema).expect("failed to serialize schema");

    let json_object = match object {
        serde_json::Value::Object(object) => object,
        _ => panic!("Schema serialization produced non-object value"),
    };

    Arc::new(json_object)
}
