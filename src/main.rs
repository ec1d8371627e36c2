use anyhow::Context;
use fulltext_mcp::{Fulltext, FulltextConfig, FulltextServer, SqliteAttachments};
use rmcp::{ServiceExt, transport::stdio};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the MCP protocol
    fulltext_mcp::tracing::init();

    let config = FulltextConfig::load(FulltextConfig::locate().as_deref())?;
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    let attachments = SqliteAttachments::open(&config.data_dir.join("attachments.sqlite"))
        .context("Failed to open attachment store")?;
    let fulltext = Fulltext::open(&config, Box::new(attachments))
        .context("Failed to open full-text index")?;

    tracing::info!(data_dir = %config.data_dir.display(), "Starting fulltext-mcp MCP server");

    let server = FulltextServer::new(fulltext);
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("Error serving MCP server: {:?}", e);
    })?;

    service.waiting().await?;

    Ok(())
}
