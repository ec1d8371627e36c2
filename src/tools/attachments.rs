//! Attachment registration handler.

use crate::attachment::{Attachment, LinkMode};
use crate::fulltext::Fulltext;
use crate::server::expand_tilde;
use rmcp::schemars;
use serde::Deserialize;
use std::path::PathBuf;

/// How the attachment's content is stored.
#[derive(Debug, Clone, Copy, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkModeParam {
    /// File copied into managed storage
    ImportedFile,
    /// Web snapshot saved into managed storage
    ImportedUrl,
    /// File left in place on disk
    LinkedFile,
    /// Bare URL reference without a file
    LinkedUrl,
}

impl From<LinkModeParam> for LinkMode {
    fn from(param: LinkModeParam) -> Self {
        match param {
            LinkModeParam::ImportedFile => Self::ImportedFile,
            LinkModeParam::ImportedUrl => Self::ImportedUrl,
            LinkModeParam::LinkedFile => Self::LinkedFile,
            LinkModeParam::LinkedUrl => Self::LinkedUrl,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterAttachmentRequest {
    /// Positive item id
    pub item_id: i64,
    pub link_mode: LinkModeParam,
    /// MIME type, e.g. "application/pdf" or "text/html"
    pub mime_type: Option<String>,
    /// Charset of text files, e.g. "utf-8"
    pub charset: Option<String>,
    /// Path to the attachment file (supports ~ expansion)
    pub path: Option<String>,
}

/// Insert or replace an attachment record.
pub fn handle_register_attachment(
    fulltext: &Fulltext,
    request: RegisterAttachmentRequest,
) -> Result<String, String> {
    let id = super::parse_item_id(request.item_id)?;
    let attachment = Attachment {
        id,
        link_mode: request.link_mode.into(),
        mime_type: request.mime_type,
        charset: request.charset,
        path: request
            .path
            .as_deref()
            .map(|p| PathBuf::from(expand_tilde(p).as_ref())),
    };

    fulltext
        .attachments()
        .register(&attachment)
        .map_err(|e| format!("Failed to register attachment {}: {}", id, e))?;

    Ok(format!(
        "Registered attachment {} ({:?}{})",
        id,
        attachment.link_mode,
        attachment
            .path
            .as_ref()
            .map(|p| format!(", {}", p.display()))
            .unwrap_or_default()
    ))
}
