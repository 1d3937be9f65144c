//! Persona store: loads the system-prompt document once at startup.
//!
//! The persona lives in a tag-annotated XML file; flattening collects every
//! text-bearing node in document order. If the load fails the engine runs
//! permanently disabled — there is no retry and no default persona.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::path::Path;
use tracing::info;

use banter_core::{BanterError, Result};

/// Load and flatten the persona document.
pub fn load(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        BanterError::Persona(format!("failed to read {}: {e}", path.display()))
    })?;
    let text = flatten(&raw)?;
    info!(path = %path.display(), chars = text.len(), "persona document loaded");
    Ok(text)
}

/// Flatten an XML document to its text content: every non-empty text node
/// in document order, trimmed, joined with newlines.
pub fn flatten(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut parts: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(node)) => {
                let text = node
                    .xml_content()
                    .map_err(|e| BanterError::Persona(format!("bad text node: {e}")))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Ok(Event::CData(node)) => {
                let text = String::from_utf8_lossy(&node);
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(BanterError::Persona(format!(
                    "parse error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if parts.is_empty() {
        return Err(BanterError::Persona(
            "document contains no text nodes".into(),
        ));
    }

    Ok(parts.join("\n"))
}
