//! Markdown rendering of a [`HistorySnapshot`], meant to be handed to a
//! coding assistant so it can pick up a session where it left off.

use crate::document::HistorySnapshot;
use crate::types::{EntryKind, HistoryEntry};
use serde::Serialize;
use std::fmt::Write;

const INTRO: &str = "This document captures a snapshot of a vaporvibe development session. \
It includes the product brief supplied to the language model, each HTTP request the server \
handled, and the full HTML render produced for that step.";

const READING_GUIDE: &str = "The brief describes the app being built. Each step is a \
full-page render triggered by a navigation or form submission. Query and body parameters show \
how the user steered the flow, while HTML blocks contain the exact UI that was returned.";

fn json_block<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn entry_kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Html => "html",
        EntryKind::RestMutation => "rest-mutation",
        EntryKind::RestQuery => "rest-query",
    }
}

fn optional_number(value: Option<u64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |n| n.to_string())
}

/// Render the whole export as Markdown
#[must_use]
pub fn render_prompt_markdown(snapshot: &HistorySnapshot) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_document(&mut out, snapshot);
    out
}

fn write_document(out: &mut String, snapshot: &HistorySnapshot) -> std::fmt::Result {
    writeln!(out, "# vaporvibe Session Export\n")?;
    writeln!(out, "{}\n", INTRO)?;
    writeln!(out, "{}\n", READING_GUIDE)?;

    writeln!(out, "## App Brief")?;
    writeln!(out, "```text")?;
    writeln!(out, "{}", snapshot.brief.as_deref().unwrap_or("(brief not set yet)"))?;
    writeln!(out, "```\n")?;

    if !snapshot.brief_attachments.is_empty() {
        writeln!(out, "## Brief Attachments")?;
        for (index, attachment) in snapshot.brief_attachments.iter().enumerate() {
            writeln!(out, "### Attachment {}: {}", index + 1, attachment.name)?;
            writeln!(out, "- MIME Type: {}", attachment.mime_type)?;
            writeln!(out, "- Size: {} bytes", attachment.size)?;
            writeln!(out, "```base64")?;
            writeln!(out, "{}", attachment.base64.as_deref().unwrap_or_default())?;
            writeln!(out, "```\n")?;
        }
    }

    let llm = &snapshot.llm;
    let runtime = &snapshot.runtime;
    writeln!(out, "## Runtime Configuration")?;
    writeln!(out, "- Provider: {} ({})", llm.provider, llm.model)?;
    writeln!(out, "- Max Output Tokens: {}", llm.max_output_tokens)?;
    writeln!(out, "- Reasoning Mode: {}", llm.reasoning_mode)?;
    writeln!(out, "- Reasoning Tokens Budget: {}", optional_number(llm.reasoning_tokens))?;
    writeln!(out, "- History Limit (prompt context): {}", runtime.history_limit)?;
    writeln!(out, "- History Byte Budget: {}", runtime.history_max_bytes)?;
    writeln!(
        out,
        "- Instruction Panel Enabled: {}",
        yes_no(runtime.include_instruction_panel)
    )?;
    let images = &runtime.image_generation;
    writeln!(
        out,
        "- Image Generation: {}",
        if images.enabled { "enabled" } else { "disabled" }
    )?;
    writeln!(out, "- Image Provider: {}", images.provider)?;
    writeln!(out, "- Image Model: {}\n", images.model_id)?;

    for (index, entry) in snapshot.history.iter().enumerate() {
        write_step(out, index + 1, entry)?;
    }

    if snapshot.history.is_empty() {
        writeln!(out, "## History")?;
        writeln!(out, "No pages have been generated yet.\n")?;
    }
    Ok(())
}

fn write_step(out: &mut String, step: usize, entry: &HistoryEntry) -> std::fmt::Result {
    writeln!(
        out,
        "## Step {} - {} {}",
        step, entry.request.method, entry.request.path
    )?;
    writeln!(out, "- Timestamp: {}", entry.created_at.to_rfc3339())?;
    writeln!(out, "- Session: {}", entry.session_id)?;
    writeln!(out, "- Duration: {} ms", entry.duration_ms)?;
    match &entry.llm {
        Some(llm) => {
            writeln!(out, "- Reasoning Mode: {}", llm.reasoning_mode)?;
            writeln!(
                out,
                "- Reasoning Tokens Budget: {}",
                optional_number(llm.reasoning_tokens)
            )?;
        }
        None => {
            writeln!(out, "- Reasoning Mode: n/a")?;
            writeln!(out, "- Reasoning Tokens Budget: n/a")?;
        }
    }
    if let Some(instructions) = entry.request.instructions.as_deref().filter(|i| !i.is_empty()) {
        writeln!(out, "- Instructions Provided: {}", instructions)?;
    }
    if let Some(info) = &entry.fork_info {
        writeln!(out, "- Fork Branch: {} ({:?})", info.label, info.status)?;
    }
    writeln!(out, "- Entry Type: {}", entry_kind_name(entry.entry_kind))?;
    writeln!(out, "- Query Parameters:\n```json\n{}\n```", json_block(&entry.request.query))?;
    writeln!(out, "- Body Parameters:\n```json\n{}\n```", json_block(&entry.request.body))?;

    if entry.is_html() {
        if !entry.rest_mutations.is_empty() {
            writeln!(out, "- REST Mutations:")?;
            for mutation in &entry.rest_mutations {
                writeln!(
                    out,
                    "  - {} {} @ {}",
                    mutation.method,
                    mutation.path,
                    mutation.created_at.to_rfc3339()
                )?;
                writeln!(out, "    - Query:\n    ```json\n{}\n    ```", json_block(&mutation.query))?;
                writeln!(out, "    - Body:\n    ```json\n{}\n    ```", json_block(&mutation.body))?;
            }
        }
        if !entry.rest_queries.is_empty() {
            writeln!(out, "- REST Queries:")?;
            for query in &entry.rest_queries {
                writeln!(
                    out,
                    "  - {} {} @ {} ({})",
                    query.method,
                    query.path,
                    query.created_at.to_rfc3339(),
                    if query.ok { "ok" } else { "error" }
                )?;
                writeln!(out, "    - Query:\n    ```json\n{}\n    ```", json_block(&query.query))?;
                writeln!(out, "    - Body:\n    ```json\n{}\n    ```", json_block(&query.body))?;
                let label = if query.ok { "Response" } else { "Error Response" };
                writeln!(
                    out,
                    "    - {}:\n    ```json\n{}\n    ```",
                    label,
                    json_block(&query.response)
                )?;
                if let Some(error) = &query.error {
                    writeln!(out, "    - Error Message: {}", error)?;
                }
            }
        }
    } else if let Some(rest) = &entry.rest {
        writeln!(out, "- REST Request:\n```json\n{}\n```", json_block(&rest.request))?;
        if let Some(response) = &rest.response {
            writeln!(out, "- REST Response:\n```json\n{}\n```", json_block(response))?;
        }
        if let Some(error) = &rest.error {
            writeln!(out, "- Error: {}", error)?;
        }
    }

    for (index, attachment) in entry.brief_attachments.iter().enumerate() {
        writeln!(
            out,
            "- Brief Attachment {}: {} ({}, {} bytes)",
            index + 1,
            attachment.name,
            attachment.mime_type,
            attachment.size
        )?;
        writeln!(
            out,
            "```base64\n{}\n```",
            attachment.base64.as_deref().unwrap_or_default()
        )?;
    }

    writeln!(out, "- Generated HTML:\n```html\n{}\n```\n", entry.response.html)
}
