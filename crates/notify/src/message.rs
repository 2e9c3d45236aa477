//! Account summary construction and plain-text rendering.
//!
//! Every channel carries the same logical content: this run's state-change
//! lines plus this run's verification-result lines, rendered as a
//! monospace table. Channel modules only differ in transport framing.

use std::collections::BTreeMap;

use lightsout_core::ResourceKind;

// ── Lines ───────────────────────────────────────────────────────────

/// One applied state change.
#[derive(Debug, Clone)]
pub struct ChangeLine {
    pub action: ChangeAction,
    pub kind: ResourceKind,
    pub resource_id: String,
    /// Resize target, rendered into the details column.
    pub details: Option<String>,
    /// `key=value` pairs for the configured extra tag keys.
    pub tag_summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Start,
    Stop,
    Scale,
}

impl ChangeAction {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeAction::Start => "🟢 Start",
            ChangeAction::Stop => "🔴 Stop",
            ChangeAction::Scale => "⚙️ Scale",
        }
    }
}

/// One verification outcome line.
#[derive(Debug, Clone)]
pub struct VerificationLine {
    pub status: VerificationGlyph,
    pub kind: ResourceKind,
    pub resource_id: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationGlyph {
    Completed,
    InProgress,
    Error,
}

impl VerificationGlyph {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationGlyph::Completed => "✅ Done",
            VerificationGlyph::InProgress => "⏳ In progress",
            VerificationGlyph::Error => "❌ Mismatch",
        }
    }
}

// ── Batch ───────────────────────────────────────────────────────────

/// Per-account aggregation handed to each channel.
#[derive(Debug, Clone)]
pub struct AccountBatch {
    /// Account description when configured, else the account id.
    pub title: String,
    pub account_id: String,
    pub region: String,
    /// Local timestamp text, already formatted for display.
    pub time_text: String,
    pub changes: Vec<ChangeLine>,
    pub verifications: Vec<VerificationLine>,
    pub errors: Vec<String>,
}

impl AccountBatch {
    /// A batch with no change lines and no verification lines is never sent.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.verifications.is_empty()
    }
}

/// Collect `key=value` pairs for the configured extra tag keys.
pub fn extract_tag_summary(tags: &BTreeMap<String, String>, keys: &[String]) -> String {
    keys.iter()
        .filter_map(|key| {
            let value = tags.get(key)?.trim();
            if value.is_empty() {
                None
            } else {
                Some(format!("{key}={value}"))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Table rendering ─────────────────────────────────────────────────

/// Display width: double for non-ASCII so glyph columns line up in
/// monospace clients.
fn display_width(text: &str) -> usize {
    text.chars().map(|c| if (c as u32) < 128 { 1 } else { 2 }).sum()
}

fn pad_cell(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(display_width(text));
    format!("{text}{}", " ".repeat(pad))
}

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let line = |values: &[String]| {
        let cells: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(idx, value)| pad_cell(value, widths[idx]))
            .collect();
        format!("| {} |", cells.join(" | "))
    };
    let border = || {
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        format!("+-{}-+", dashes.join("-+-"))
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![border(), line(&header_cells), border()];
    for row in rows {
        lines.push(line(row));
    }
    lines.push(border());
    lines
}

pub fn change_extra(change: &ChangeLine) -> String {
    let mut parts = Vec::new();
    if let Some(details) = change.details.as_deref().filter(|d| !d.is_empty()) {
        parts.push(details.to_string());
    }
    if !change.tag_summary.is_empty() {
        parts.push(change.tag_summary.clone());
    }
    parts.join("; ")
}

pub fn change_rows(changes: &[ChangeLine]) -> Vec<Vec<String>> {
    changes
        .iter()
        .map(|change| {
            vec![
                change.action.label().to_string(),
                change.kind.label().to_string(),
                change.resource_id.clone(),
                change_extra(change),
            ]
        })
        .collect()
}

pub fn verification_rows(lines: &[VerificationLine]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| {
            vec![
                line.status.label().to_string(),
                line.kind.label().to_string(),
                line.resource_id.clone(),
                line.action.clone(),
            ]
        })
        .collect()
}

// ── Message bodies ──────────────────────────────────────────────────

/// Plain-text body used by Teams and as the Slack fallback text.
pub fn build_text_message(batch: &AccountBatch) -> String {
    let mut lines = vec![
        format!("[Scheduler] {}", batch.title),
        format!("Time: {}", batch.time_text),
        format!("Account: {} | Region: {}", batch.account_id, batch.region),
        format!("Changes ({}):", batch.changes.len()),
    ];
    if !batch.changes.is_empty() {
        lines.push("```".to_string());
        lines.extend(render_table(
            &["Action", "Type", "Id", "Tags/Details"],
            &change_rows(&batch.changes),
        ));
        lines.push("```".to_string());
    }
    if !batch.verifications.is_empty() {
        lines.push(format!("Verification ({}):", batch.verifications.len()));
        lines.push("```".to_string());
        lines.extend(render_table(
            &["Status", "Type", "Id", "Action"],
            &verification_rows(&batch.verifications),
        ));
        lines.push("```".to_string());
    }
    if !batch.errors.is_empty() {
        lines.push(format!("Errors ({}):", batch.errors.len()));
        for error in &batch.errors {
            lines.push(format!("- {error}"));
        }
    }
    lines.join("\n")
}

/// Escape `&`, `<`, `>` for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// HTML body for Telegram, tables wrapped in `<pre>`.
pub fn build_telegram_html(batch: &AccountBatch) -> String {
    let mut lines = vec![
        format!("<b>[Scheduler] {}</b>", escape_html(&batch.title)),
        format!("Time: {}", escape_html(&batch.time_text)),
        format!(
            "Account: {} | Region: {}",
            escape_html(&batch.account_id),
            escape_html(&batch.region)
        ),
        format!("Changes ({}):", batch.changes.len()),
    ];
    if !batch.changes.is_empty() {
        let table = render_table(
            &["Action", "Type", "Id", "Tags/Details"],
            &change_rows(&batch.changes),
        )
        .join("\n");
        lines.push("<pre>".to_string());
        lines.push(escape_html(&table));
        lines.push("</pre>".to_string());
    }
    if !batch.verifications.is_empty() {
        lines.push(format!("Verification ({}):", batch.verifications.len()));
        let table = render_table(
            &["Status", "Type", "Id", "Action"],
            &verification_rows(&batch.verifications),
        )
        .join("\n");
        lines.push("<pre>".to_string());
        lines.push(escape_html(&table));
        lines.push("</pre>".to_string());
    }
    if !batch.errors.is_empty() {
        lines.push(format!("Errors ({}):", batch.errors.len()));
        for error in &batch.errors {
            lines.push(format!("- {}", escape_html(error)));
        }
    }
    lines.join("\n")
}

/// Block Kit payload for Slack, with the plain text as fallback.
///
/// Above 20 changes the per-change field sections collapse into one
/// compact list block to stay under Slack's block limit.
pub fn build_slack_payload(batch: &AccountBatch) -> serde_json::Value {
    use serde_json::json;

    let text_fallback = build_text_message(batch);

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": format!("Scheduler | {}", batch.title)}
        }),
        json!({
            "type": "context",
            "elements": [
                {"type": "mrkdwn", "text": format!("*Time:* {}", batch.time_text)},
                {"type": "mrkdwn", "text": format!("*Account:* {} | *Region:* {}", batch.account_id, batch.region)},
            ]
        }),
        json!({"type": "divider"}),
        json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Changes ({}):*", batch.changes.len())}
        }),
    ];

    if batch.changes.len() > 20 {
        let lines: Vec<String> = batch
            .changes
            .iter()
            .map(|change| {
                let extra = change_extra(change);
                let mut line = format!(
                    "- {} {} `{}`",
                    change.action.label(),
                    change.kind.label(),
                    change.resource_id
                );
                if !extra.is_empty() {
                    line.push_str(&format!(" - {extra}"));
                }
                line
            })
            .collect();
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": lines.join("\n")}
        }));
    } else {
        for (idx, change) in batch.changes.iter().enumerate() {
            let extra = change_extra(change);
            blocks.push(json!({
                "type": "section",
                "fields": [
                    {"type": "mrkdwn", "text": format!("*Action*\n{}", change.action.label())},
                    {"type": "mrkdwn", "text": format!("*Type*\n{}", change.kind.label())},
                    {"type": "mrkdwn", "text": format!("*Id*\n`{}`", change.resource_id)},
                    {"type": "mrkdwn", "text": format!("*Tags/Details*\n{}", if extra.is_empty() { "-".to_string() } else { extra })},
                ]
            }));
            if idx != batch.changes.len() - 1 {
                blocks.push(json!({"type": "divider"}));
            }
        }
    }

    if !batch.verifications.is_empty() {
        blocks.push(json!({"type": "divider"}));
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Verification ({}):*", batch.verifications.len())}
        }));
        let lines: Vec<String> = batch
            .verifications
            .iter()
            .map(|line| {
                format!(
                    "- {} {} `{}` {}",
                    line.status.label(),
                    line.kind.label(),
                    line.resource_id,
                    line.action
                )
            })
            .collect();
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": lines.join("\n")}
        }));
    }

    if !batch.errors.is_empty() {
        blocks.push(json!({"type": "divider"}));
        let lines: Vec<String> = batch.errors.iter().map(|e| format!("- {e}")).collect();
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Errors ({}):*\n{}", batch.errors.len(), lines.join("\n"))}
        }));
    }

    json!({"text": text_fallback, "blocks": blocks})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(action: ChangeAction, id: &str) -> ChangeLine {
        ChangeLine {
            action,
            kind: ResourceKind::Ec2Instance,
            resource_id: id.to_string(),
            details: None,
            tag_summary: String::new(),
        }
    }

    fn batch_with(changes: Vec<ChangeLine>, verifications: Vec<VerificationLine>) -> AccountBatch {
        AccountBatch {
            title: "staging".to_string(),
            account_id: "111122223333".to_string(),
            region: "ap-northeast-2".to_string(),
            time_text: "2025-06-04 10:00 KST".to_string(),
            changes,
            verifications,
            errors: Vec::new(),
        }
    }

    #[test]
    fn empty_batch_is_suppressed_even_with_errors() {
        let mut batch = batch_with(Vec::new(), Vec::new());
        assert!(batch.is_empty());
        batch.errors.push("enumeration failed".to_string());
        assert!(batch.is_empty());
        batch.changes.push(change(ChangeAction::Start, "i-0abc"));
        assert!(!batch.is_empty());
    }

    #[test]
    fn tag_summary_skips_missing_and_blank_values() {
        let mut tags = BTreeMap::new();
        tags.insert("Team".to_string(), "platform".to_string());
        tags.insert("Owner".to_string(), "  ".to_string());
        let keys = vec!["Team".to_string(), "Owner".to_string(), "Env".to_string()];
        assert_eq!(extract_tag_summary(&tags, &keys), "Team=platform");
        assert_eq!(extract_tag_summary(&tags, &[]), "");
    }

    #[test]
    fn table_pads_to_widest_cell() {
        let rows = vec![
            vec!["start".to_string(), "i-0123456789".to_string()],
            vec!["stop".to_string(), "i-1".to_string()],
        ];
        let lines = render_table(&["Action", "Id"], &rows);
        assert_eq!(lines.len(), 6);
        // Every content line has the same display width.
        let widths: Vec<usize> = lines.iter().map(|l| display_width(l)).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
        assert!(lines[1].contains("Action"));
        assert!(lines[3].contains("i-0123456789"));
    }

    #[test]
    fn table_counts_glyphs_as_double_width() {
        let rows = vec![
            vec!["🟢 Start".to_string(), "i-1".to_string()],
            vec!["plain".to_string(), "i-2".to_string()],
        ];
        let lines = render_table(&["Action", "Id"], &rows);
        let widths: Vec<usize> = lines.iter().map(|l| display_width(l)).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
    }

    #[test]
    fn text_message_includes_tables_and_counts() {
        let mut batch = batch_with(
            vec![change(ChangeAction::Start, "i-0abc")],
            vec![VerificationLine {
                status: VerificationGlyph::Error,
                kind: ResourceKind::ScalingGroup,
                resource_id: "web-asg".to_string(),
                action: "scale".to_string(),
            }],
        );
        batch.errors.push("RDS-Instance enumeration failed".to_string());
        let text = build_text_message(&batch);
        assert!(text.contains("[Scheduler] staging"));
        assert!(text.contains("Changes (1):"));
        assert!(text.contains("i-0abc"));
        assert!(text.contains("Verification (1):"));
        assert!(text.contains("❌ Mismatch"));
        assert!(text.contains("Errors (1):"));
    }

    #[test]
    fn telegram_html_escapes_entities() {
        let mut batch = batch_with(vec![change(ChangeAction::Stop, "i-0abc")], Vec::new());
        batch.title = "dev <primary> & co".to_string();
        let html = build_telegram_html(&batch);
        assert!(html.contains("dev &lt;primary&gt; &amp; co"));
        assert!(html.contains("<pre>"));
        assert!(!html.contains("<primary>"));
    }

    #[test]
    fn slack_payload_uses_fields_below_threshold() {
        let batch = batch_with(vec![change(ChangeAction::Start, "i-0abc")], Vec::new());
        let payload = build_slack_payload(&batch);
        let blocks = payload["blocks"].as_array().unwrap();
        assert!(blocks.iter().any(|b| b["fields"].is_array()));
        assert!(payload["text"].as_str().unwrap().contains("i-0abc"));
    }

    #[test]
    fn slack_payload_collapses_above_threshold() {
        let changes: Vec<ChangeLine> = (0..25)
            .map(|i| change(ChangeAction::Stop, &format!("i-{i:04}")))
            .collect();
        let batch = batch_with(changes, Vec::new());
        let payload = build_slack_payload(&batch);
        let blocks = payload["blocks"].as_array().unwrap();
        assert!(blocks.iter().all(|b| !b["fields"].is_array()));
        let list_block = blocks
            .iter()
            .find(|b| {
                b["text"]["text"]
                    .as_str()
                    .is_some_and(|t| t.contains("i-0024"))
            })
            .unwrap();
        assert!(list_block["text"]["text"].as_str().unwrap().contains("i-0000"));
    }

    #[test]
    fn escape_html_passthrough() {
        assert_eq!(escape_html("plain text"), "plain text");
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}
