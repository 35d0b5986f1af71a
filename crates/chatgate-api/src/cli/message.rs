//! `chatgate messages`: print the sent-message log.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use chatgate_core::repository::message::MessageLog;
use chatgate_types::message::MessageRecord;

use crate::state::AppState;

/// Longest text shown in a table cell before truncation.
const TEXT_PREVIEW_CHARS: usize = 40;

pub async fn list_messages(state: &AppState, limit: Option<usize>, json: bool) -> Result<()> {
    let mut records = state.dispatcher.log().list_all().await?;
    if let Some(limit) = limit {
        let skip = records.len().saturating_sub(limit);
        records = records.split_off(skip);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!("  {} No messages sent yet.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!("{}", render_table(&records));
    Ok(())
}

fn render_table(records: &[MessageRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Sent").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("To").fg(Color::White),
        Cell::new("Text").fg(Color::White),
        Cell::new("Media").fg(Color::White),
    ]);

    for record in records {
        let from = if record.name.is_empty() {
            record.phone.clone()
        } else {
            format!("{} ({})", record.name, record.phone)
        };
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(&record.timestamp).fg(Color::DarkGrey),
            Cell::new(from),
            Cell::new(&record.receiver).fg(Color::Cyan),
            Cell::new(preview(&record.text)),
            Cell::new(&record.link),
        ]);
    }
    table
}

fn preview(text: &str) -> String {
    if text.chars().count() > TEXT_PREVIEW_CHARS {
        let cut: String = text.chars().take(TEXT_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(50);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), TEXT_PREVIEW_CHARS);
    }

    #[test]
    fn table_lists_every_record() {
        let record = MessageRecord {
            id: 7,
            phone: "5511999990000@s.whatsapp.net".into(),
            name: "Desk".into(),
            receiver: "5534999990000@s.whatsapp.net".into(),
            text: "hello".into(),
            link: String::new(),
            timestamp: "01/02/2026, 10:00:00".into(),
        };
        let rendered = render_table(&[record]).to_string();
        assert!(rendered.contains("Desk (5511999990000@s.whatsapp.net)"));
        assert!(rendered.contains("5534999990000@s.whatsapp.net"));
    }
}
