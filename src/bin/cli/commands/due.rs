use anyhow::Result;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(app: &mut App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let items = app.due(limit)?;

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = items.iter().map(|item| {
                let r = &item.record;
                serde_json::json!({
                    "notePath": r.note_path,
                    "noteId": r.note_id,
                    "dueDate": r.due_date,
                    "overdue": item.overdue,
                    "daysPast": item.days_past,
                    "easiness": r.easiness,
                    "consecutiveCorrect": r.consecutive_correct,
                    "totalReviews": r.total_reviews,
                })
            }).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Paths => {
            for item in &items {
                println!("{}", app.note_file(&item.record.note_path).display());
            }
        }
        OutputFormat::Plain => {
            if items.is_empty() {
                println!("Nothing due today.");
                return Ok(());
            }

            let path_w = items.iter()
                .map(|i| i.record.note_path.chars().count())
                .max()
                .unwrap_or(4)
                .clamp(4, 50);

            println!("{:<path_w$} {:<10} {:>5} {:>7} {:>5}",
                "Note", "Due", "Late", "Reviews", "Ease",
                path_w = path_w);
            println!("{} {} {} {} {}",
                terminal::rule(path_w),
                terminal::rule(10),
                terminal::rule(5),
                terminal::rule(7),
                terminal::rule(5));

            for item in &items {
                let r = &item.record;
                let late = if item.days_past > 0 {
                    format!("{}d", item.days_past)
                } else {
                    "-".to_string()
                };
                let line = format!("{:<path_w$} {:<10} {:>5} {:>7} {:>5.2}",
                    terminal::truncate(&r.note_path, path_w),
                    terminal::local_date(&r.due_date),
                    late,
                    r.total_reviews,
                    r.easiness,
                    path_w = path_w);

                if item.overdue {
                    println!("{}", terminal::paint(&line, Color::RED, use_color));
                } else {
                    println!("{}", line);
                }
            }

            let overdue = items.iter().filter(|i| i.overdue).count();
            if overdue > 0 {
                println!("\n{} notes due, {} overdue", items.len(), overdue);
            } else {
                println!("\n{} notes due", items.len());
            }
        }
    }

    Ok(())
}
