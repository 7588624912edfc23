use std::path::Path;

use anyhow::Result;

use recall_lib::schedule::algorithm::format_interval;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(app: &mut App, path: &Path, grade: u8, format: &OutputFormat, use_color: bool) -> Result<()> {
    let record = app.review(path, grade)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        OutputFormat::Paths => {
            println!("{}", app.note_file(&record.note_path).display());
        }
        OutputFormat::Plain => {
            let interval = record
                .last_reviewed
                .map(|at| (record.due_date - at).num_days())
                .unwrap_or(0);
            let color = if grade >= 3 { Color::GREEN } else { Color::YELLOW };

            println!("{} {}",
                terminal::paint(&format!("Reviewed (grade {})", grade), color, use_color),
                record.note_path);
            println!("  Next review: {} (in {})",
                terminal::local_date(&record.due_date),
                format_interval(interval));
            println!("  Ease {:.2}, streak {}, {} reviews",
                record.easiness, record.consecutive_correct, record.total_reviews);
        }
    }

    Ok(())
}
