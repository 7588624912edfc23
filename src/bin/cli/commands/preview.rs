use std::path::Path;

use anyhow::Result;
use chrono::{Duration, Utc};

use recall_lib::schedule::algorithm::format_interval;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

const GRADE_LABELS: [&str; 6] = ["blackout", "wrong", "hard miss", "hard", "good", "easy"];

pub fn run(app: &mut App, path: &Path, format: &OutputFormat, use_color: bool) -> Result<()> {
    let (record, intervals) = app.preview(path)?;
    let now = Utc::now();

    match format {
        OutputFormat::Json => {
            let grades: Vec<serde_json::Value> = intervals.iter().enumerate().map(|(grade, days)| {
                serde_json::json!({
                    "grade": grade,
                    "intervalDays": days,
                    "dueDate": now + Duration::days(*days),
                })
            }).collect();
            let output = serde_json::json!({
                "record": record,
                "grades": grades,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Paths => {
            println!("{}", app.note_file(&record.note_path).display());
        }
        OutputFormat::Plain => {
            println!("{}", terminal::paint(&record.note_path, Color::BOLD, use_color));
            println!("Ease {:.2}, streak {}, {} reviews, due {}\n",
                record.easiness, record.consecutive_correct, record.total_reviews,
                terminal::local_date(&record.due_date));

            println!("{:<5} {:<10} {:>8} {:<10}", "Grade", "", "Interval", "Next due");
            println!("{} {} {} {}",
                terminal::rule(5), terminal::rule(10), terminal::rule(8), terminal::rule(10));

            for (grade, days) in intervals.iter().enumerate() {
                println!("{:<5} {:<10} {:>8} {:<10}",
                    grade,
                    GRADE_LABELS[grade],
                    format_interval(*days),
                    terminal::local_date(&(now + Duration::days(*days))));
            }
        }
    }

    Ok(())
}
