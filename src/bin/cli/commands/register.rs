use std::path::PathBuf;

use anyhow::Result;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(app: &App, paths: &[PathBuf], format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut results = Vec::new();
    for path in paths {
        results.push((path, app.register(path)?));
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = results.iter().map(|(path, record)| {
                serde_json::json!({
                    "path": path.to_string_lossy(),
                    "registered": record.is_some(),
                    "record": record,
                })
            }).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Paths => {
            for record in results.iter().filter_map(|(_, r)| r.as_ref()) {
                println!("{}", app.note_file(&record.note_path).display());
            }
        }
        OutputFormat::Plain => {
            for (path, record) in &results {
                match record {
                    Some(record) => println!("{} {}",
                        terminal::paint("Tracking", Color::GREEN, use_color),
                        record.note_path),
                    None => println!("{} {}",
                        terminal::paint("Already tracked", Color::DIM, use_color),
                        path.display()),
                }
            }
        }
    }

    Ok(())
}
