use anyhow::Result;

use recall_lib::cache::Validation;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &mut App, force: bool, format: &OutputFormat) -> Result<()> {
    let validation = app.sync(force)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&validation)?);
        }
        OutputFormat::Plain | OutputFormat::Paths => match validation {
            Validation::Valid => println!("Schedule is up to date."),
            Validation::Reconciled(report) => {
                println!("Scanned {} notes", report.scanned);
                println!("  {} adopted, {} removed, {} archived, {} restored",
                    report.adopted, report.removed, report.archived, report.restored);
            }
        },
    }

    Ok(())
}
