use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &mut App, format: &OutputFormat) -> Result<()> {
    let stats = app.stats()?;
    let context = app.scheduler.context().to_string();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "context": context,
                "total": stats.total,
                "due": stats.due,
                "archived": stats.archived,
                "meanEasiness": stats.mean_easiness,
                "meanReviews": stats.mean_reviews,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain | OutputFormat::Paths => {
            println!("Context:       {}", context);
            println!("Tracked notes: {}", stats.total);
            println!("Due today:     {}", stats.due);
            if stats.archived > 0 {
                println!("Archived:      {}", stats.archived);
            }
            println!("Mean ease:     {:.2}", stats.mean_easiness);
            println!("Mean reviews:  {:.1}", stats.mean_reviews);
        }
    }

    Ok(())
}
