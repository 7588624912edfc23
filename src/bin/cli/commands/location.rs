use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let layout = app.layout();
    let state = app.cache_state()?;
    let db_path = app.scheduler.db_path().map(|p| p.to_path_buf());

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "context": app.scheduler.context(),
                "contextDir": layout.context_dir,
                "corpusDir": layout.corpus_dir,
                "corpusRootFound": layout.corpus_root_found,
                "storeDir": layout.store_dir,
                "storeFile": db_path,
                "cacheState": state,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Paths => {
            if let Some(path) = db_path {
                println!("{}", path.display());
            }
        }
        OutputFormat::Plain => {
            let root_note = if layout.corpus_root_found { "" } else { " (no corpus root found)" };
            println!("Context:    {}", app.scheduler.context());
            println!("Corpus:     {}{}", layout.corpus_dir.display(), root_note);
            println!("Store dir:  {}", layout.store_dir.display());
            if let Some(path) = db_path {
                println!("Store file: {}", path.display());
            }
            println!("Cache:      {:?}", state);
        }
    }

    Ok(())
}
