use anyhow::{Context, Result};
use clap::Args;

use crate::app::App;
use crate::repository::{FileSystemRepository, NoteRepository};

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Only scan this category
    #[arg()]
    pub category: Option<String>,
    /// Also print note titles in display order
    #[arg(long)]
    pub titles: bool,
}

pub fn run_kiosk(app: &mut App) -> Result<()> {
    app.run()
}

pub fn scan_notes(mut repository: FileSystemRepository, args: ScanArgs) -> Result<()> {
    let discovered = repository
        .discover_notes()
        .with_context(|| format!("scanning notes under {}", repository.storage_path().display()))?;

    let mut printed = 0usize;
    for discovery in &discovered {
        if let Some(wanted) = &args.category {
            if &discovery.category != wanted {
                continue;
            }
        }
        printed += 1;
        let plural = if discovery.notes.len() == 1 { "" } else { "s" };
        println!(
            "{}: {} note{plural}",
            discovery.category,
            discovery.notes.len()
        );
        if args.titles {
            for index in 0..discovery.notes.len() {
                match repository.get_note(&discovery.category, index) {
                    Ok(note) => println!("  [{index}] {}", note.title),
                    Err(err) => {
                        tracing::warn!(?err, category = %discovery.category, index, "skipping note");
                    }
                }
            }
        }
    }

    if let Some(wanted) = &args.category {
        if printed == 0 {
            anyhow::bail!("no category named '{wanted}' found");
        }
    }
    Ok(())
}
