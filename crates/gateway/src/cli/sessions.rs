//! `supervisor sessions`: list persisted session histories.

use sv_domain::config::Config;
use sv_sessions::JsonlHistoryFactory;

pub fn list(config: &Config) -> anyhow::Result<()> {
    let root = &config.sessions.storage_root;
    let ids = JsonlHistoryFactory::list_session_ids(root)
        .map_err(|e| anyhow::anyhow!("listing {}: {e}", root.display()))?;

    if ids.is_empty() {
        eprintln!("no sessions under {}", root.display());
        return Ok(());
    }
    for id in &ids {
        println!("{id}");
    }
    eprintln!("{} session(s) under {}", ids.len(), root.display());
    Ok(())
}
