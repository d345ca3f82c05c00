//! `poolside entities` -- list derived equipment and current values.

use serde::Serialize;
use tabled::Tabled;

use poolside_core::PoolEntity;

use crate::cli::{EntitiesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Serialize, Tabled)]
pub struct EntityRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Unique ID")]
    pub unique_id: String,
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Available")]
    pub available: String,
}

impl From<&PoolEntity> for EntityRow {
    fn from(entity: &PoolEntity) -> Self {
        Self {
            name: entity.name().to_owned(),
            unique_id: entity.unique_id().to_owned(),
            category: entity.category().to_owned(),
            state: entity.state_display().unwrap_or_else(|| "-".to_owned()),
            available: if entity.available() { "yes" } else { "no" }.to_owned(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: EntitiesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::connect(global).await?;

    let rows: Vec<EntityRow> = session
        .entities
        .iter()
        .filter(|e| args.all || e.available())
        .filter(|e| {
            args.category
                .as_deref()
                .is_none_or(|category| e.category().contains(category))
        })
        .map(EntityRow::from)
        .collect();

    let out = output::render_list(&global.output, &rows, |row| row.unique_id.clone());
    output::print_output(&out, global.quiet);

    session.coordinator.shutdown().await;
    Ok(())
}
