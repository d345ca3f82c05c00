//! `poolside watch` -- poll at the configured cadence and print changes.

use std::collections::HashMap;
use std::time::Duration;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::connect(global).await?;
    let color = output::should_color(&global.color);
    let interval = Duration::from_secs(session.config.poll_interval_secs);

    let mut states: HashMap<String, String> = session
        .entities
        .iter()
        .map(|e| {
            (
                e.unique_id().to_owned(),
                e.state_display().unwrap_or_else(|| "-".to_owned()),
            )
        })
        .collect();

    if !global.quiet {
        eprintln!(
            "watching {} entities every {}s (ctrl-c to stop)",
            session.entities.len(),
            interval.as_secs()
        );
    }

    let mut polls = 0_u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = tokio::time::sleep(interval) => {
                // A tolerated timeout reuses the previous snapshot and is
                // not worth stopping the watch over.
                if let Err(err) = session.coordinator.poll().await {
                    return Err(err.into());
                }

                for entity in &session.entities {
                    let current = entity.state_display().unwrap_or_else(|| "-".to_owned());
                    let known = states.get(entity.unique_id());
                    if known.is_some_and(|k| *k == current) {
                        continue;
                    }
                    output::print_output(
                        &format!(
                            "{} ({}): {} -> {}",
                            entity.name(),
                            entity.unique_id(),
                            known.map_or("-", String::as_str),
                            output::colorize_state(&current, color),
                        ),
                        global.quiet,
                    );
                    states.insert(entity.unique_id().to_owned(), current);
                }

                polls += 1;
                if args.count != 0 && polls >= args.count {
                    break;
                }
            }
        }
    }

    session.coordinator.shutdown().await;
    Ok(())
}
