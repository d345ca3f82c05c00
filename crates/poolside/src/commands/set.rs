//! `poolside set` -- send equipment commands.

use poolside_core::PoolEntity;
use poolside_core::entity::LightEffect;

use crate::cli::{GlobalOpts, OnOff, SetArgs, SetCommand};
use crate::error::CliError;

use super::util;

pub async fn handle(args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::connect(global).await?;

    let unique_id = target_id(&args.command).to_owned();
    let entity = session
        .entities
        .into_iter()
        .find(|e| e.unique_id() == unique_id)
        .ok_or_else(|| CliError::EntityNotFound {
            unique_id: unique_id.clone(),
        })?;

    let confirmation = apply(args.command, entity).await?;
    if !global.quiet {
        eprintln!("{confirmation}");
    }

    session.coordinator.shutdown().await;
    Ok(())
}

fn target_id(command: &SetCommand) -> &str {
    match command {
        SetCommand::Switch { unique_id, .. }
        | SetCommand::Speed { unique_id, .. }
        | SetCommand::Heater { unique_id, .. }
        | SetCommand::Light { unique_id, .. }
        | SetCommand::Chlorinator { unique_id, .. }
        | SetCommand::Superchlorinate { unique_id, .. } => unique_id,
    }
}

async fn apply(command: SetCommand, entity: PoolEntity) -> Result<String, CliError> {
    match (command, entity) {
        (SetCommand::Switch { unique_id, state }, PoolEntity::Switch(mut switch)) => {
            power(&mut switch, state).await?;
            Ok(format!("{unique_id} switched {}", label(state)))
        }

        (SetCommand::Speed { unique_id, percent }, PoolEntity::Switch(mut switch)) => {
            switch.set_speed(percent).await?;
            Ok(format!("{unique_id} speed set to {percent}%"))
        }

        (
            SetCommand::Heater {
                unique_id,
                temperature,
                state,
            },
            PoolEntity::Heater(mut heater),
        ) => {
            if temperature.is_none() && state.is_none() {
                return Err(CliError::InvalidParameter {
                    field: "heater".into(),
                    reason: "provide --temperature and/or --state".into(),
                });
            }
            if let Some(state) = state {
                heater.set_enabled(state.is_on()).await?;
            }
            if let Some(temperature) = temperature {
                heater.set_temperature(temperature).await?;
            }
            Ok(format!("{unique_id} updated"))
        }

        (
            SetCommand::Light {
                unique_id,
                state,
                effect,
                speed,
                brightness,
            },
            PoolEntity::Light(mut light),
        ) => {
            if let Some(state) = state {
                if state.is_on() {
                    light.turn_on().await?;
                } else {
                    light.turn_off().await?;
                }
            }
            if let Some(name) = effect {
                let show: LightEffect =
                    name.parse().map_err(|_| CliError::InvalidParameter {
                        field: "effect".into(),
                        reason: format!("unknown show '{name}'"),
                    })?;
                light.set_effect(show).await?;
            }
            if speed.is_some() || brightness.is_some() {
                light.set_v2_effect(speed, brightness).await?;
            }
            Ok(format!("{unique_id} updated"))
        }

        (
            SetCommand::Chlorinator {
                unique_id,
                state,
                percent,
            },
            PoolEntity::ChlorinatorSwitch(mut chlor),
        ) => {
            if state.is_none() && percent.is_none() {
                return Err(CliError::InvalidParameter {
                    field: "chlorinator".into(),
                    reason: "provide a state and/or --percent".into(),
                });
            }
            if let Some(state) = state {
                if state.is_on() {
                    chlor.turn_on().await?;
                } else {
                    chlor.turn_off().await?;
                }
            }
            if let Some(percent) = percent {
                chlor.set_timed_percent(percent).await?;
            }
            Ok(format!("{unique_id} updated"))
        }

        (
            SetCommand::Superchlorinate { unique_id, state },
            PoolEntity::Superchlorinate(mut sc),
        ) => {
            if state.is_on() {
                sc.turn_on().await?;
            } else {
                sc.turn_off().await?;
            }
            Ok(format!("{unique_id} superchlorination {}", label(state)))
        }

        (command, entity) => Err(CliError::NotSettable {
            unique_id: format!("{} ({})", target_id(&command), entity.category()),
        }),
    }
}

async fn power(
    switch: &mut poolside_core::entity::SwitchEntity,
    state: OnOff,
) -> Result<(), CliError> {
    if state.is_on() {
        switch.turn_on().await?;
    } else {
        switch.turn_off().await?;
    }
    Ok(())
}

fn label(state: OnOff) -> &'static str {
    if state.is_on() { "on" } else { "off" }
}
