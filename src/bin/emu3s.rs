use anyhow::Result;
use clap::Parser;
use futures::{SinkExt, TryStreamExt};
use packed_struct::prelude::*;
use rand::Rng;
use tionbreezer::{
    breezer::Generation,
    config::{FrameStream, Port},
    protocol::{frame::{Command, Frame}, t3s::{GatePosition, HardReset, State, StateGet, StateSet, StateSetResponse}},
};
use tracing::{info, warn};
use url::Url;

/// Emulator for a Tion 3S breezer
///
/// Answers state requests and applies state writes, so the other tools can be tried without
/// hardware.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path[?baud=N] or tcp+raw://host:port URLs supported
    port: Url,
}


const FILTER_DAYS: u16 = 180;


#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("emu3s=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let framed = Port::open(&args.port).await?.framed_device(Generation::Tion3s)?;

    breezer_emulator(framed).await?;

    Ok(())
}


fn initial_state() -> State {
    let mut state = State {
        fan_speed: 1,
        gate_position: GatePosition::Outdoor.to_primitive(),
        target_temperature: 18,
        current_temperature1: 20,
        current_temperature2: 20,
        outdoor_temperature: 5,
        filter_time: FILTER_DAYS,
        productivity: 15,
        firmware_version: 0x0037,
        ..State::default()
    };
    state.flags.power_state = true;
    state
}

/// Sensor drift between two replies.
fn tick(state: &mut State) {
    let mut rng = rand::thread_rng();

    state.outdoor_temperature = state.outdoor_temperature.saturating_add(rng.gen_range(-1..=1));

    let target = if state.flags.power_state && state.flags.heater_state {
        state.target_temperature.max(state.outdoor_temperature)
    } else {
        state.outdoor_temperature
    };

    let current = state.current_temperature1;
    let step = (target - current).signum();
    state.current_temperature1 = current + step;
    state.current_temperature2 = current + step + rng.gen_range(-1..=1);
}

fn apply(state: &mut State, set: &StateSet) {
    state.fan_speed = set.fan_speed;
    state.target_temperature = set.target_temperature;
    if GatePosition::from_primitive(set.gate_position).is_some() {
        state.gate_position = set.gate_position;
    }

    state.flags.power_state = set.flags.power_state;
    state.flags.heater_state = set.flags.heater_state;
    state.flags.sound_state = set.flags.sound_state;
    state.flags.auto_state = set.flags.auto_state;

    if set.filter_control.reset {
        state.filter_time = FILTER_DAYS;
    }

    if set.factory_reset {
        *state = initial_state();
    }
}


pub async fn breezer_emulator(mut port: Box<dyn FrameStream>) -> Result<()> {
    info!("Starting Tion 3S emulator");

    let mut state = initial_state();

    while let Some(frame) = port.try_next().await? {
        let reply = match frame.ty {
            StateGet::TYPE => {
                tick(&mut state);
                Frame::pack(&state)?
            },
            StateSet::TYPE => {
                let set = frame.unpack_as::<StateSet>()?;
                info!("State set: {set:?}");

                apply(&mut state, &set);
                Frame::pack(&StateSetResponse(state))?
            },
            HardReset::TYPE => {
                info!("Hard reset");
                state = initial_state();
                continue;
            },
            other => {
                warn!("Ignoring request {other:#06x}: {:02x?}", &frame.data[..]);
                continue;
            }
        };

        port.send(reply).await?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        let mut state = initial_state();
        state.filter_time = 3;

        let set = StateSet {
            fan_speed: 4,
            target_temperature: 22,
            gate_position: 0x0F,
            filter_control: tionbreezer::protocol::t3s::FilterControl { save: false, reset: true },
            ..StateSet::default()
        };
        apply(&mut state, &set);

        assert_eq!(state.fan_speed, 4);
        assert_eq!(state.target_temperature, 22);
        // unknown gate positions are ignored
        assert_eq!(state.gate_position, GatePosition::Outdoor.to_primitive());
        assert!(!state.flags.power_state);
        assert_eq!(state.filter_time, FILTER_DAYS);
    }

    #[test]
    fn test_tick_follows_heater() {
        let mut state = initial_state();
        state.flags.heater_state = true;
        state.target_temperature = 30;
        state.outdoor_temperature = -40;

        for _ in 0..50 {
            tick(&mut state);
        }
        assert_eq!(state.current_temperature1, 30);
    }
}
