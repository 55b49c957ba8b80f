use std::time::Instant;

use anyhow::Result;

use clap::Parser;
use colored::{Colorize, ColoredString};
use futures::StreamExt;
use tionbreezer::{breezer::{Breezer, Generation}, config::Port, protocol::frame::Frame, state::TionState};
use url::Url;


#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path[?baud=N] or tcp+raw://host:port URLs supported
    port: Url,

    /// Breezer generation: 3s, 4s, lite, o2
    #[arg(short, long, default_value = "4s")]
    generation: Generation,
}


fn delta_ms(since: Option<Instant>) -> u128 {
    since.map_or(0, |t| t.elapsed().as_millis())
}

fn state_desc(breezer: &Breezer) -> String {
    let state = breezer.state();
    let traits = breezer.traits();

    format!(
        "power {} fan {} heater {} ({} °C, {} W) in {} °C out {} °C gate {} filter {} d errors [{}]",
        state.power_state,
        state.fan_speed,
        state.heater_state,
        state.target_temperature,
        state.heater_power(traits),
        state.current_temperature,
        state.outdoor_temperature,
        state.gate_position_name(traits),
        state.filter_time_left,
        state.errors_text(traits),
    )
}

fn coloured(known: bool, changed: bool, line: String) -> ColoredString {
    match (known, changed) {
        (true, true) => line.on_green().bright_white(),
        (true, false) => line.normal(),
        (false, _) => line.on_red().bright_white(),
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tionbreezer=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut framed = Port::open(&args.port).await?.framed(args.generation)?;
    let mut breezer = Breezer::new(args.generation);

    let start_time = Instant::now();
    let mut last_frame_time: Option<Instant> = None;
    let mut last_state = TionState::default();

    while let Some(frame) = framed.next().await {
        let frame: Frame = frame?;

        let start_delta_ms = delta_ms(Some(start_time));
        let last_frame_delta_ms = delta_ms(last_frame_time);

        let known = breezer.read_frame(&frame);
        let changed = *breezer.state() != last_state;

        let ty = frame.ty;
        let data = &frame.data[..];
        let mut line = format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {ty:04x}: {data:02x?}");
        if changed {
            line.push_str(&format!("\n    {}", state_desc(&breezer)));
            last_state = *breezer.state();
        }

        println!("{}", coloured(known, changed, line));

        last_frame_time = Some(Instant::now());
    }

    Ok(())
}
