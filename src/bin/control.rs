use std::time::Duration;

use anyhow::{Result, Context, bail};

use clap::{Parser, builder::BoolishValueParser};
use colored::Colorize;
use futures::{SinkExt, StreamExt, stream::SplitStream};
use tionbreezer::{
    breezer::{Breezer, Generation},
    config::{FrameStream, Port},
    dispatch::{Callback, Response},
    protocol::frame::Frame,
    state::{GatePosition, StateCall},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};
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

    #[arg(long, value_parser = BoolishValueParser::new())]
    power: Option<bool>,

    /// Fan speed; 0 turns the breezer off
    #[arg(long)]
    fan: Option<u8>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    heater: Option<bool>,

    /// Heater target, °C
    #[arg(long, allow_hyphen_values = true)]
    temperature: Option<i8>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    sound: Option<bool>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    led: Option<bool>,

    /// outdoor, indoor or mixed
    #[arg(long)]
    gate: Option<GatePosition>,

    /// Turn on boost for the configured boost time
    #[arg(long)]
    boost: bool,

    #[arg(long)]
    reset_filter: bool,

    /// Seconds to wait for each reply
    #[arg(long, default_value_t = 5)]
    timeout: u64,
}

impl Args {
    fn state_call(&self) -> StateCall {
        StateCall {
            fan_speed: self.fan,
            power_state: self.power,
            heater_state: self.heater,
            target_temperature: self.temperature,
            sound_state: self.sound,
            led_state: self.led,
            gate_position: self.gate,
            auto_state: None,
        }
    }
}


fn reply() -> (Callback, oneshot::Receiver<Response>) {
    let (tx, rx) = oneshot::channel();
    let callback: Callback = Box::new(move |response: &Response| {
        let _ = tx.send(response.clone());
    });
    (callback, rx)
}

/// Feed received frames to `breezer` until `done` fires.
async fn pump(
    frames: &mut SplitStream<Box<dyn FrameStream>>,
    breezer: &mut Breezer,
    done: &mut oneshot::Receiver<Response>
) -> Result<Response> {
    loop {
        tokio::select! {
            response = &mut *done => {
                return response.context("request was dropped");
            },
            frame = frames.next() => match frame {
                Some(frame) => {
                    breezer.read_frame(&frame?);
                },
                None => bail!("port closed"),
            },
        }
    }
}

async fn wait(
    frames: &mut SplitStream<Box<dyn FrameStream>>,
    breezer: &mut Breezer,
    mut done: oneshot::Receiver<Response>,
    timeout: Duration,
    what: &str
) -> Result<Response> {
    tokio::time::timeout(timeout, pump(frames, breezer, &mut done)).await
        .with_context(|| format!("no reply to {what}"))?
}

fn print_state(breezer: &Breezer) {
    let state = breezer.state();
    let traits = breezer.traits();

    println!("{}", format!("Tion {}", breezer.generation()).bold());
    println!("  power:        {}", state.power_state);
    println!("  fan:          {} of {} ({} m³/h)", state.fan_speed, traits.max_fan_speed, state.productivity);
    println!("  heater:       {} ({} °C, {} W)", state.heater_state, state.target_temperature, state.heater_power(traits));
    println!("  temperature:  in {} °C, out {} °C", state.current_temperature, state.outdoor_temperature);
    println!("  gate:         {}", state.gate_position_name(traits));
    println!("  filter:       {} days{}", state.filter_time_left, if state.filter_state { ", replace" } else { "" });
    if state.boost_time_left != 0 {
        println!("  boost:        {} s left", state.boost_time_left);
    }

    let errors = state.errors_text(traits);
    if !errors.is_empty() {
        println!("  errors:       {}", errors.red());
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
    let timeout = Duration::from_secs(args.timeout);

    let framed = Port::open(&args.port).await?.framed(args.generation)?;
    let (mut sink, mut frames) = framed.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(err) = sink.send(frame).await {
                error!("Failed to send frame: {err}");
                break;
            }
        }
    });

    let mut breezer = Breezer::new(args.generation);
    breezer.set_writer(Box::new(move |frame| tx.send(frame).is_ok()));

    let (ready_tx, ready_rx) = oneshot::channel();
    let mut ready_tx = Some(ready_tx);
    breezer.dispatcher_mut().on_ready = Some(Box::new(move || {
        if let Some(ready_tx) = ready_tx.take() {
            let _ = ready_tx.send(Response::Ack);
        }
    }));

    if !breezer.connect() {
        bail!("failed to connect");
    }
    wait(&mut frames, &mut breezer, ready_rx, timeout, "connect").await?;

    let (callback, done) = reply();
    breezer.request_state(Some(callback));
    wait(&mut frames, &mut breezer, done, timeout, "state request").await?;

    let mut call = args.state_call();
    let mut written = false;

    if call.has_changes() {
        info!("Writing {:?}", call);
        written |= breezer.write_state(&mut call);
    }

    if args.reset_filter {
        written |= breezer.reset_filter();
    }

    if args.boost {
        written |= breezer.enable_boost();
    }

    if written {
        let (callback, done) = reply();
        breezer.request_state(Some(callback));
        wait(&mut frames, &mut breezer, done, timeout, "state request").await?;
    }

    print_state(&breezer);

    Ok(())
}
