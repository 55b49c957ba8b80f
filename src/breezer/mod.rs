//! One breezer of a known generation.
//!
//! [`Breezer`] owns the canonical state and capability traits of a device, decodes every frame
//! the device sends and encodes requests and state writes in its generation's format. Outgoing
//! frames go through the [`Dispatcher`]'s writer; the transport hands received frames to
//! [`Breezer::read_frame`].
//!
//! Failures are logged and reported as `false`; nothing here is fatal.

mod iq;
mod lite;
mod o2;
mod t3s;
mod t4s;

use std::collections::VecDeque;

use bytes::Bytes;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info, warn};

use crate::dispatch::{Callback, Dispatcher, Response, WriteError, Writer};
use crate::protocol::devinfo::DevInfo;
use crate::protocol::firmware;
use crate::protocol::frame::{Correlated, Frame, FrameError, DEFAULT_REQUEST_ID};
use crate::protocol;
use crate::state::{
    make_write_state, AutoFan, Boost, BoostAction, PresetData, PresetError, Presets, StateCall,
    TionState, TionTraits,
};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Generation {
    #[strum(serialize = "3s")]
    Tion3s,
    #[strum(serialize = "4s")]
    Tion4s,
    #[strum(to_string = "lite", serialize = "lt")]
    Lite,
    #[strum(serialize = "o2")]
    O2,
    #[strum(serialize = "iq")]
    Iq,
}

impl Generation {
    pub fn traits(&self) -> TionTraits {
        match self {
            Generation::Tion3s => t3s::traits(),
            Generation::Tion4s => t4s::traits(),
            Generation::Lite => lite::traits(),
            Generation::O2 => o2::traits(),
            Generation::Iq => iq::traits(),
        }
    }

    /// Whether the device echoes request ids in its responses.
    pub fn is_correlated(&self) -> bool {
        matches!(self, Generation::Tion4s | Generation::Lite | Generation::Iq)
    }
}


#[derive(Clone, Copy, Debug)]
enum Reset {
    Filter,
    Factory,
}

struct FirmwareUpdate {
    start: firmware::Start,
    chunks: VecDeque<firmware::Chunk>,
}


pub struct Breezer {
    generation: Generation,
    traits: TionTraits,
    state: TionState,
    dispatcher: Dispatcher,
    boost: Boost,
    presets: Presets,
    auto: AutoFan,
    /// Lite preset buttons, written back unchanged with every state set
    button_presets: protocol::lite::ButtonPresets,
    firmware: Option<FirmwareUpdate>,
}

impl Breezer {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            traits: generation.traits(),
            state: TionState::default(),
            dispatcher: Dispatcher::new(generation.is_correlated()),
            boost: Boost::default(),
            presets: Presets::default(),
            auto: AutoFan::default(),
            button_presets: protocol::lite::ButtonPresets::default(),
            firmware: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &TionState {
        &self.state
    }

    pub fn traits(&self) -> &TionTraits {
        &self.traits
    }

    /// Boost and temperature settings live in the traits.
    pub fn traits_mut(&mut self) -> &mut TionTraits {
        &mut self.traits
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn set_writer(&mut self, writer: Writer) {
        self.dispatcher.set_writer(writer);
    }

    pub fn presets(&self) -> &Presets {
        &self.presets
    }

    pub fn add_preset(&mut self, name: &str, data: PresetData) -> Result<(), PresetError> {
        self.presets.add(name, data, &self.traits)
    }

    pub fn auto_mut(&mut self) -> &mut AutoFan {
        &mut self.auto
    }

    /// CO2 set point, ppm, and the fan speeds auto mode may use.
    pub fn setup_auto(&mut self, setpoint: u16, min_fan_speed: u8, max_fan_speed: u8) {
        self.auto.set_setpoint(setpoint);
        self.auto.set_min_fan_speed(min_fan_speed, &self.traits);
        self.auto.set_max_fan_speed(max_fan_speed, &self.traits);
    }


    /// Handle one frame received from the device.
    pub fn read_frame(&mut self, frame: &Frame) -> bool {
        let result = match self.generation {
            Generation::Tion3s => self.read_3s(frame),
            Generation::Tion4s => self.read_4s(frame),
            Generation::Lite => self.read_lite(frame),
            Generation::O2 => self.read_o2(frame),
            Generation::Iq => self.read_iq(frame),
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("Dropped frame: {err}");
                false
            }
        }
    }

    /// Decode a state response into the canonical state. Returns the echoed request id.
    pub fn decode_state(&mut self, frame: &Frame) -> Result<u32, FrameError> {
        match self.generation {
            Generation::Tion3s => {
                let raw = if frame.ty == t3s::STATE_SET_RSP {
                    frame.unpack_as::<protocol::t3s::StateSetResponse>()?.0
                } else {
                    frame.unpack_as::<protocol::t3s::State>()?
                };
                t3s::update_state(&mut self.state, &raw);
                Ok(DEFAULT_REQUEST_ID)
            },
            Generation::Tion4s => {
                let rsp = frame.unpack_as::<protocol::t4s::StateResponse>()?;
                t4s::update_state(&mut self.state, &mut self.traits, &rsp.inner);
                Ok(rsp.request_id)
            },
            Generation::Lite => {
                let rsp = frame.unpack_as::<protocol::lite::StateResponse>()?;
                lite::update_state(&mut self.state, &mut self.traits, &rsp.inner);
                self.button_presets = rsp.inner.button_presets;
                Ok(rsp.request_id)
            },
            Generation::O2 => {
                let raw = frame.unpack_as::<protocol::o2::State>()?;
                o2::update_state(&mut self.state, &raw);
                Ok(DEFAULT_REQUEST_ID)
            },
            Generation::Iq => {
                let rsp = frame.unpack_as::<protocol::iq::StateResponse>()?;
                iq::update_state(&mut self.state, &rsp.inner);
                Ok(rsp.request_id)
            },
        }
    }

    /// The set frame writing `ns`.
    pub fn encode_write_state(&self, ns: &TionState, request_id: u32) -> Result<Frame, WriteError> {
        let frame = match self.generation {
            Generation::Tion3s => Frame::pack(&t3s::state_set(ns))?,
            Generation::Tion4s => Frame::pack(&Correlated::new(request_id, t4s::state_set(ns)))?,
            Generation::Lite => {
                Frame::pack(&Correlated::new(request_id, lite::state_set(ns, &self.button_presets)))?
            },
            Generation::O2 => Frame::pack(&o2::state_set(ns))?,
            Generation::Iq => return Err(WriteError::Unsupported("state write")),
        };

        Ok(frame)
    }

    fn read_3s(&mut self, frame: &Frame) -> Result<(), FrameError> {
        match frame.ty {
            t3s::STATE_RSP | t3s::STATE_SET_RSP => self.read_state(frame)?,
            t3s::TIMERS_RSP => {
                debug!("Timers: {:02x?}", &frame.data[..]);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
            },
            _ => return Err(frame.unknown()),
        }

        Ok(())
    }

    fn read_4s(&mut self, frame: &Frame) -> Result<(), FrameError> {
        use protocol::t4s::{ty, DevInfo, ErrorCounters, Heartbeat, Test, Time, TimerResponse, TimersState, Turbo};

        match frame.ty {
            ty::STATE_RSP => self.read_state(frame)?,
            ty::DEV_INFO_RSP => {
                let info = frame.unpack_as::<DevInfo>()?.0;
                self.read_dev_info(frame.ty, info);
            },
            ty::TURBO_RSP => {
                let Correlated { request_id, inner: turbo } = frame.unpack_as::<Correlated<Turbo>>()?;
                debug!("Turbo: {turbo:?}");
                self.state.boost_time_left = if turbo.is_active { turbo.turbo_time } else { 0 };
                self.dispatcher.dispatch(frame.ty, request_id, &Response::Turbo(turbo));
            },
            ty::TIME_RSP => {
                let Correlated { request_id, inner: time } = frame.unpack_as::<Correlated<Time>>()?;
                debug!("Time: {}", time.unix_time);
                self.dispatcher.dispatch(frame.ty, request_id, &Response::Time(time.unix_time));
            },
            ty::HEARTBEAT_RSP => {
                let heartbeat = frame.unpack_as::<Heartbeat>()?;
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Heartbeat(heartbeat.work_mode));
            },
            ty::TIMERS_STATE_RSP => {
                let rsp = frame.unpack_as::<Correlated<TimersState>>()?;
                debug!("Timers state: {:?}", rsp.inner.active);
                self.dispatcher.dispatch(frame.ty, rsp.request_id, &Response::Ack);
            },
            ty::TIMER_RSP => {
                let rsp = frame.unpack_as::<Correlated<TimerResponse>>()?;
                debug!("Timer: {:?}", rsp.inner.0);
                self.dispatcher.dispatch(frame.ty, rsp.request_id, &Response::Timer(rsp.inner.0));
            },
            ty::ERR_CNT_RSP => {
                let rsp = frame.unpack_as::<Correlated<ErrorCounters>>()?;
                debug!("Error counters: {:?}", rsp.inner.counts);
                self.dispatcher.dispatch(frame.ty, rsp.request_id, &Response::Ack);
            },
            ty::TEST_RSP => {
                let test = frame.unpack_as::<Test>()?;
                debug!("Test: {}", test.test_type);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
            },
            _ => self.read_firmware(frame)?,
        }

        Ok(())
    }

    fn read_lite(&mut self, frame: &Frame) -> Result<(), FrameError> {
        use protocol::lite::{ty, DevInfo};

        match frame.ty {
            ty::STATE_RSP => self.read_state(frame)?,
            ty::DEV_INFO_RSP => {
                let info = frame.unpack_as::<DevInfo>()?.0;
                self.read_dev_info(frame.ty, info);
            },
            ty::AUTOKIV_PARAM_RSP | ty::TEST_RSP => {
                debug!("Response {:#06x}: {:02x?}", frame.ty, &frame.data[..]);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
            },
            _ => self.read_firmware(frame)?,
        }

        Ok(())
    }

    fn read_o2(&mut self, frame: &Frame) -> Result<(), FrameError> {
        use protocol::o2::{ty, Connect, DevInfoResponse, DevMode, Time, WorkModeAck};

        match frame.ty {
            ty::CONNECT_RSP => {
                let connect = frame.unpack_as::<Connect>()?;
                debug!("Connected: {:02x?}", connect.data);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
                self.dispatcher.notify_ready();
            },
            ty::STATE_GET_RSP => self.read_state(frame)?,
            ty::DEV_INFO_RSP => {
                let info = frame.unpack_as::<DevInfoResponse>()?;
                o2::update_traits(&mut self.traits, &info);
                self.read_dev_info(frame.ty, info.to_dev_info());
            },
            ty::DEV_MODE_RSP => {
                let mode = frame.unpack_as::<DevMode>()?;
                debug!("Dev mode: {:?}", mode.0);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
            },
            ty::SET_WORK_MODE_RSP => {
                frame.unpack_as::<WorkModeAck>()?;
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
            },
            ty::TIME_GET_RSP => {
                let time = frame.unpack_as::<Time>()?;
                debug!("Time: {:02}:{:02}:{:02}", time.hours, time.minutes, time.seconds);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Time(o2::seconds_of_day(&time)));
            },
            _ => return Err(frame.unknown()),
        }

        Ok(())
    }

    fn read_iq(&mut self, frame: &Frame) -> Result<(), FrameError> {
        use protocol::iq::{ty, DevInfo};

        match frame.ty {
            ty::STATE_RSP => self.read_state(frame)?,
            ty::DEV_INFO_RSP => {
                let info = frame.unpack_as::<DevInfo>()?.0;
                self.read_dev_info(frame.ty, info);
            },
            _ => return Err(frame.unknown()),
        }

        Ok(())
    }

    fn read_firmware(&mut self, frame: &Frame) -> Result<(), FrameError> {
        use firmware::ty;

        match frame.ty {
            ty::PREPARE_RSP => {
                let versions = frame.unpack_as::<firmware::Versions>()?;
                debug!("Update accepted by {:#06x}, hardware {:#06x}", versions.device_type, versions.hardware_version);
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);

                if let Some(start) = self.firmware.as_ref().map(|update| update.start) {
                    self.continue_firmware(Frame::pack(&start)?, ty::START_RSP);
                }
            },
            ty::START_RSP | ty::CHUNK_RSP => {
                if frame.ty == ty::START_RSP {
                    frame.unpack_as::<firmware::StartAck>()?;
                } else {
                    frame.unpack_as::<firmware::ChunkAck>()?;
                }
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
                self.next_firmware_chunk()?;
            },
            ty::FINISH_RSP => {
                frame.unpack_as::<firmware::FinishAck>()?;
                self.dispatcher.dispatch(frame.ty, DEFAULT_REQUEST_ID, &Response::Ack);
                if self.firmware.take().is_some() {
                    info!("Firmware update finished");
                }
            },
            ty::ERROR => {
                warn!("Firmware update failed: {:02x?}", &frame.data[..]);
                self.firmware = None;
            },
            _ => return Err(frame.unknown()),
        }

        Ok(())
    }

    fn read_state(&mut self, frame: &Frame) -> Result<(), FrameError> {
        let request_id = self.decode_state(frame)?;
        debug!("State [{}]: {:?}", request_id, self.state);

        let action = self.boost.notify_state(&mut self.state, &self.traits);

        let state = self.state;
        self.dispatcher.dispatch(frame.ty, request_id, &Response::State(state));

        if let Some(action) = action {
            self.apply_boost(action);
        }

        Ok(())
    }

    fn read_dev_info(&mut self, ty: u16, info: DevInfo) {
        debug!(
            "Device info: work mode {:?}, type {:?}, firmware {:04X}, hardware {:04X}",
            info.work_mode(), info.device_type(), info.firmware_version, info.hardware_version
        );

        self.state.firmware_version = info.firmware_version;
        self.state.hardware_version = info.hardware_version;
        self.dispatcher.dispatch(ty, DEFAULT_REQUEST_ID, &Response::DevInfo(info));
    }


    fn require(&self, generation: Generation, what: &'static str) -> Result<(), WriteError> {
        if self.generation == generation {
            Ok(())
        } else {
            Err(WriteError::Unsupported(what))
        }
    }

    /// Start talking to the device. The O2 has to answer a connect request first, the others
    /// are ready right away.
    pub fn connect(&mut self) -> bool {
        if self.generation != Generation::O2 {
            self.dispatcher.notify_ready();
            return true;
        }

        debug!("Request connect");
        let result = Frame::pack(&protocol::o2::ConnectGet)
            .map_err(WriteError::from)
            .and_then(|frame| self.dispatcher.request(frame, protocol::o2::ty::CONNECT_RSP, None, None));
        degrade("Connect", result)
    }

    pub fn request_state(&mut self, callback: Option<Callback>) -> bool {
        debug!("Request state");
        let result = self.try_request_state(callback);
        degrade("State request", result)
    }

    fn try_request_state(&mut self, callback: Option<Callback>) -> Result<(), WriteError> {
        let (frame, response_ty) = match self.generation {
            Generation::Tion3s => (Frame::pack(&protocol::t3s::StateGet)?, t3s::STATE_RSP),
            Generation::Tion4s => (Frame::pack(&protocol::t4s::StateGet)?, protocol::t4s::ty::STATE_RSP),
            Generation::Lite => (Frame::pack(&protocol::lite::StateGet)?, protocol::lite::ty::STATE_RSP),
            Generation::O2 => (Frame::pack(&protocol::o2::StateGet)?, protocol::o2::ty::STATE_GET_RSP),
            Generation::Iq => (Frame::pack(&protocol::iq::StateGet)?, protocol::iq::ty::STATE_RSP),
        };

        self.dispatcher.request(frame, response_ty, None, callback)
    }

    pub fn request_dev_info(&mut self, callback: Option<Callback>) -> bool {
        debug!("Request device info");
        let result = self.try_request_dev_info(callback);
        degrade("Device info request", result)
    }

    fn try_request_dev_info(&mut self, callback: Option<Callback>) -> Result<(), WriteError> {
        let (frame, response_ty) = match self.generation {
            // firmware version is part of the state
            Generation::Tion3s => return Err(WriteError::Unsupported("device info")),
            Generation::Tion4s => (Frame::pack(&protocol::t4s::DevInfoGet)?, protocol::t4s::ty::DEV_INFO_RSP),
            Generation::Lite => (Frame::pack(&protocol::lite::DevInfoGet)?, protocol::lite::ty::DEV_INFO_RSP),
            Generation::O2 => (Frame::pack(&protocol::o2::DevInfoGet)?, protocol::o2::ty::DEV_INFO_RSP),
            Generation::Iq => (Frame::pack(&protocol::iq::DevInfoGet)?, protocol::iq::ty::DEV_INFO_RSP),
        };

        self.dispatcher.request(frame, response_ty, None, callback)
    }

    /// Write the current state with the changes in `call`. `call` is corrected in place, see
    /// [`make_write_state`].
    pub fn write_state(&mut self, call: &mut StateCall) -> bool {
        let result = self.try_write_state(call);
        degrade("State write", result)
    }

    fn try_write_state(&mut self, call: &mut StateCall) -> Result<(), WriteError> {
        if !self.state.is_initialized() {
            return Err(WriteError::NotInitialized);
        }

        let ns = make_write_state(&self.state, &self.traits, call);
        let request_id = self.dispatcher.next_request_id();
        let frame = self.encode_write_state(&ns, request_id)?;

        debug!("Write state [{}]: {:?}", request_id, call);

        match self.generation {
            Generation::Tion3s => self.dispatcher.request(frame, t3s::STATE_SET_RSP, None, None),
            Generation::Tion4s => {
                self.dispatcher.request(frame, protocol::t4s::ty::STATE_RSP, Some(request_id), None)
            },
            Generation::Lite => {
                self.dispatcher.request(frame, protocol::lite::ty::STATE_RSP, Some(request_id), None)
            },
            Generation::O2 => {
                // no reply to a set, read the result back
                self.dispatcher.write(frame)?;
                self.try_request_state(None)
            },
            Generation::Iq => Err(WriteError::Unsupported("state write")),
        }
    }

    pub fn reset_filter(&mut self) -> bool {
        let result = self.write_reset(Reset::Filter);
        degrade("Filter reset", result)
    }

    pub fn factory_reset(&mut self) -> bool {
        let result = self.write_reset(Reset::Factory);
        degrade("Factory reset", result)
    }

    fn write_reset(&mut self, reset: Reset) -> Result<(), WriteError> {
        if matches!(reset, Reset::Filter) && !self.traits.supports_reset_filter {
            return Err(WriteError::Unsupported("filter reset"));
        }

        if !self.state.is_initialized() {
            return Err(WriteError::NotInitialized);
        }

        debug!("Request {reset:?} reset");

        let ns = self.state;
        match self.generation {
            Generation::Tion3s => match reset {
                Reset::Filter => {
                    let frame = Frame::pack(&t3s::reset_filter(&ns))?;
                    self.dispatcher.request(frame, t3s::STATE_SET_RSP, None, None)
                },
                Reset::Factory => self.dispatcher.write(Frame::pack(&protocol::t3s::HardReset)?),
            },
            Generation::Tion4s => {
                let mut set = t4s::state_set(&ns);
                match reset {
                    Reset::Filter => set.flags.filter_reset = true,
                    Reset::Factory => set.flags.factory_reset = true,
                }

                let request_id = self.dispatcher.next_request_id();
                let frame = Frame::pack(&Correlated::new(request_id, set))?;
                self.dispatcher.request(frame, protocol::t4s::ty::STATE_RSP, Some(request_id), None)
            },
            Generation::Lite => {
                let mut set = lite::state_set(&ns, &self.button_presets);
                match reset {
                    Reset::Filter => set.flags.filter_reset = true,
                    Reset::Factory => set.flags.factory_reset = true,
                }

                let request_id = self.dispatcher.next_request_id();
                let frame = Frame::pack(&Correlated::new(request_id, set))?;
                self.dispatcher.request(frame, protocol::lite::ty::STATE_RSP, Some(request_id), None)
            },
            Generation::O2 | Generation::Iq => Err(WriteError::Unsupported("factory reset")),
        }
    }

    /// Put a 3S into pairing mode.
    pub fn pair(&mut self) -> bool {
        let result = self.require(Generation::Tion3s, "pairing")
            .and_then(|_| Ok(Frame::pack(&protocol::t3s::ServiceModeSet { pair: true })?))
            .and_then(|frame| self.dispatcher.write(frame));
        degrade("Pairing", result)
    }

    pub fn request_turbo(&mut self) -> bool {
        let result = self.require(Generation::Tion4s, "turbo")
            .and_then(|_| Ok(Frame::pack(&protocol::t4s::TurboGet)?))
            .and_then(|frame| self.dispatcher.request(frame, protocol::t4s::ty::TURBO_RSP, None, None));
        degrade("Turbo request", result)
    }

    /// Start the 4S turbo mode for `time` seconds, zero stops it.
    pub fn set_turbo(&mut self, time: u16) -> bool {
        debug!("Set turbo for {time} s");
        let result = self.try_set_turbo(time);
        degrade("Turbo", result)
    }

    fn try_set_turbo(&mut self, time: u16) -> Result<(), WriteError> {
        self.require(Generation::Tion4s, "turbo")?;

        let request_id = self.dispatcher.next_request_id();
        let set = protocol::t4s::TurboSet { time, err_code: 0 };
        let frame = Frame::pack(&Correlated::new(request_id, set))?;
        self.dispatcher.request(frame, protocol::t4s::ty::TURBO_RSP, Some(request_id), None)
    }

    pub fn request_time(&mut self, callback: Option<Callback>) -> bool {
        let result = self.try_request_time(callback);
        degrade("Time request", result)
    }

    fn try_request_time(&mut self, callback: Option<Callback>) -> Result<(), WriteError> {
        match self.generation {
            Generation::Tion4s => {
                let request_id = self.dispatcher.next_request_id();
                let frame = Frame::pack(&Correlated::new(request_id, protocol::t4s::TimeGet))?;
                self.dispatcher.request(frame, protocol::t4s::ty::TIME_RSP, Some(request_id), callback)
            },
            Generation::O2 => {
                let frame = Frame::pack(&protocol::o2::TimeGet)?;
                self.dispatcher.request(frame, protocol::o2::ty::TIME_GET_RSP, None, callback)
            },
            _ => Err(WriteError::Unsupported("clock")),
        }
    }

    /// Set the device clock. The O2 keeps the time of day only.
    pub fn set_time(&mut self, unix_time: i64) -> bool {
        let result = self.try_set_time(unix_time);
        degrade("Time set", result)
    }

    fn try_set_time(&mut self, unix_time: i64) -> Result<(), WriteError> {
        let frame = match self.generation {
            Generation::Tion4s => {
                let request_id = self.dispatcher.next_request_id();
                let set = protocol::t4s::TimeSet(protocol::t4s::Time { unix_time });
                Frame::pack(&Correlated::new(request_id, set))?
            },
            Generation::O2 => Frame::pack(&protocol::o2::TimeSet(o2::time_of_day(unix_time)))?,
            _ => return Err(WriteError::Unsupported("clock")),
        };

        self.dispatcher.write(frame)
    }

    /// 4S serial heartbeat; the answer carries the device work mode.
    pub fn send_heartbeat(&mut self) -> bool {
        let result = self.require(Generation::Tion4s, "heartbeat")
            .and_then(|_| Ok(Frame::pack(&protocol::t4s::HeartbeatGet)?))
            .and_then(|frame| self.dispatcher.request(frame, protocol::t4s::ty::HEARTBEAT_RSP, None, None));
        degrade("Heartbeat", result)
    }

    pub fn request_timers_state(&mut self) -> bool {
        let result = self.require(Generation::Tion4s, "timers").and_then(|_| {
            let request_id = self.dispatcher.next_request_id();
            let frame = Frame::pack(&Correlated::new(request_id, protocol::t4s::TimersStateGet))?;
            self.dispatcher.request(frame, protocol::t4s::ty::TIMERS_STATE_RSP, Some(request_id), None)
        });
        degrade("Timers state request", result)
    }

    /// One 4S timer. The answer reaches `callback` as [`Response::Timer`].
    pub fn request_timer(&mut self, timer_id: u8, callback: Option<Callback>) -> bool {
        let result = self.try_request_timer(timer_id, callback);
        degrade("Timer request", result)
    }

    fn try_request_timer(&mut self, timer_id: u8, callback: Option<Callback>) -> Result<(), WriteError> {
        use protocol::t4s::{ty, TimerGet, TIMERS_COUNT};

        self.require(Generation::Tion4s, "timers")?;
        if usize::from(timer_id) >= TIMERS_COUNT {
            return Err(WriteError::NoSuchTimer(timer_id));
        }

        let request_id = self.dispatcher.next_request_id();
        let frame = Frame::pack(&Correlated::new(request_id, TimerGet { timer_id }))?;
        self.dispatcher.request(frame, ty::TIMER_RSP, Some(request_id), callback)
    }

    /// All timers. A 4S is asked for each of its timers in turn and answers into the `on_timer`
    /// slot; a 3S answers one timers request.
    pub fn request_timers(&mut self) -> bool {
        let result = self.try_request_timers();
        degrade("Timers request", result)
    }

    fn try_request_timers(&mut self) -> Result<(), WriteError> {
        match self.generation {
            Generation::Tion3s => {
                let frame = Frame::pack(&protocol::t3s::TimersGet)?;
                self.dispatcher.request(frame, t3s::TIMERS_RSP, None, None)
            },
            Generation::Tion4s => {
                for timer_id in 0..protocol::t4s::TIMERS_COUNT as u8 {
                    let request_id = self.dispatcher.next_request_id();
                    let frame = Frame::pack(&Correlated::new(request_id, protocol::t4s::TimerGet { timer_id }))?;
                    self.dispatcher.write(frame)?;
                }
                Ok(())
            },
            _ => Err(WriteError::Unsupported("timers")),
        }
    }

    /// Write one 4S timer; the breezer answers with the stored timer.
    pub fn set_timer(&mut self, timer: protocol::t4s::Timer) -> bool {
        let result = self.try_set_timer(timer);
        degrade("Timer write", result)
    }

    fn try_set_timer(&mut self, timer: protocol::t4s::Timer) -> Result<(), WriteError> {
        use protocol::t4s::{ty, TimerSet, TIMERS_COUNT};

        self.require(Generation::Tion4s, "timers")?;
        if usize::from(timer.timer_id) >= TIMERS_COUNT {
            return Err(WriteError::NoSuchTimer(timer.timer_id));
        }

        debug!("Set timer {timer:?}");
        let request_id = self.dispatcher.next_request_id();
        let frame = Frame::pack(&Correlated::new(request_id, TimerSet(timer)))?;
        self.dispatcher.request(frame, ty::TIMER_RSP, Some(request_id), None)
    }

    pub fn request_error_counters(&mut self) -> bool {
        let result = self.require(Generation::Tion4s, "error counters").and_then(|_| {
            let request_id = self.dispatcher.next_request_id();
            let frame = Frame::pack(&Correlated::new(request_id, protocol::t4s::ErrorCountersGet))?;
            self.dispatcher.request(frame, protocol::t4s::ty::ERR_CNT_RSP, Some(request_id), None)
        });
        degrade("Error counters request", result)
    }

    /// Self test of a 4S or Lite.
    pub fn request_test(&mut self) -> bool {
        let result = self.try_request_test();
        degrade("Test request", result)
    }

    fn try_request_test(&mut self) -> Result<(), WriteError> {
        let (frame, response_ty) = match self.generation {
            Generation::Tion4s => (Frame::pack(&protocol::t4s::TestGet)?, protocol::t4s::ty::TEST_RSP),
            Generation::Lite => (Frame::pack(&protocol::lite::TestGet)?, protocol::lite::ty::TEST_RSP),
            _ => return Err(WriteError::Unsupported("test")),
        };

        self.dispatcher.request(frame, response_ty, None, None)
    }

    pub fn request_autokiv_params(&mut self) -> bool {
        let result = self.require(Generation::Lite, "AUTOKIV")
            .and_then(|_| Ok(Frame::pack(&protocol::lite::AutoKivParamGet)?))
            .and_then(|frame| self.dispatcher.request(frame, protocol::lite::ty::AUTOKIV_PARAM_RSP, None, None));
        degrade("AUTOKIV request", result)
    }

    /// Write the current state and have the breezer keep it over a power loss.
    pub fn save_state(&mut self) -> bool {
        let result = self.try_save_state();
        degrade("State save", result)
    }

    fn try_save_state(&mut self) -> Result<(), WriteError> {
        if !self.state.is_initialized() {
            return Err(WriteError::NotInitialized);
        }

        debug!("Save state");
        let request_id = self.dispatcher.next_request_id();
        let frame = match self.generation {
            Generation::Tion4s => {
                let save = protocol::t4s::StateSave(t4s::state_set(&self.state));
                Frame::pack(&Correlated::new(request_id, save))?
            },
            Generation::Lite => {
                let save = protocol::lite::StateSave(lite::state_set(&self.state, &self.button_presets));
                Frame::pack(&Correlated::new(request_id, save))?
            },
            _ => return Err(WriteError::Unsupported("state save")),
        };

        self.dispatcher.write(frame)
    }

    /// 3S alarm.
    pub fn set_alarm(&mut self, on: bool) -> bool {
        let result = self.require(Generation::Tion3s, "alarm").and_then(|_| {
            let frame = if on {
                Frame::pack(&protocol::t3s::AlarmOn)?
            } else {
                Frame::pack(&protocol::t3s::AlarmOff)?
            };
            self.dispatcher.write(frame)
        });
        degrade("Alarm", result)
    }

    pub fn request_dev_mode(&mut self) -> bool {
        let result = self.require(Generation::O2, "device mode")
            .and_then(|_| Ok(Frame::pack(&protocol::o2::DevModeGet)?))
            .and_then(|frame| self.dispatcher.request(frame, protocol::o2::ty::DEV_MODE_RSP, None, None));
        degrade("Dev mode request", result)
    }

    /// O2 work mode, also sent periodically to keep the link up.
    pub fn set_work_mode(&mut self, flags: protocol::o2::WorkModeFlags) -> bool {
        let result = self.require(Generation::O2, "work mode")
            .and_then(|_| Ok(Frame::pack(&protocol::o2::WorkModeSet(flags))?))
            .and_then(|frame| self.dispatcher.request(frame, protocol::o2::ty::SET_WORK_MODE_RSP, None, None));
        degrade("Work mode", result)
    }

    /// Upload a firmware image to a 4S or Lite. The update runs as responses arrive.
    pub fn update_firmware(&mut self, image: Bytes) -> bool {
        let result = self.try_update_firmware(image);
        if result.is_err() {
            self.firmware = None;
        }
        degrade("Firmware update", result)
    }

    fn try_update_firmware(&mut self, image: Bytes) -> Result<(), WriteError> {
        if !matches!(self.generation, Generation::Tion4s | Generation::Lite) {
            return Err(WriteError::Unsupported("firmware update"));
        }

        info!("Firmware update, {} bytes", image.len());
        self.firmware = Some(FirmwareUpdate {
            start: firmware::Start::for_image(&image),
            chunks: firmware::chunks(&image).into(),
        });

        let frame = Frame::pack(&firmware::PrepareGet)?;
        self.dispatcher.request(frame, firmware::ty::PREPARE_RSP, None, None)
    }

    fn next_firmware_chunk(&mut self) -> Result<(), FrameError> {
        let Some(update) = self.firmware.as_mut() else {
            return Ok(());
        };

        let (frame, response_ty) = match update.chunks.pop_front() {
            Some(chunk) => (chunk.to_frame()?, firmware::ty::CHUNK_RSP),
            None => (Frame::pack(&firmware::Finish)?, firmware::ty::FINISH_RSP),
        };

        self.continue_firmware(frame, response_ty);
        Ok(())
    }

    fn continue_firmware(&mut self, frame: Frame, response_ty: u16) {
        if let Err(err) = self.dispatcher.request(frame, response_ty, None, None) {
            warn!("Firmware update aborted: {err}");
            self.firmware = None;
        }
    }


    /// Maximum fan speed on outdoor air for the configured boost time. The 4S runs its own
    /// turbo mode.
    pub fn enable_boost(&mut self) -> bool {
        match self.boost.enable(&mut self.state, &self.traits) {
            Some(action) => self.apply_boost(action),
            None => false,
        }
    }

    pub fn cancel_boost(&mut self) -> bool {
        match self.boost.cancel(&mut self.state, &self.traits) {
            Some(action) => self.apply_boost(action),
            None => false,
        }
    }

    pub fn boost_time_left(&self) -> u16 {
        self.state.boost_time_left
    }

    fn apply_boost(&mut self, action: BoostAction) -> bool {
        match action {
            BoostAction::Write(mut call) => self.write_state(&mut call),
            BoostAction::Native { enable, time } => self.set_turbo(if enable { time } else { 0 }),
        }
    }

    pub fn activate_preset(&mut self, name: &str) -> bool {
        let mut call = StateCall::default();
        if let Err(err) = self.presets.activate(name, &mut call) {
            warn!("{err}");
            return false;
        }

        !call.has_changes() || self.write_state(&mut call)
    }

    /// Feed a CO2 reading, ppm. Adjusts the fan speed while auto mode is on.
    pub fn auto_update(&mut self, co2: u16) -> bool {
        if !self.state.auto_state {
            debug!("Auto mode is off, co2={co2}");
            return false;
        }

        let mut call = StateCall::default();
        if !self.auto.update(co2, &self.state, &self.traits, &mut call) {
            return false;
        }

        self.write_state(&mut call)
    }
}

fn degrade(what: &str, result: Result<(), WriteError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!("{what} failed: {err}");
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use strum::IntoEnumIterator;

    use crate::protocol::t3s::{pack_frame, unpack_frame};
    use crate::state::GatePosition;

    use super::*;

    /// Fan 1, outdoor gate, 23°C, heater, power and sound on, 79 days of filter.
    const STATE_3S: [u8; 20] = [
        0xB3, 0x10, 0x21, 0x17, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x4F,
        0x00, 0x0E, 0x2D, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x5A
    ];

    const STATE_4S: [u8; 35] = [
        0x00, 0x00, 0x00, 0x00, 0x3C, 0x51, 0x00, 0x10, 0x01, 0x0C, 0x17, 0x12, 0x1E, 0x71, 0xEF, 0x29,
        0x00, 0xD8, 0x16, 0x1F, 0x00, 0x28, 0x37, 0xCE, 0x00, 0xFE, 0x56, 0x43, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x06, 0x00
    ];

    const STATE_O2: [u8; 17] = [
        0x0C, 0xFE, 0x0D, 0x0A, 0x02, 0x3C, 0x04, 0x00, 0x00, 0xE0, 0xD7, 0xDC, 0x01, 0x21, 0xF4, 0xCA, 0x01
    ];

    fn breezer(generation: Generation) -> (Breezer, Arc<Mutex<Vec<Frame>>>) {
        let frames = Arc::new(Mutex::new(vec![]));
        let sink = frames.clone();

        let mut breezer = Breezer::new(generation);
        breezer.set_writer(Box::new(move |frame: Frame| {
            sink.lock().unwrap().push(frame);
            true
        }));

        (breezer, frames)
    }

    fn breezer_3s() -> (Breezer, Arc<Mutex<Vec<Frame>>>) {
        let (mut breezer, frames) = breezer(Generation::Tion3s);
        assert!(breezer.read_frame(&unpack_frame(&STATE_3S).expect("frame")));
        (breezer, frames)
    }

    #[test]
    fn test_generation_names() {
        assert_eq!("3S".parse::<Generation>().unwrap(), Generation::Tion3s);
        assert_eq!("lt".parse::<Generation>().unwrap(), Generation::Lite);
        assert_eq!("Lite".parse::<Generation>().unwrap(), Generation::Lite);
        assert_eq!(Generation::Lite.to_string(), "lite");
        assert_eq!(Generation::O2.to_string(), "o2");
        assert!("5s".parse::<Generation>().is_err());

        assert_eq!(Generation::iter().count(), 5);
        assert_eq!(Generation::O2.traits().max_fan_speed, 4);
        assert!(!Generation::Tion3s.is_correlated());
        assert!(Generation::Iq.is_correlated());
    }

    #[test]
    fn test_3s_write_state_vector() {
        let (mut breezer, frames) = breezer_3s();
        assert!(breezer.state().is_initialized());
        assert_eq!(breezer.state().filter_time_left, 79);

        assert!(breezer.write_state(&mut StateCall::new()));

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(pack_frame(&frames[0]).expect("frame"), [
            0x3D, 0x02, 0x01, 0x17, 0x02, 0x0B, 0x00, 0x00, 0x4F, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5A
        ]);
    }

    #[test]
    fn test_write_refused_until_initialized() {
        let (mut breezer, frames) = breezer(Generation::Tion4s);

        let mut call = StateCall { fan_speed: Some(2), ..StateCall::default() };
        assert!(!breezer.write_state(&mut call));
        assert!(!breezer.reset_filter());
        assert!(frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_o2_write_reads_back() {
        let (mut breezer, frames) = breezer(Generation::O2);
        assert!(breezer.read_frame(&Frame::new(0x11, STATE_O2.to_vec())));

        let mut call = StateCall { fan_speed: Some(3), ..StateCall::default() };
        assert!(breezer.write_state(&mut call));

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].ty, 0x02);
        assert_eq!(&frames[0].data[..], &[0x03, 0x0A, 0x00, 0x01, 0x01]);
        assert_eq!(frames[1], Frame::empty(0x01));
    }

    #[test]
    fn test_o2_connect_and_dev_info() {
        let (mut breezer, frames) = breezer(Generation::O2);

        let ready = Arc::new(Mutex::new(false));
        let flag = ready.clone();
        breezer.dispatcher_mut().on_ready = Some(Box::new(move || *flag.lock().unwrap() = true));

        assert!(breezer.connect());
        assert_eq!(frames.lock().unwrap()[0], Frame::empty(0x00));
        assert!(breezer.read_frame(&Frame::new(0x10, vec![0x04, 0x10, 0x01, 0x00])));
        assert!(*ready.lock().unwrap());

        let mut info: Vec<u8> = vec![0x04];
        info.extend([0x00; 15]);
        info.extend([0x08, 0x61, 0x0E, 0x13, 0x04, 0x10, 0xEC, 0x19]);
        assert!(breezer.read_frame(&Frame::new(0x17, info)));

        assert_eq!(breezer.state().hardware_version, 0x6108);
        assert_eq!(breezer.state().firmware_version, 0x130E);
        assert_eq!(breezer.traits().min_target_temperature, -20);
        assert_eq!(breezer.traits().max_target_temperature, 25);
    }

    #[test]
    fn test_4s_state_callback() {
        let (mut breezer, frames) = breezer(Generation::Tion4s);

        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        assert!(breezer.request_state(Some(Box::new(move |rsp: &Response| sink.lock().unwrap().push(rsp.clone())))));
        assert_eq!(frames.lock().unwrap()[0], Frame::empty(0x3232));

        assert!(breezer.read_frame(&Frame::new(0x3231, STATE_4S.to_vec())));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], Response::State(state) if state.fan_speed == 1));
        assert_eq!(breezer.traits().max_heater_power, 140);
    }

    #[test]
    fn test_unknown_frame_is_dropped() {
        let (mut breezer, _) = breezer(Generation::Tion4s);
        assert!(!breezer.read_frame(&Frame::new(0x7777, vec![0x01])));
        // known type, wrong size
        assert!(!breezer.read_frame(&Frame::new(0x3231, vec![0x01])));
        assert!(!breezer.state().is_initialized());
    }

    #[test]
    fn test_host_boost() {
        let (mut breezer, frames) = breezer_3s();

        assert!(breezer.enable_boost());
        assert_eq!(breezer.boost_time_left(), 600);
        assert!(!breezer.enable_boost());

        assert!(breezer.cancel_boost());
        assert_eq!(breezer.boost_time_left(), 0);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        // fan speed, gate
        assert_eq!(&frames[0].data[..3], &[0x06, 0x17, 0x02]);
        assert_eq!(&frames[1].data[..3], &[0x01, 0x17, 0x02]);
    }

    #[test]
    fn test_native_boost() {
        let (mut breezer, frames) = breezer(Generation::Tion4s);
        assert!(breezer.read_frame(&Frame::new(0x3231, STATE_4S.to_vec())));

        assert!(breezer.enable_boost());
        assert_eq!(frames.lock().unwrap()[0], Frame::new(0x4130, vec![0x01, 0x00, 0x00, 0x00, 0x58, 0x02, 0x00]));

        assert!(breezer.read_frame(&Frame::new(0x4131, vec![0x01, 0x00, 0x00, 0x00, 0x01, 0x58, 0x02, 0x00])));
        assert_eq!(breezer.boost_time_left(), 600);
    }

    #[test]
    fn test_presets() {
        let (mut breezer, frames) = breezer_3s();

        let night = PresetData { fan_speed: 2, gate_position: GatePosition::Indoor, ..PresetData::default() };
        breezer.add_preset("night", night).expect("preset");
        assert_eq!(breezer.presets().names(), vec!["none", "night"]);

        assert!(breezer.activate_preset("night"));
        assert!(!breezer.activate_preset("away"));
        assert_eq!(breezer.presets().active(), "night");

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        // fan 2, indoor air turns the heater off
        assert_eq!(&frames[0].data[..4], &[0x02, 0x17, 0x00, 0x0A]);
    }

    #[test]
    fn test_auto_update() {
        let (mut breezer, frames) = breezer_3s();
        breezer.setup_auto(700, 2, 4);

        // auto mode off
        assert!(!breezer.auto_update(450));

        let mut data = STATE_3S;
        data[4] |= 0x10;
        assert!(breezer.read_frame(&unpack_frame(&data).expect("frame")));
        assert!(breezer.state().auto_state);

        assert!(breezer.auto_update(450));
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data[0], 2);
    }

    #[test]
    fn test_firmware_update() {
        let (mut breezer, frames) = breezer(Generation::Tion4s);

        let image = Bytes::from(vec![0x55; 600]);
        assert!(breezer.update_firmware(image));

        let replies = [
            Frame::new(0x4004, vec![0x03, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]),
            Frame::empty(0x400C),
            Frame::empty(0x400B),
            Frame::empty(0x400B),
            Frame::empty(0x400B),
            Frame::empty(0x400D),
        ];
        for reply in &replies {
            assert!(breezer.read_frame(reply));
        }

        let frames = frames.lock().unwrap();
        let types: Vec<u16> = frames.iter().map(|frame| frame.ty).collect();
        assert_eq!(types, vec![0x400E, 0x4005, 0x4006, 0x4006, 0x4006, 0x4007]);
        assert_eq!(frames[2].data.len(), 4 + 512);
        assert_eq!(frames[3].data.len(), 4 + 88);
        assert_eq!(&frames[4].data[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_4s_timers() {
        let (mut breezer, frames) = breezer(Generation::Tion4s);

        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        breezer.dispatcher_mut().on_timer = Some(Box::new(move |timer: &protocol::t4s::Timer, request_id: u32| {
            sink.lock().unwrap().push((timer.timer_id, request_id));
        }));

        assert!(breezer.request_timers());
        assert!(!breezer.request_timer(12, None));
        {
            let frames = frames.lock().unwrap();
            assert_eq!(frames.len(), 12);
            assert!(frames.iter().all(|frame| frame.ty == 0x3432));
            assert_eq!(&frames[0].data[..], &[0x01, 0x00, 0x00, 0x00, 0x00]);
            assert_eq!(&frames[11].data[..], &[0x0C, 0x00, 0x00, 0x00, 0x0B]);
        }

        // timer 11, monday and sunday at 07:30
        let reply = vec![0x0C, 0x00, 0x00, 0x00, 0x0B, 0x41, 0x07, 0x1E, 0x11, 0x14, 0x02, 0x00];
        assert!(breezer.read_frame(&Frame::new(0x3431, reply)));
        assert_eq!(*seen.lock().unwrap(), vec![(11, 12)]);
    }

    #[test]
    fn test_4s_set_timer() {
        use protocol::t4s::{Timer, TimerResponse};

        let (mut breezer, frames) = breezer(Generation::Tion4s);

        let timer = Timer { timer_id: 2, hours: 6, fan_speed: 3, ..Timer::default() };
        assert!(breezer.set_timer(timer));
        assert!(!breezer.set_timer(Timer { timer_id: 12, ..timer }));

        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        assert!(breezer.request_timer(2, Some(Box::new(move |rsp: &Response| sink.lock().unwrap().push(rsp.clone())))));

        {
            let frames = frames.lock().unwrap();
            assert_eq!(frames.len(), 2);
            assert_eq!(frames[0], Frame::new(0x3430, vec![0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, 0x00, 0x03, 0x00]));
            assert_eq!(frames[1], Frame::new(0x3432, vec![0x02, 0x00, 0x00, 0x00, 0x02]));
        }

        let reply = Frame::pack(&Correlated::new(2, TimerResponse(timer))).expect("pack");
        assert!(breezer.read_frame(&reply));
        assert_eq!(*seen.lock().unwrap(), vec![Response::Timer(timer)]);
    }

    #[test]
    fn test_4s_save_state() {
        let (mut breezer, frames) = breezer(Generation::Tion4s);
        assert!(!breezer.save_state());

        assert!(breezer.read_frame(&Frame::new(0x3231, STATE_4S.to_vec())));
        assert!(breezer.save_state());

        let expected = breezer.encode_write_state(breezer.state(), 1).expect("encode");
        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].ty, 0x3234);
        assert_eq!(frames[0].data, expected.data);
    }

    #[test]
    fn test_lite_service_requests() {
        let (mut breezer, frames) = breezer(Generation::Lite);

        assert!(breezer.request_test());
        assert!(breezer.request_autokiv_params());
        assert!(!breezer.set_alarm(true));
        assert!(!breezer.request_timers());
        assert!(breezer.dispatcher_mut().is_awaiting(0x2222));

        assert!(breezer.read_frame(&Frame::new(0x2222, vec![0x01])));
        assert!(!breezer.dispatcher_mut().is_awaiting(0x2222));
        assert!(breezer.dispatcher_mut().is_awaiting(0x1241));

        let types: Vec<u16> = frames.lock().unwrap().iter().map(|frame| frame.ty).collect();
        assert_eq!(types, vec![0x1111, 0x1242]);
    }

    #[test]
    fn test_3s_alarm_and_timers() {
        let (mut breezer, frames) = breezer_3s();

        assert!(breezer.set_alarm(true));
        assert!(breezer.set_alarm(false));
        assert!(breezer.request_timers());
        assert!(!breezer.save_state());
        assert!(!breezer.request_test());
        assert!(!breezer.request_timer(0, None));

        let types: Vec<u16> = frames.lock().unwrap().iter().map(|frame| frame.ty).collect();
        assert_eq!(types, vec![0x0A3D, 0x0B3D, 0x043D]);
        assert!(breezer.dispatcher_mut().is_awaiting(0x40B3));
    }

    #[test]
    fn test_unsupported_requests() {
        let (mut breezer, frames) = breezer(Generation::Iq);
        assert!(!breezer.set_turbo(60));
        assert!(!breezer.pair());
        assert!(!breezer.update_firmware(Bytes::from_static(&[0x00])));
        assert!(breezer.request_dev_info(None));
        assert_eq!(frames.lock().unwrap().len(), 1);
    }
}
