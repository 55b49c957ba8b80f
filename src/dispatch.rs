//! Request bookkeeping between the breezer façade and the transport.
//!
//! Outgoing frames go through a registered writer. Requests that expect an answer are remembered
//! by response type and, for generations that correlate, by request id. When a decoded response
//! arrives the matching request's callback runs once, then the named slot for that kind of
//! response.

use thiserror::Error;
use tracing::{debug, error, trace};

use crate::protocol::devinfo::DevInfo;
use crate::protocol::frame::{Frame, FrameError, DEFAULT_REQUEST_ID};
use crate::protocol::t4s::{Timer, Turbo};
use crate::state::TionState;


#[derive(Error, Debug)]
pub enum WriteError {
    #[error("state is not initialized")]
    NotInitialized,
    #[error("writer is not configured")]
    NoWriter,
    #[error("transport refused frame {0:#06x}")]
    Rejected(u16),
    #[error("{0} is not supported by this breezer")]
    Unsupported(&'static str),
    #[error("no timer {0}")]
    NoSuchTimer(u8),
    #[error(transparent)]
    Frame(#[from] FrameError),
}


/// A decoded response, as handed to request callbacks.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    State(TionState),
    DevInfo(DevInfo),
    Turbo(Turbo),
    Timer(Timer),
    Heartbeat(u8),
    /// Breezer clock: unix time, seconds since midnight on the O2
    Time(i64),
    /// Acknowledgement without content
    Ack,
}

/// Sends one frame, reporting whether the transport took it.
pub type Writer = Box<dyn FnMut(Frame) -> bool + Send>;

pub type Callback = Box<dyn FnOnce(&Response) + Send>;


struct Pending {
    ty: u16,
    /// `None` matches any id
    request_id: Option<u32>,
    callback: Option<Callback>,
}

impl Pending {
    fn matches(&self, ty: u16, request_id: u32) -> bool {
        self.ty == ty && self.request_id.map_or(true, |id| id == request_id)
    }
}


pub struct Dispatcher {
    correlated: bool,
    request_id: u32,
    writer: Option<Writer>,
    pending: Vec<Pending>,

    pub on_state: Option<Box<dyn FnMut(&TionState, u32) + Send>>,
    pub on_dev_info: Option<Box<dyn FnMut(&DevInfo) + Send>>,
    pub on_turbo: Option<Box<dyn FnMut(&Turbo, u32) + Send>>,
    pub on_timer: Option<Box<dyn FnMut(&Timer, u32) + Send>>,
    pub on_heartbeat: Option<Box<dyn FnMut(u8) + Send>>,
    pub on_time: Option<Box<dyn FnMut(i64, u32) + Send>>,
    pub on_ready: Option<Box<dyn FnMut() + Send>>,
}

impl Dispatcher {
    /// `correlated` generations echo request ids; the others always send [`DEFAULT_REQUEST_ID`].
    pub fn new(correlated: bool) -> Self {
        Self {
            correlated,
            request_id: 0,
            writer: None,
            pending: vec![],
            on_state: None,
            on_dev_info: None,
            on_turbo: None,
            on_timer: None,
            on_heartbeat: None,
            on_time: None,
            on_ready: None,
        }
    }

    pub fn set_writer(&mut self, writer: Writer) {
        self.writer = Some(writer);
    }

    pub fn next_request_id(&mut self) -> u32 {
        if !self.correlated {
            return DEFAULT_REQUEST_ID;
        }

        self.request_id = self.request_id.wrapping_add(1);
        self.request_id
    }

    pub fn write(&mut self, frame: Frame) -> Result<(), WriteError> {
        let Some(writer) = self.writer.as_mut() else {
            error!("Writer is not configured");
            return Err(WriteError::NoWriter);
        };

        let ty = frame.ty;
        trace!("Write {:#06x}: {:02x?}", ty, &frame.data[..]);

        if writer(frame) {
            Ok(())
        } else {
            Err(WriteError::Rejected(ty))
        }
    }

    /// Write `frame` and wait for `response_ty`. Once the frame is written, a request still
    /// waiting for the same response type is dropped without its callback running.
    pub fn request(
        &mut self,
        frame: Frame,
        response_ty: u16,
        request_id: Option<u32>,
        callback: Option<Callback>
    ) -> Result<(), WriteError> {
        self.write(frame)?;

        let before = self.pending.len();
        self.pending.retain(|pending| pending.ty != response_ty);
        if self.pending.len() != before {
            debug!("Superseded pending request for {:#06x}", response_ty);
        }

        let request_id = if self.correlated { request_id } else { None };
        self.pending.push(Pending { ty: response_ty, request_id, callback });
        Ok(())
    }

    pub fn is_awaiting(&self, response_ty: u16) -> bool {
        self.pending.iter().any(|pending| pending.ty == response_ty)
    }

    /// Hand a decoded response to whoever is waiting for it.
    pub fn dispatch(&mut self, ty: u16, request_id: u32, response: &Response) {
        let correlated = self.correlated;
        let found = self.pending.iter()
            .position(|pending| if correlated { pending.matches(ty, request_id) } else { pending.ty == ty });

        match found {
            Some(n) => {
                let pending = self.pending.remove(n);
                debug!("Response {:#06x} [{}] matched", ty, request_id);
                if let Some(callback) = pending.callback {
                    callback(response);
                }
            },
            None => debug!("Unsolicited response {:#06x} [{}]", ty, request_id),
        }

        match response {
            Response::State(state) => {
                if let Some(on_state) = self.on_state.as_mut() {
                    on_state(state, request_id);
                }
            },
            Response::DevInfo(info) => {
                if let Some(on_dev_info) = self.on_dev_info.as_mut() {
                    on_dev_info(info);
                }
            },
            Response::Turbo(turbo) => {
                if let Some(on_turbo) = self.on_turbo.as_mut() {
                    on_turbo(turbo, request_id);
                }
            },
            Response::Timer(timer) => {
                if let Some(on_timer) = self.on_timer.as_mut() {
                    on_timer(timer, request_id);
                }
            },
            Response::Heartbeat(work_mode) => {
                if let Some(on_heartbeat) = self.on_heartbeat.as_mut() {
                    on_heartbeat(*work_mode);
                }
            },
            Response::Time(time) => {
                if let Some(on_time) = self.on_time.as_mut() {
                    on_time(*time, request_id);
                }
            },
            Response::Ack => {},
        }
    }

    /// The transport is up and the first requests may go out.
    pub fn notify_ready(&mut self) {
        if let Some(on_ready) = self.on_ready.as_mut() {
            on_ready();
        }
    }
}
