use futures::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Framed;
use url::Url;
use anyhow::{Result, Context, bail};

use crate::breezer::Generation;
use crate::protocol::codec::{O2Codec, O2Side, Serial3sCodec, SerialCodec};
use crate::protocol::frame::Frame;
use crate::protocol::{lite, t4s};


pub const DEFAULT_BAUD_RATE: u32 = 115200;


pub enum Port {
    Serial(SerialStream),
    TcpRaw(TcpStream)
}


pub trait FrameStream: Stream<Item = std::io::Result<Frame>> + Sink<Frame, Error = std::io::Error> + Send + Unpin {}

impl<T> FrameStream for T
where
    T: Stream<Item = std::io::Result<Frame>> + Sink<Frame, Error = std::io::Error> + Send + Unpin,
{}


/// `?baud=` of a serial url.
fn baud_rate(url: &Url) -> Result<u32> {
    match url.query_pairs().find(|(key, _)| key == "baud") {
        Some((_, value)) => value.parse()
            .with_context(|| format!("invalid baud rate {value} in url: {url}")),
        None => Ok(DEFAULT_BAUD_RATE),
    }
}

/// `device` reads requests instead of responses, as the breezer would.
fn framed_io<T>(io: T, generation: Generation, device: bool) -> Result<Box<dyn FrameStream>>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static
{
    let framed: Box<dyn FrameStream> = match generation {
        Generation::Tion3s if device => Box::new(Framed::new(io, Serial3sCodec::device())),
        Generation::Tion3s => Box::new(Framed::new(io, Serial3sCodec::host())),
        Generation::Tion4s => Box::new(Framed::new(io, SerialCodec::new(t4s::SERIAL_FRAME_MAX_SIZE))),
        Generation::Lite => Box::new(Framed::new(io, SerialCodec::new(lite::SERIAL_FRAME_MAX_SIZE))),
        Generation::O2 => {
            let side = if device { O2Side::Device } else { O2Side::Host };
            Box::new(Framed::new(io, O2Codec::new(side)))
        },
        Generation::Iq => bail!("the {generation} breezer is only reachable over radio"),
    };

    Ok(framed)
}


impl Port {
    pub async fn open(url: &Url) -> Result<Self> {
        match url.scheme() {
            "serial" => {
                let path = url.path();
                let baud = baud_rate(url)?;

                let port = tokio_serial::new(path, baud)
                    .data_bits(tokio_serial::DataBits::Eight)
                    .stop_bits(tokio_serial::StopBits::One)
                    .parity(tokio_serial::Parity::None)
                    .open_native_async()
                    .with_context(|| format!("failed to open serial port {path}"))
                    ?;

                Ok(Self::Serial(port))
            },
            "tcp+raw" => {
                let host = url.host_str()
                    .with_context(|| format!("tcp+raw requires a host to be specified in the url: {url}"))?;

                let port = url.port()
                    .with_context(|| format!("tcp+raw requires a port number to be specified in the url: {url}"))?;

                let stream = TcpStream::connect((host, port)).await
                    .with_context(|| format!("failed to open tcp+raw connection to: {url}"))?;

                stream.set_nodelay(true)?;

                Ok(Self::TcpRaw(stream))
            },
            other => {
                bail!("url scheme {other} not supported");
            }
        }
    }

    /// Frames in the serial format of `generation`.
    pub fn framed(self, generation: Generation) -> Result<Box<dyn FrameStream>> {
        match self {
            Port::Serial(port) => framed_io(port, generation, false),
            Port::TcpRaw(stream) => framed_io(stream, generation, false),
        }
    }

    /// Frames seen from the breezer's side of the port, for emulators.
    pub fn framed_device(self, generation: Generation) -> Result<Box<dyn FrameStream>> {
        match self {
            Port::Serial(port) => framed_io(port, generation, true),
            Port::TcpRaw(stream) => framed_io(stream, generation, true),
        }
    }
}
