//! # MapServer module
//!
//! Serves the map image and its attributes to viewers over a REP socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Instant;

use chrono::Utc;
use comms_if::{
    map::{MapFrame, MapRequest, MapResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::{debug, info, warn};

use crate::{
    bus_client::MessageBusClient,
    params::MapExecParams,
    pipeline::MapPipeline,
    renderer::MapRenderer,
    scheduler::Throttle,
    snapshot_store::SnapshotStore,
};
use util::time::seconds_to_std_duration;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The networking side of the map executable.
///
/// Viewers connect with a REQ socket. Every request gets exactly one response, including ones that
/// can't be understood.
pub struct MapServer {
    ctx: zmq::Context,

    endpoint: String,

    /// REP socket which accepts requests from viewers, `None` while it is being reopened
    socket: Option<MonitoredSocket>,

    /// Frames handed to viewers, rebuilt at most once per throttle interval
    frames: Throttle<MapFrame>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`MapServer`]
#[derive(thiserror::Error, Debug)]
pub enum MapServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not serialize the response: {0}")]
    SerializeError(serde_json::Error),

    #[error("Could not send data to the viewer: {0}")]
    SendError(zmq::Error),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl MapServer {
    /// Create a new instance of the map server.
    ///
    /// This function will not wait for a viewer to connect before returning.
    pub fn new(ctx: &zmq::Context, params: &MapExecParams) -> Result<Self, MapServerError> {
        let socket = open_socket(ctx, &params.server_endpoint)?;

        Ok(Self {
            ctx: ctx.clone(),
            endpoint: params.server_endpoint.clone(),
            socket: Some(socket),
            frames: Throttle::new(seconds_to_std_duration(params.image_throttle_s)),
        })
    }

    /// Handle one request if a viewer has sent one.
    ///
    /// Returns `true` if a request was handled.
    pub fn serve<B, R, S>(
        &mut self,
        pipeline: &mut MapPipeline<B, R, S>,
    ) -> Result<bool, MapServerError>
    where
        B: MessageBusClient,
        R: MapRenderer,
        S: SnapshotStore,
    {
        if self.socket.is_none() {
            self.reset_socket();
            return Ok(false);
        }

        let received = match self.socket {
            Some(ref s) => s.recv_msg(0),
            None => return Ok(false),
        };

        let msg = match received {
            Ok(m) => m,
            Err(e) if !needs_reset(&e) => return Ok(false),
            Err(e) => {
                warn!("Could not receive from the viewer socket, reopening it: {}", e);
                self.reset_socket();
                return Ok(false);
            }
        };

        let response = match serde_json::from_slice::<MapRequest>(&msg) {
            Ok(request) => {
                debug!("Got request from viewer: {:?}", request);
                handle_request(request, pipeline, &mut self.frames, Instant::now())
            }
            Err(e) => {
                warn!("Could not deserialize request: {}", e);
                MapResponse::Error(format!("Invalid request: {}", e))
            }
        };

        self.send_response(&response)?;

        Ok(true)
    }

    /// Send the given response to the viewer.
    ///
    /// A REP socket which failed to send can't receive again, so on failure it is reopened.
    fn send_response(&mut self, response: &MapResponse) -> Result<(), MapServerError> {
        let resp_str = serde_json::to_string(response).map_err(MapServerError::SerializeError)?;

        let result = match self.socket {
            Some(ref s) => s.send(resp_str.as_str(), 0),
            None => Err(zmq::Error::ENOTSOCK),
        };

        if let Err(ref e) = result {
            warn!("Could not send the response, reopening the viewer socket: {}", e);
            self.reset_socket();
        }

        result.map_err(MapServerError::SendError)
    }

    /// Close the viewer socket and open a new one on the same endpoint.
    ///
    /// If the new socket can't be opened the server has no socket until the next call to
    /// [`MapServer::serve`], which tries again.
    fn reset_socket(&mut self) {
        // Dropped first so the endpoint is free to bind again
        self.socket = None;

        match open_socket(&self.ctx, &self.endpoint) {
            Ok(s) => {
                info!("Viewer socket reopened on {}", self.endpoint);
                self.socket = Some(s);
            }
            Err(e) => warn!("Could not reopen the viewer socket: {}", e),
        }
    }
}

impl From<MonitoredSocketError> for MapServerError {
    fn from(e: MonitoredSocketError) -> Self {
        MapServerError::SocketError(e)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn open_socket(
    ctx: &zmq::Context,
    endpoint: &str,
) -> Result<MonitoredSocket, MonitoredSocketError> {
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        linger: 0,
        recv_timeout: 10,
        send_timeout: 10,
        ..Default::default()
    };

    MonitoredSocket::new(ctx, zmq::REP, socket_options, endpoint)
}

/// True if the socket can't be used again after this error. A timeout only means no viewer sent
/// anything.
fn needs_reset(e: &zmq::Error) -> bool {
    *e != zmq::Error::EAGAIN
}

/// Build the response to a viewer's request.
pub fn handle_request<B, R, S>(
    request: MapRequest,
    pipeline: &mut MapPipeline<B, R, S>,
    frames: &mut Throttle<MapFrame>,
    now: Instant,
) -> MapResponse
where
    B: MessageBusClient,
    R: MapRenderer,
    S: SnapshotStore,
{
    match request {
        MapRequest::Image => {
            let frame = frames.get(now, || MapFrame::from_png(pipeline.image(), Utc::now()));
            MapResponse::Image(frame.clone())
        }
        MapRequest::Attributes => MapResponse::Attributes(pipeline.attributes()),
        MapRequest::TurnOn => match pipeline.start() {
            Ok(()) => {
                frames.invalidate();
                info!("Map turned on");
                MapResponse::Ack
            }
            Err(e) => {
                warn!("Could not turn the map on: {}", e);
                MapResponse::Error(e.to_string())
            }
        },
        MapRequest::TurnOff => {
            pipeline.stop();
            frames.invalidate();
            info!("Map turned off");
            MapResponse::Ack
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::pipeline::test::{harness, payload};
    use std::time::Duration;

    #[test]
    fn test_image_requests_are_throttled() {
        let mut h = harness(0);
        let mut frames = Throttle::new(Duration::from_secs(5));
        let start = Instant::now();

        h.push(Some(payload(20, 10, "a", true)));
        let first_png = h.update();

        let first = match handle_request(MapRequest::Image, &mut h.pipeline, &mut frames, start) {
            MapResponse::Image(f) => f,
            r => panic!("Unexpected response {:?}", r),
        };
        assert_eq!(first.to_png().unwrap(), first_png);

        // A new image within the interval isn't seen yet
        h.push(Some(payload(30, 10, "b", true)));
        let second_png = h.update();
        assert_ne!(second_png, first_png);

        let later = start + Duration::from_secs(1);
        match handle_request(MapRequest::Image, &mut h.pipeline, &mut frames, later) {
            MapResponse::Image(f) => assert_eq!(f, first),
            r => panic!("Unexpected response {:?}", r),
        }

        let later = start + Duration::from_secs(5);
        match handle_request(MapRequest::Image, &mut h.pipeline, &mut frames, later) {
            MapResponse::Image(f) => assert_eq!(f.to_png().unwrap(), second_png),
            r => panic!("Unexpected response {:?}", r),
        }
    }

    #[test]
    fn test_socket_errors() {
        assert!(!needs_reset(&zmq::Error::EAGAIN));
        assert!(needs_reset(&zmq::Error::EFSM));
        assert!(needs_reset(&zmq::Error::ETERM));
        assert!(needs_reset(&zmq::Error::ENOTSOCK));
    }

    #[test]
    fn test_missing_socket_is_reopened() {
        let ctx = zmq::Context::new();
        let endpoint = "inproc://map-server-reopen";
        let mut server = MapServer {
            ctx: ctx.clone(),
            endpoint: endpoint.into(),
            socket: None,
            frames: Throttle::new(Duration::from_secs(5)),
        };
        let mut h = harness(0);

        assert!(!server.serve(&mut h.pipeline).unwrap());
        assert!(server.socket.is_some());

        // The reopened socket answers viewers
        let client = ctx.socket(zmq::REQ).unwrap();
        client.set_linger(0).unwrap();
        client.set_rcvtimeo(2000).unwrap();
        client.connect(endpoint).unwrap();
        client
            .send(serde_json::to_string(&MapRequest::Attributes).unwrap().as_str(), 0)
            .unwrap();

        let mut served = false;
        for _ in 0..200 {
            if server.serve(&mut h.pipeline).unwrap() {
                served = true;
                break;
            }
        }
        assert!(served);

        let reply = client.recv_msg(0).unwrap();
        match serde_json::from_slice::<MapResponse>(&reply).unwrap() {
            MapResponse::Attributes(a) => assert_eq!(a, h.pipeline.attributes()),
            r => panic!("Unexpected response {:?}", r),
        }
    }

    #[test]
    fn test_turn_on_off() {
        let mut h = harness(0);
        let mut frames = Throttle::new(Duration::from_secs(5));
        let now = Instant::now();

        assert_eq!(
            handle_request(MapRequest::TurnOff, &mut h.pipeline, &mut frames, now),
            MapResponse::Ack
        );
        assert!(!h.pipeline.should_poll());
        assert!(!h.bus.borrow().started);

        assert_eq!(
            handle_request(MapRequest::TurnOn, &mut h.pipeline, &mut frames, now),
            MapResponse::Ack
        );
        assert!(h.pipeline.should_poll());
        assert!(h.bus.borrow().started);
    }

    #[test]
    fn test_attributes() {
        let mut h = harness(0);
        let mut frames = Throttle::new(Duration::from_secs(5));

        h.push(Some(payload(20, 10, "abc", true)));
        h.update();

        match handle_request(MapRequest::Attributes, &mut h.pipeline, &mut frames, Instant::now()) {
            MapResponse::Attributes(a) => {
                assert_eq!(a, h.pipeline.attributes());
                assert_eq!(a.vacuum_json_id.as_deref(), Some("abc"));
            }
            r => panic!("Unexpected response {:?}", r),
        }
    }
}
