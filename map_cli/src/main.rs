//! # Map command line viewer
//!
//! Requests the map image or attributes from a running map executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fs, path::PathBuf};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use comms_if::{
    map::{MapRequest, MapResponse},
    net::{zmq, MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "map_cli", about = "Talk to a running map executable")]
struct Opts {
    /// Endpoint of the map server
    #[structopt(short, long, default_value = "tcp://localhost:5020")]
    endpoint: String,

    #[structopt(subcommand)]
    cmd: Cmd,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, PartialEq, StructOpt)]
enum Cmd {
    /// Save the current map image as a PNG file
    #[structopt(name = "image")]
    Image {
        /// Path to write the image to
        #[structopt(parse(from_os_str))]
        out: PathBuf,
    },

    /// Print the map attributes as JSON
    #[structopt(name = "attributes")]
    Attributes,

    /// Resume map updates
    #[structopt(name = "on")]
    On,

    /// Suspend map updates
    #[structopt(name = "off")]
    Off,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: 2000,
        send_timeout: 100,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(&ctx, zmq::REQ, socket_options, &opts.endpoint)
        .wrap_err("Could not connect to the map server")?;

    let response = send_request(&socket, request_for(&opts.cmd))?;

    match (opts.cmd, response) {
        (Cmd::Image { out }, MapResponse::Image(frame)) => {
            let png = frame.to_png().wrap_err("Invalid image from the server")?;
            fs::write(&out, png).wrap_err_with(|| format!("Could not write {:?}", out))?;
            println!("Map taken at {} saved to {:?}", frame.timestamp, out);
        }
        (Cmd::Attributes, MapResponse::Attributes(attrs)) => {
            println!("{}", serde_json::to_string_pretty(&attrs)?);
        }
        (Cmd::On, MapResponse::Ack) | (Cmd::Off, MapResponse::Ack) => println!("Ok"),
        (_, MapResponse::Error(e)) => return Err(eyre!("Server error: {}", e)),
        (_, r) => return Err(eyre!("Unexpected response: {:?}", r)),
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn request_for(cmd: &Cmd) -> MapRequest {
    match cmd {
        Cmd::Image { .. } => MapRequest::Image,
        Cmd::Attributes => MapRequest::Attributes,
        Cmd::On => MapRequest::TurnOn,
        Cmd::Off => MapRequest::TurnOff,
    }
}

fn send_request(socket: &MonitoredSocket, request: MapRequest) -> Result<MapResponse> {
    let req_str = serde_json::to_string(&request)?;

    socket
        .send(&req_str, 0)
        .wrap_err("Could not send the request")?;

    let msg = socket
        .recv_msg(0)
        .wrap_err("No response from the map server")?;

    serde_json::from_slice(&msg).wrap_err("Could not parse the response")
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
