use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use visca::{
    config::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT},
    protocol::{FocusMode, PanTiltRequest},
    Endpoint, Result, ViscaCamera, ViscaConfig, WaitFor,
};

/// VISCA PTZ camera control.
///
/// Examples:
///
///   ptz --ip 192.0.2.1 recall 3
///   ptz --ip 192.0.2.1 --tcp move --pan-speed 12 --tilt-speed 8 --pan 100 --tilt -50
///   ptz --ip 192.0.2.1 position
#[derive(Debug, Parser)]
#[clap(verbatim_doc_comment)]
struct CliParser {
    /// IP address of the camera.
    #[clap(short, long)]
    pub ip: IpAddr,

    /// Port to connect to. Defaults to 52381 for UDP, or 5678 for TCP.
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Send raw VISCA over TCP, rather than VISCA over IP (UDP).
    #[clap(long)]
    pub tcp: bool,

    /// Return once the camera acknowledges a command, rather than waiting for
    /// it to finish.
    #[clap(long)]
    pub no_wait: bool,

    #[clap(subcommand)]
    pub command: CameraCommand,
}

#[derive(Debug, Subcommand)]
enum CameraCommand {
    /// Pan and tilt. Without positions, moves continuously.
    Move {
        #[clap(long, allow_negative_numbers = true, default_value_t = 0)]
        pan_speed: i8,
        #[clap(long, allow_negative_numbers = true, default_value_t = 0)]
        tilt_speed: i8,
        #[clap(long, allow_negative_numbers = true, requires = "tilt")]
        pan: Option<i16>,
        #[clap(long, allow_negative_numbers = true, requires = "pan")]
        tilt: Option<i16>,
        /// Move relative to the current position.
        #[clap(long)]
        relative: bool,
    },
    /// Stop pan and tilt.
    Stop,
    Home,
    Reset,
    /// Zoom continuously (-7 to 7), or to a position.
    Zoom {
        #[clap(long, allow_negative_numbers = true, conflicts_with = "to")]
        speed: Option<i8>,
        #[clap(long)]
        to: Option<u16>,
    },
    Focus {
        #[clap(value_enum)]
        mode: FocusMode,
    },
    Save {
        preset: u8,
    },
    Recall {
        preset: u8,
    },
    Power {
        #[clap(action = clap::ArgAction::Set)]
        on: bool,
    },
    /// Abort the command in a socket (1 or 2).
    Cancel {
        socket: u8,
    },
    /// Show the camera's position, focus mode and power state.
    Position,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .compact()
        .init();
    let opts = CliParser::parse();

    let endpoint = if opts.tcp {
        Endpoint::Tcp(SocketAddr::new(opts.ip, opts.port.unwrap_or(DEFAULT_TCP_PORT)))
    } else {
        Endpoint::Udp(SocketAddr::new(opts.ip, opts.port.unwrap_or(DEFAULT_UDP_PORT)))
    };
    let wait = if opts.no_wait {
        WaitFor::Ack
    } else {
        WaitFor::Completion
    };

    let camera = ViscaCamera::connect(endpoint, ViscaConfig::default()).await?;

    use visca::protocol::Command;
    match opts.command {
        CameraCommand::Move {
            pan_speed,
            tilt_speed,
            pan,
            tilt,
            relative,
        } => {
            let request = PanTiltRequest {
                pan_speed,
                tilt_speed,
                pan_position: pan,
                tilt_position: tilt,
                relative,
            };
            camera.send_with(request.try_into()?, wait).await?;
        }
        CameraCommand::Stop => camera.send_with(Command::PAN_TILT_STOP, wait).await?,
        CameraCommand::Home => camera.send_with(Command::PanTiltHome, wait).await?,
        CameraCommand::Reset => camera.send_with(Command::PanTiltReset, wait).await?,
        CameraCommand::Zoom { speed, to } => {
            let command = match (speed, to) {
                (_, Some(to)) => Command::ZoomDirect(to),
                (speed, None) => Command::Zoom(speed.unwrap_or_default()),
            };
            camera.send_with(command, wait).await?;
        }
        CameraCommand::Focus { mode } => camera.send_with(Command::FocusMode(mode), wait).await?,
        CameraCommand::Save { preset } => {
            camera.send_with(Command::PresetSave(preset), wait).await?
        }
        CameraCommand::Recall { preset } => {
            camera.send_with(Command::PresetRecall(preset), wait).await?
        }
        CameraCommand::Power { on } => camera.send_with(Command::Power(on), wait).await?,
        CameraCommand::Cancel { socket } => camera.cancel(socket).await?,
        CameraCommand::Position => {
            let (pan, tilt) = camera.pan_tilt_position().await?;
            info!("Pan/tilt: {pan}, {tilt}");
            info!("Zoom: {}", camera.zoom_position().await?);
            info!("Focus mode: {:?}", camera.focus_mode().await?);
            info!("Power: {:?}", camera.power_status().await?);
        }
    }

    camera.close().await?;
    Ok(())
}
