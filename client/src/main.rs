use clap::Parser;
use client::input::{parse_console_line, spawn_console_reader, ConsoleAction, HELP_TEXT};
use client::rendering::Renderer;
use client::{ClientConfig, ClientSession};
use log::{debug, info};
use std::time::Duration;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:31222")]
    server: String,

    /// Nickname to play as
    #[arg(short = 'n', long, default_value = "Keeper")]
    nick: String,

    /// Frame interval of the render loop in milliseconds
    #[arg(short = 'f', long, default_value = "16")]
    frame_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ClientConfig {
        server_addr: args.server,
        nick: args.nick,
        frame_interval: Duration::from_millis(args.frame_ms.max(1)),
        ..ClientConfig::default()
    };

    info!("Starting client...");
    info!("Playing as: {}", config.nick);
    println!("{}", HELP_TEXT);

    let mut session = ClientSession::connect(&config).await?;
    let mut renderer = Renderer::new();
    let mut console = spawn_console_reader();
    let mut frame_interval = interval(config.frame_interval);

    loop {
        tokio::select! {
            _ = frame_interval.tick() => {
                let stats = renderer.render(session.render_requests());
                if stats.applied > 0 {
                    debug!("Frame {}: {} requests, {} live meshes", stats.frame, stats.applied, stats.live_meshes);
                }

                for message in session.drain_chat() {
                    println!("{}", message);
                }

                if !session.is_connected() {
                    info!("Connection lost, exiting");
                    break;
                }
            },

            line = console.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_console_line(&line, &config.nick) {
                    Some(ConsoleAction::Notify(notification)) => {
                        session.notifications().push(notification);
                    }
                    Some(ConsoleAction::Help) => println!("{}", HELP_TEXT),
                    Some(ConsoleAction::Quit) => break,
                    None => {}
                }
            },
        }
    }

    session.shutdown().await;
    Ok(())
}
