#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;
use tokio::runtime::Builder;
use tokio::signal;

use strandlight::{
    device::Device,
    effects::EffectLibrary,
    light::{self, LightController, LightState, SharedLight},
    models::Config,
    render::RenderLoop,
    servers,
    transport::{LogBus, MessageBus},
};

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    #[structopt(long)]
    dump_config: bool,
}

async fn run(opts: Opts) -> color_eyre::eyre::Result<()> {
    // Load configuration; without a file the defaults are good to go
    let config = if let Some(config_path) = opts.config_path.as_deref() {
        Config::load_file(config_path).await?
    } else {
        Config::default()
    };

    // Dump configuration if this was asked
    if opts.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // Scan the effect storage
    let library = EffectLibrary::scan(&config.effects.path).await;
    let effects = if config.light.supports_effects {
        library.names().to_vec()
    } else {
        Vec::new()
    };
    info!(effects = ?effects, "effects available");

    // Shared light state and the controller mailbox
    let state = SharedLight::new(LightState::default());
    let (handle, events) = light::channel();

    // The transport: JSON bridge, or log-only when disabled
    let json_server = if config.server.enable {
        Some(servers::bind_json(&config.server, handle.clone()).await?)
    } else {
        None
    };
    let bus: Arc<dyn MessageBus> = match &json_server {
        Some(server) => server.clone(),
        None => Arc::new(LogBus),
    };

    // Controller task: serializes command handling
    let controller = LightController::new(
        config.light.clone(),
        config.topics.clone(),
        effects,
        bus,
        state.clone(),
    );
    tokio::spawn(controller.run(events));

    // Render task: owns the device
    let device = Device::new(&config.device)?;
    let render = RenderLoop::new(
        state,
        device,
        handle,
        library,
        Duration::from_millis(config.light.frame_duration_ms as _),
    );
    tokio::spawn(render.run());

    signal::ctrl_c().await?;

    // Play broker: deliver the last will before going down
    if let Some(server) = json_server {
        server.publish_last_will().await;
    }

    Ok(())
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("STRANDLIGHT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "strandlight=warn,strandlightd=warn",
            1 => "strandlight=info,strandlightd=info",
            2 => "strandlight=debug,strandlightd=debug",
            _ => "strandlight=trace,strandlightd=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime
    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    rt.block_on(run(opts))
}
