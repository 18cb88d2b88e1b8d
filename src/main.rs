use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::{
    io::{stdin, stdout, BufReader},
    net::TcpListener,
};
use tokio_util::sync::CancellationToken;

use ds::{relay, PeerId, RelayPubSub};
use room_chat::{
    cli::{Args, Commands},
    config::ChatConfig,
    session,
};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ChatConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ChatConfig::default(),
    };
    args.apply(&mut config);
    init_logging(config.debug);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args, config));
    // stdin is read on a blocking thread that never returns on its own
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "info,room_chat=debug,ds=debug"
    } else {
        "warn,room_chat=info,ds=info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

async fn run(args: Args, config: ChatConfig) -> anyhow::Result<()> {
    match args.command {
        Some(Commands::Relay { listen }) => {
            let listener = TcpListener::bind(("0.0.0.0", listen))
                .await
                .with_context(|| format!("binding relay port {listen}"))?;
            let shutdown = CancellationToken::new();
            let ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });
            relay::serve(listener, shutdown).await?;
        }
        None => {
            let url = config.relay_url().to_string();
            let pubsub = RelayPubSub::connect(&url, PeerId::random())
                .await
                .with_context(|| format!("connecting to relay {url}"))?;
            let exit = session::run(
                Arc::new(pubsub),
                &config,
                BufReader::new(stdin()),
                stdout(),
                stdout(),
            )
            .await?;
            info!("Bye ({exit:?})");
        }
    }
    Ok(())
}
