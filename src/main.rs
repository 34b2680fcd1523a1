use anyhow::Context;
use clap::Parser;
use ctrlc;
use rustyline_async::{Readline, SharedWriter};
use tokio::{sync::watch, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::cli::interactive::run_interactive_cli;

#[macro_use]
extern crate tracing;

#[macro_use]
extern crate prettytable;

mod cli;
mod config;
mod display;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // setup colorful backtraces
    color_backtrace::install();

    let main_args: cli::args::MainArgs = cli::args::MainArgs::parse();

    if main_args.list_ports {
        return list_ports();
    }

    // set up logging and interactive line editor
    let (editor, stdout) =
        Readline::new("fm> ".into()).context("failed to create interactive editor")?;

    let mut targets = tracing_subscriber::filter::Targets::new();

    if let Ok(directives) = std::env::var("RUST_LOG") {
        for directive in directives.split(',') {
            if let Some((target, level)) = directive.split_once('=') {
                targets = targets.with_target(
                    target,
                    level.parse::<LevelFilter>().context("invalid log level")?,
                );
            } else {
                targets = targets.with_default(
                    directive
                        .parse::<LevelFilter>()
                        .context("invalid log level")?,
                );
            }
        }
    }

    let (writer, _guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::hourly("logs", "followme"));

    let reg = tracing_subscriber::registry();

    #[cfg(tokio_unstable)]
    let reg = reg.with(console_subscriber::spawn());

    reg
        // writer that outputs to console
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer({
                    let stdout = stdout.clone();
                    move || stdout.clone()
                })
                .with_filter(targets),
        )
        // writer that outputs to files
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(Targets::new().with_targets(vec![
                    ("followme", LevelFilter::DEBUG),
                    ("fm_gps", LevelFilter::DEBUG),
                    ("fm_msp", LevelFilter::DEBUG),
                    ("fm_follow", LevelFilter::DEBUG),
                ])),
        )
        .init();

    let config_path = main_args
        .config
        .context("no config file given (use --config)")?;

    debug!("reading config from {:?}", &config_path);
    let config = crate::config::FollowMeConfig::read_from_path(&config_path)
        .context("failed to read config file")?;

    run_tasks(config, editor, stdout).await
}

fn list_ports() -> anyhow::Result<()> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("no serial ports found");
    }

    for port in ports {
        println!("{}\t{:?}", port.port_name, port.port_type);
    }

    Ok(())
}

async fn run_tasks(
    config: crate::config::FollowMeConfig,
    editor: Readline,
    stdout: SharedWriter,
) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    ctrlc::set_handler({
        let cancellation_token = cancellation_token.clone();
        move || {
            info!("received interrupt, shutting down");
            cancellation_token.cancel();
        }
    })
    .expect("could not set ctrl+c handler");

    let runtime = config.runtime()?;
    info!(
        "gps {} @ {}, flight controller {} @ {}",
        config.gps.path, runtime.gps_baud, config.msp.path, runtime.msp_baud
    );

    let (config_tx, config_rx) = watch::channel(runtime);

    let mut tasks = Vec::<Box<dyn fm_client::Task>>::new();

    debug!("initializing gps task");
    let gps_task = fm_gps::create_task(config.gps, config_rx.clone())
        .context("failed to initialize gps task")?;
    let fix_rx = gps_task.fixes();
    tasks.push(Box::new(gps_task));

    debug!("initializing msp task");
    let msp_task = fm_msp::create_task(config.msp, config_rx.clone())
        .context("failed to initialize msp task")?;
    let msg_rx = msp_task.messages();
    let req_tx = msp_task.requests();
    tasks.push(Box::new(msp_task));

    debug!("initializing follow task");
    let follow_task = fm_follow::create_task(config.follow, fix_rx, msg_rx, req_tx, config_rx)
        .context("failed to initialize follow task")?;
    let display_rx = follow_task.display();
    tasks.push(Box::new(follow_task));

    debug!("initializing display task");
    let display_task =
        crate::display::create_task(display_rx).context("failed to initialize display task")?;
    tasks.push(Box::new(display_task));

    let mut join_set = JoinSet::new();

    join_set.spawn(run_interactive_cli(
        editor,
        stdout,
        config_tx,
        cancellation_token.clone(),
    ));

    for task in tasks {
        debug!("starting {} task", task.name());
        join_set.spawn(task.run(cancellation_token.clone()));
    }

    while let Some(res) = join_set.join_next().await {
        // if task panicked, then will be Some(Err)
        // if task terminated w/ error, then will be Some(Ok(Err))
        // need to propagate errors in both cases

        match res {
            Err(err) => {
                cancellation_token.cancel();
                return Err(err).context("task failed");
            }
            Ok(Err(err)) => {
                cancellation_token.cancel();
                return Err(err).context("task terminated with error");
            }
            _ => {
                info!("exited task");
            }
        }
    }

    Ok(())
}
