use std::{process::ExitCode, sync::Arc};

use clap::{error::ErrorKind, Parser};
use tokio_util::sync::CancellationToken;

use hive_light_client::{
    cli::{usage_error, Args},
    controller::progress::{ProgressObserver, ProgressSample},
    logging::init_tracing,
    output::Out,
    session::state::{SessionState, StepObserver},
    transport::NoEngine,
    ControlPlaneClient, LightClient,
};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            println!("{}", Out::error(usage_error(&err)).render(false));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(args.verbose);

    let json = args.json;
    // Terminal states are covered by the final result below.
    let steps = move |state: SessionState| {
        if !state.is_terminal() {
            println!("{}", Out::step(state).render(json));
        }
    };
    let control = ControlPlaneClient::new(args.api_addr.clone());
    let client = LightClient::new(args.session_config(), control, Arc::new(NoEngine))
        .with_step_observer(Arc::new(steps) as Arc<dyn StepObserver>);
    tracing::info!(
        peer_id = %client.peer_id(),
        sharable = %args.sharable,
        "light client started"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, stopping session");
                cancel.cancel();
            }
        }
    });

    let observer = if args.show_progress() {
        let printer = move |sample: ProgressSample| {
            println!("{}", Out::progress(&sample).render(json));
        };
        Some(Arc::new(printer) as Arc<dyn ProgressObserver>)
    } else {
        None
    };
    let result = client
        .run_until(&cancel, &args.sharable, args.info, args.stat, observer)
        .await;

    let out = Out::from(&result);
    println!("{}", out.render(json));
    if out.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
