use brick_logger::app::{self, Options};
use brick_logger::logging;
use brick_logger::sim::SimulatedTransport;
use clap::Parser;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;
use tracing::{error, info};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();

    let config = match app::load_config(&options) {
        Ok(config) => config,
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    };

    // Dropping the guard flushes the debug log file
    let log_guard = match logging::init(options.console_log_level, &config.debug.log) {
        Ok(guard) => guard,
        Err(why) => {
            eprintln!(
                "error: could not open log file {}: {}",
                config.debug.log.file_name.display(),
                why
            );
            std::process::exit(EXIT_ERROR);
        }
    };

    let transport = Arc::new(SimulatedTransport::new());
    let out = Box::new(std::io::stdout());

    let code = match app::run_with_io(&options, config, transport, out, shutdown_signal()).await {
        Ok(()) => EXIT_SUCCESS,
        Err(why) => {
            eprintln!("error: {}", why);
            EXIT_ERROR
        }
    };

    // process::exit skips destructors
    drop(log_guard);
    std::process::exit(code);
}
