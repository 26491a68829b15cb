mod args;
mod logging;

use std::time::Duration;

use anyhow::Context;
use args::parse_args;
use logging::setup_logging;
use mission_tracker::{
    TrackerError,
    auth::{CredentialManager, TokenExchange},
    callback::CallbackListener,
    config::Config,
    eve::{EsiClient, SsoClient},
    poller::{PollSession, run_poll_loop},
    store::JsonFile,
    tracker::ActivityTracker,
};

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Runs the browser login. Returns `false` if the user cancelled the wait.
async fn login<E: TokenExchange>(
    config: &Config,
    credentials: &mut CredentialManager<E>,
    callback_timeout: Duration,
    open_browser: bool,
) -> mission_tracker::Result<bool> {
    // Bind before the URL is handed out so the redirect has somewhere to land.
    let listener =
        CallbackListener::bind(&config.callback_bind_address()?, config.callback_path()).await?;

    let request = credentials.begin_authorization();
    if !open_browser {
        tracing::info!("Open this URL in a browser to log in: {}", &request.url);
    } else if let Err(err) = webbrowser::open(&request.url) {
        tracing::warn!("Could not launch a browser: {}", err);
        tracing::info!("Open this URL in a browser to log in: {}", &request.url);
    } else {
        tracing::info!("Opened the login page in the default browser");
    }

    let code = match listener
        .wait_for_code(&request.state, callback_timeout, shutdown_signal())
        .await
    {
        Ok(code) => code,
        Err(TrackerError::CallbackCancelled) => return Ok(false),
        Err(err) => return Err(err),
    };

    credentials
        .complete_authorization(&code.state, &code.code)
        .await?;

    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    setup_logging(&args.base_log_dir, args.log_level);

    let config = Config::load(&args.config).context("Failed to load configuration")?;

    let credentials = CredentialManager::new(
        &config,
        SsoClient::new(&config)?,
        JsonFile::new(&args.token_file),
    )?;
    let tracker = ActivityTracker::open(JsonFile::new(&args.state_file))?;
    let mut session = PollSession::new(
        credentials,
        EsiClient::new(&config)?,
        tracker,
        chrono::Duration::seconds(args.rate_window as i64),
    );

    if args.login {
        session.logout()?;
    }

    let poll_interval = Duration::from_secs(args.poll_interval);
    let callback_timeout = Duration::from_secs(args.callback_timeout);

    loop {
        if session.credentials_mut().credential().is_none() {
            let logged_in = login(
                &config,
                session.credentials_mut(),
                callback_timeout,
                !args.no_browser,
            )
            .await
            .context("Login failed")?;
            if !logged_in {
                tracing::info!("Login cancelled, exiting");
                return Ok(());
            }
        }

        tracing::info!("Polling every {}s...", args.poll_interval);
        match run_poll_loop(&mut session, poll_interval, shutdown_signal()).await {
            Ok(()) => break,
            Err(err) if err.needs_login() => {
                session.logout()?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    tracing::info!("Tracker stopped");
    Ok(())
}
