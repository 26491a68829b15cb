use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    fmt::{
        self,
        format::{Format, Full},
        time::SystemTime,
    },
    prelude::*,
};

const LOG_FILE_NAME: &str = "mission-tracker.log";

fn build_base_log_format() -> Format<Full, SystemTime> {
    return fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_file(true)
        .with_target(true)
        .with_thread_names(true);
}

/// The tracker logs at `level`; the HTTP client is capped at INFO so token
/// requests are not traced, and everything else only surfaces warnings.
fn build_filter(level: Level) -> Targets {
    let http_level = level.min(Level::INFO);
    Targets::new()
        .with_target("mission_tracker", level)
        .with_target("reqwest", http_level)
        .with_target("hyper_util", http_level)
        .with_default(Level::WARN)
}

pub fn setup_logging(base_log_dir: &str, level: Level) {
    let stdout_layer =
        tracing_subscriber::fmt::layer().event_format(build_base_log_format().with_ansi(true));

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(stdout_layer);

    if base_log_dir != "" {
        let log_file_layer = tracing_subscriber::fmt::layer()
            .event_format(build_base_log_format())
            .with_writer(tracing_appender::rolling::daily(base_log_dir, LOG_FILE_NAME));
        let json_file_layer = tracing_subscriber::fmt::layer()
            .event_format(build_base_log_format().json())
            .with_writer(tracing_appender::rolling::daily(
                format!("{}/structured", base_log_dir),
                LOG_FILE_NAME,
            ));
        subscriber.with(log_file_layer).with(json_file_layer).init();
    } else {
        subscriber.init();
    }
}
