//! Logging setup

use inferlet_core::{LogFormat, LoggingConfig};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Resolve the effective filter directive; `RUST_LOG` still wins at init time
pub fn level(config: &LoggingConfig, level_override: Option<&str>, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        level_override.unwrap_or(&config.level).to_lowercase()
    }
}

/// Install the global tracing subscriber
pub fn init(config: &LoggingConfig, level_override: Option<&str>, verbose: bool) {
    let level = level(config, level_override, verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    subscriber(config.format, filter, std::io::stdout).init();
}

/// Targets stay on: relayed server output is logged under `container`
fn subscriber<W>(format: LogFormat, filter: EnvFilter, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    match format {
        LogFormat::Text => Box::new(builder.finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_level_resolution() {
        let config = LoggingConfig::default();
        assert_eq!(level(&config, None, false), "info");
        assert_eq!(level(&config, Some("WARN"), false), "warn");
        assert_eq!(level(&config, Some("warn"), true), "debug");
    }

    #[test]
    fn test_relayed_output_keeps_its_target() {
        for format in [LogFormat::Text, LogFormat::Compact] {
            let captured = Captured::default();
            let subscriber = subscriber(format, EnvFilter::new("info"), captured.clone());
            tracing::subscriber::with_default(subscriber, || {
                tracing::info!(target: "container", "I1016 server.cc:633] ready");
            });

            let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
            assert!(output.contains("container"), "{:?}: {}", format, output);
            assert!(output.contains("I1016 server.cc:633] ready"));
        }
    }
}
