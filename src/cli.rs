use crate::config::load_config;
use crate::job::render_pattern;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Parser, Debug)]
#[command(name = "mapgen", version, about = "Render a map pattern with icons and labels to PNG")]
pub struct Args {
    /// Pattern JSON file (e.g. data/pattern/pattern_042.json)
    pub pattern: PathBuf,

    /// Config JSON file
    #[arg(short = 'c', long = "config", default_value = "appsettings.json")]
    pub config: PathBuf,

    /// Output PNG. Defaults to {OutputFolder}/{id}.png.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Label language, overriding I18nLang
    #[arg(long = "lang")]
    pub lang: Option<String>,

    /// Per-item debug logging
    #[arg(long = "verbose")]
    pub verbose: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    // Must precede load_config, which warns about malformed entries.
    let filter = init_logging(args.verbose);
    let mut config = load_config(&args.config)?;
    if config.verbose
        && !args.verbose
        && let Some(filter) = &filter
    {
        raise_to_debug(filter);
    }

    if let Some(lang) = args.lang.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        config.i18n_lang = lang.to_string();
    }
    let rendered = render_pattern(config, &args.pattern, args.output.as_deref())?;
    for failed in rendered.report.failures() {
        tracing::warn!(pass = %failed.name, "pass did not complete");
    }
    println!("{}", rendered.output.display());
    Ok(())
}

fn log_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into())
}

fn subscriber<W>(verbose: bool, writer: W) -> (impl Subscriber + Send + Sync, FilterHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(log_filter(verbose));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    (subscriber, handle)
}

fn init_logging(verbose: bool) -> Option<FilterHandle> {
    let (subscriber, handle) = subscriber(verbose, std::io::stderr);
    subscriber.try_init().ok()?;
    Some(handle)
}

/// `"Verbose": true` in the config turns on debug output after startup.
fn raise_to_debug(filter: &FilterHandle) {
    if let Err(err) = filter.reload(log_filter(true)) {
        tracing::warn!(error = %err, "could not raise log level");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn malformed_override_warns_during_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        std::fs::write(
            &path,
            r#"{
                "BackgroundPath": "bg.png",
                "SummaryPath": "summary.json",
                "Verbose": true,
                "LabelOverrides": { "Castle": { "ByCoord": { "abc": { "dx": 1, "dy": 2 } } } }
            }"#,
        )
        .unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let (subscriber, filter) = subscriber(false, move || writer.clone());
        tracing::subscriber::with_default(subscriber, || {
            let config = load_config(&path).unwrap();
            assert!(config.verbose);
            tracing::debug!("before raise");
            raise_to_debug(&filter);
            tracing::debug!("after raise");
        });

        let logs = captured.text();
        assert!(logs.contains("ignoring placement entry"), "{logs}");
        assert!(logs.contains("LabelOverrides.Castle.ByCoord[abc]"), "{logs}");
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(!logs.contains("before raise"));
            assert!(logs.contains("after raise"));
        }
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "mapgen",
            "pattern_007.json",
            "-c",
            "cfg/appsettings.json",
            "--lang",
            "fr",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(args.pattern, PathBuf::from("pattern_007.json"));
        assert_eq!(args.config, PathBuf::from("cfg/appsettings.json"));
        assert_eq!(args.lang.as_deref(), Some("fr"));
        assert!(args.verbose);
        assert!(args.output.is_none());
    }

    #[test]
    fn config_defaults_to_appsettings() {
        let args = Args::try_parse_from(["mapgen", "p.json", "-o", "out/map.png"]).unwrap();
        assert_eq!(args.config, PathBuf::from("appsettings.json"));
        assert_eq!(args.output, Some(PathBuf::from("out/map.png")));
    }

    #[test]
    fn pattern_is_required() {
        assert!(Args::try_parse_from(["mapgen"]).is_err());
    }
}
