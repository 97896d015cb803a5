use std::{fmt::Display, io::Write, str::FromStr};

use depot_config::LogConfig;
use miette::Diagnostic;
use nu_ansi_term::Color::{self, Blue, Magenta, Red, Yellow};
use thiserror::Error;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    registry::LookupSpan,
};

#[derive(Error, Diagnostic, Debug)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    #[diagnostic(
        code(depot_content::logging::level),
        help("Use one of trace, debug, info, warn, error")
    )]
    InvalidLevel(String),

    #[error(transparent)]
    #[diagnostic(code(depot_content::logging::already_set))]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Paints `T` when colour is on.
struct Colored<T: Display>(Option<Color>, T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(color) => {
                write!(f, "{}", color.prefix())?;
                self.1.fmt(f)?;
                write!(f, "{}", color.suffix())
            }
            None => self.1.fmt(f),
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

/// Prints the message with a level prefix. Info has no prefix.
pub struct CustomFormatter {
    color: bool,
}

impl CustomFormatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint<'a>(&self, color: Color, text: &'a str) -> Colored<&'a str> {
        Colored(self.color.then_some(color), text)
    }
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "{} ", self.paint(Magenta, "[TRACE]")),
            Level::DEBUG => write!(writer, "{} ", self.paint(Blue, "[DEBUG]")),
            Level::INFO => write!(writer, ""),
            Level::WARN => write!(writer, "{} ", self.paint(Yellow, "[WARN]")),
            Level::ERROR => write!(writer, "{} ", self.paint(Red, "[ERROR]")),
        }?;

        if let Some(message) = visitor.message {
            writeln!(writer, "{message}")
        } else {
            writeln!(writer)
        }
    }
}

/// Info goes to stdout, everything else to stderr.
struct StdWriter;

impl<'a> MakeWriter<'a> for StdWriter {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Box::new(std::io::stdout())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        if meta.level() == &Level::INFO {
            Box::new(std::io::stdout())
        } else {
            Box::new(std::io::stderr())
        }
    }
}

/// Filter directive enabling `level` for every depot crate.
pub fn filter_directive(level: &str) -> Result<String, LoggingError> {
    let level =
        Level::from_str(level).map_err(|_| LoggingError::InvalidLevel(level.to_string()))?;
    Ok(format!("depot={level}"))
}

/// Installs the process-wide tracing subscriber.
pub fn setup_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter_directive(&config.level)?)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(StdWriter)
        .compact()
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(
            builder
                .event_format(CustomFormatter::new(config.color))
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
