use scour::{CleanStyle, Diagnostic, Sanitizer, ScanResult};
use serde::Serialize;
use std::io::{Read, Write};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "SCOUR_LOG";

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Policy(scour::PolicyError),
    Scan(scour::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Policy(err) => write!(f, "Policy error: {err}"),
            CliError::Scan(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<scour::PolicyError> for CliError {
    fn from(value: scour::PolicyError) -> Self {
        Self::Policy(value)
    }
}

impl From<scour::Error> for CliError {
    fn from(value: scour::Error) -> Self {
        Self::Scan(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Default)]
enum Mode {
    #[default]
    Html,
    StyleSheet,
    Inline(String),
}

#[derive(Debug, Default)]
struct Args {
    mode: Mode,
    input: Option<String>,
    policy: Option<String>,
    json: bool,
    pretty: bool,
    messages: bool,
    out: Option<String>,
}

#[derive(Serialize)]
struct MessageOut<'a> {
    kind: &'static str,
    message: &'a str,
}

#[derive(Serialize)]
struct ScanOut<'a> {
    clean: &'a str,
    messages: Vec<MessageOut<'a>>,
    elapsed_ms: f64,
}

struct Outcome {
    clean: String,
    messages: Vec<Diagnostic>,
    elapsed_ms: f64,
}

impl From<ScanResult> for Outcome {
    fn from(result: ScanResult) -> Self {
        let elapsed_ms = result
            .elapsed()
            .num_microseconds()
            .map_or(f64::MAX, |us| us as f64 / 1000.0);
        Self {
            messages: result.messages().to_vec(),
            clean: result.into_clean_html(),
            elapsed_ms,
        }
    }
}

impl Outcome {
    fn from_style(style: CleanStyle, started: Instant) -> Self {
        Self {
            clean: style.css,
            messages: style.messages,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

fn usage() -> &'static str {
    "scour-cli\n\
\n\
USAGE:\n\
  scour-cli [--policy <path>] [--json [--pretty]] [--messages] [--out <path>] [<path>|-]\n\
  scour-cli --css [--policy <path>] [--json [--pretty]] [--messages] [--out <path>] [<path>|-]\n\
  scour-cli --inline <tag> [--policy <path>] [--json [--pretty]] [--messages] [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - Without --policy the built-in policy is used.\n\
  - --css treats the input as a stylesheet; --inline treats it as the style attribute of <tag>.\n\
  - --messages prints diagnostics to stderr; --json prints {clean, messages, elapsed_ms} instead.\n\
  - Set SCOUR_LOG (e.g. SCOUR_LOG=debug) to control log output on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--css" => args.mode = Mode::StyleSheet,
            "--inline" => {
                let Some(tag) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                if tag.trim().is_empty() {
                    return Err(CliError::Usage(usage()));
                }
                args.mode = Mode::Inline(tag.trim().to_string());
            }
            "--policy" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.policy = Some(path.clone());
            }
            "--json" => args.json = true,
            "--pretty" => args.pretty = true,
            "--messages" => args.messages = true,
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.pretty && !args.json {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn open_output(out: Option<&str>) -> Result<Box<dyn Write>, CliError> {
    match out {
        None | Some("-") => Ok(Box::new(std::io::stdout().lock())),
        Some(path) => Ok(Box::new(std::io::BufWriter::new(std::fs::File::create(
            path,
        )?))),
    }
}

fn write_json(value: &impl Serialize, pretty: bool, out: Option<&str>) -> Result<(), CliError> {
    let mut writer = open_output(out)?;
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    let mut writer = open_output(out)?;
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;
    let sanitizer = match args.policy.as_deref() {
        Some(path) => Sanitizer::from_path(path)?,
        None => Sanitizer::default(),
    };

    let started = Instant::now();
    let outcome = match &args.mode {
        Mode::Html => Outcome::from(sanitizer.sanitize(&text)?),
        Mode::StyleSheet => Outcome::from_style(sanitizer.sanitize_style_sheet(&text)?, started),
        Mode::Inline(tag) => {
            Outcome::from_style(sanitizer.sanitize_inline_style(&text, tag)?, started)
        }
    };
    tracing::debug!(
        messages = outcome.messages.len(),
        elapsed_ms = outcome.elapsed_ms,
        "sanitized input"
    );

    if args.json {
        let out = ScanOut {
            clean: &outcome.clean,
            messages: outcome
                .messages
                .iter()
                .map(|m| MessageOut {
                    kind: m.kind().as_str(),
                    message: m.message(),
                })
                .collect(),
            elapsed_ms: outcome.elapsed_ms,
        };
        return write_json(&out, args.pretty, args.out.as_deref());
    }

    write_text(&outcome.clean, args.out.as_deref())?;
    if args.messages {
        let mut stderr = std::io::stderr().lock();
        for message in &outcome.messages {
            writeln!(stderr, "[{}] {}", message.kind(), message)?;
        }
    }
    Ok(())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_logging();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
