use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{Level, LevelFilter};
use serde::Serialize;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evpipe::schema::{Field, WireKind};
use evpipe::{NullSink, PackSettings, Registry, SchemaDefinition, Template};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct SchemaSummary {
    templates: Vec<TemplateSummary>,
    providers: Vec<ProviderSummary>,
}

#[derive(Debug, Serialize)]
struct TemplateSummary {
    name: String,
    estimated_inline_size: usize,
    fields: Vec<FieldSummary>,
}

#[derive(Debug, Serialize)]
struct FieldSummary {
    name: String,
    kind: &'static str,
    in_type: Option<String>,
    count: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProviderSummary {
    name: String,
    pretty_name: String,
    events: Vec<EventSummary>,
}

#[derive(Debug, Serialize)]
struct EventSummary {
    symbol: String,
    value: u32,
    version: u8,
    level: String,
    keywords: String,
    template: Option<String>,
}

struct EvpipeSchema {
    input: PathBuf,
    output_format: OutputFormat,
    output: Box<dyn Write>,
    settings: PackSettings,
    verbosity_level: Option<Level>,
}

impl EvpipeSchema {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .context("an input schema is required")?,
        );

        let output_format = match matches.get_one::<String>("output-format").map(String::as_str) {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let mut settings = PackSettings::new();
        if let Some(allowance) = matches.get_one::<usize>("string-allowance") {
            settings = settings.string_allowance(*allowance);
        }

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => Box::new(Self::create_output_file(path)?),
            None => Box::new(io::stdout()),
        };

        Ok(EvpipeSchema {
            input,
            output_format,
            output,
            settings,
            verbosity_level,
        })
    }

    /// Main entry point for `EvpipeSchema`
    pub fn run(&mut self) -> Result<()> {
        self.try_to_initialize_logging();

        let text = fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read schema at: {}", self.input.display()))?;
        let definition = SchemaDefinition::from_json(&text)
            .with_context(|| format!("Failed to parse schema at: {}", self.input.display()))?;
        let registry = Registry::init_all(&definition, &NullSink, &self.settings.resolve_options())
            .with_context(|| format!("Invalid schema at: {}", self.input.display()))?;

        let summary = summarize(&registry);
        match self.output_format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.output, &summary)?;
                writeln!(self.output)?;
            }
            OutputFormat::Text => write_text(&mut self.output, &summary)?,
        }
        self.output.flush()?;
        Ok(())
    }

    fn create_output_file(path: impl AsRef<Path>) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        File::create(p).with_context(|| format!("Failed to create output file at: {}", p.display()))
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {:?}", e);
            }
        } else {
            log::set_max_level(LevelFilter::Off);
        }
    }
}

fn summarize_field(field: &Field) -> FieldSummary {
    let count = match &field.kind {
        WireKind::CountedArray { count, .. } => Some(count.name.clone()),
        WireKind::StructBlob { count, .. } => count.as_ref().map(|c| c.name.clone()),
        _ => None,
    };
    FieldSummary {
        name: field.name.clone(),
        kind: field.kind.describe(),
        in_type: field.in_type.map(|t| t.name().to_owned()),
        count,
    }
}

fn summarize_template(template: &Template) -> TemplateSummary {
    TemplateSummary {
        name: template.name().to_owned(),
        estimated_inline_size: template.estimated_inline_size(),
        fields: template.fields().iter().map(summarize_field).collect(),
    }
}

fn summarize(registry: &Registry) -> SchemaSummary {
    let mut templates: Vec<TemplateSummary> = registry
        .schema()
        .templates()
        .iter()
        .map(|t| summarize_template(t))
        .collect();
    templates.sort_by(|a, b| a.name.cmp(&b.name));

    let providers = registry
        .providers()
        .iter()
        .map(|provider| ProviderSummary {
            name: provider.name().to_owned(),
            pretty_name: provider.pretty_name(),
            events: provider
                .events()
                .iter()
                .map(|event| EventSummary {
                    symbol: event.symbol().to_owned(),
                    value: event.value(),
                    version: event.version(),
                    level: event.level().to_string(),
                    keywords: format!("{:#x}", event.keywords()),
                    template: event.template().map(|t| t.name().to_owned()),
                })
                .collect(),
        })
        .collect();

    SchemaSummary {
        templates,
        providers,
    }
}

fn write_text(out: &mut dyn Write, summary: &SchemaSummary) -> io::Result<()> {
    for template in &summary.templates {
        writeln!(
            out,
            "template {} ({} bytes inline)",
            template.name, template.estimated_inline_size
        )?;
        for field in &template.fields {
            write!(out, "  {}: {}", field.name, field.kind)?;
            if let Some(in_type) = &field.in_type {
                write!(out, " {}", in_type)?;
            }
            if let Some(count) = &field.count {
                write!(out, " [{}]", count)?;
            }
            writeln!(out)?;
        }
    }

    for provider in &summary.providers {
        writeln!(out, "provider {} ({})", provider.name, provider.pretty_name)?;
        for event in &provider.events {
            writeln!(
                out,
                "  {} value={} version={} level={} keywords={} template={}",
                event.symbol,
                event.value,
                event.version,
                event.level,
                event.keywords,
                event.template.as_deref().unwrap_or("-")
            )?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = Command::new("EventPipe schema inspector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Validates an event schema and prints its resolved templates and providers")
        .arg(Arg::new("INPUT").required(true).help("Schema definition (JSON)."))
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Sets the output format"),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .help("Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                       Will create parent directories if needed."),
        )
        .arg(
            Arg::new("string-allowance")
                .long("string-allowance")
                .value_parser(clap::value_parser!(usize))
                .help("Bytes budgeted per string field when estimating inline sizes."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace."),
        )
        .get_matches();

    let mut app = EvpipeSchema::from_cli_matches(&matches)?;
    app.run()
}
