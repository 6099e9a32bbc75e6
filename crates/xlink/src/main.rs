use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use xlink::cli::{Cli, Commands};
use xlink::config::XlinkConfig;
use xlink::errors::{data_dir_missing, invalid_config, ActionableError};
use xlink::output::{ErrorCode, ExitCode, JsonError, JsonOutput, OutputContext};
use xlink::repair::RepairStats;
use xlink::schema::{DomainSpec, FieldSpec, InversePair, Schema};
use xlink::{Engine, RepairRun};

/// Invalid input is reported as an [`ActionableError`]; anything else that
/// escapes `run` is an unexpected environment failure.
fn error_to_exit_code(error: &anyhow::Error) -> ExitCode {
    if error.downcast_ref::<ActionableError>().is_some() {
        ExitCode::InvalidArgument
    } else {
        ExitCode::ExternalError
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.name();
    let json = cli.json;

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            let code = error_to_exit_code(&e);
            if json {
                match json_error(&e, code, command).to_json_string() {
                    Ok(rendered) => println!("{}", rendered),
                    Err(_) => eprintln!("Error: {}", e),
                }
            } else {
                eprintln!("Error: {}", e);
            }
            code
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

/// Actionable errors keep their headline as the message and their remedies
/// as suggestions.
fn json_error(error: &anyhow::Error, code: ExitCode, command: &str) -> JsonError {
    let code = ErrorCode::for_exit_code(code);
    match error.downcast_ref::<ActionableError>() {
        Some(actionable) => actionable
            .remedies()
            .iter()
            .fold(JsonError::new(code, actionable.message(), command), |json, remedy| {
                json.with_suggestion(remedy.as_str())
            }),
        None => JsonError::new(code, format!("{:#}", error), command),
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let output = OutputContext::new(cli.quiet, cli.json);

    let needs_data = !matches!(cli.command, Commands::Schema);
    if needs_data && !cli.data_dir.is_dir() {
        return Err(data_dir_missing(&cli.data_dir).into());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| XlinkConfig::default_path(&cli.data_dir));
    let config = XlinkConfig::resolve(&cli.data_dir, cli.config.as_deref())
        .map_err(|e| invalid_config(&config_path, &e))?;
    let engine = Engine::new(&cli.data_dir, &config).map_err(|e| invalid_config(&config_path, &e))?;
    let scope = engine.scope(cli.domain.as_deref())?;

    match &cli.command {
        Commands::Validate => {
            let report = engine.validate(&scope);
            if output.is_json() {
                output.print_json(&JsonOutput::new(!report.has_errors, &report, "validate"))?;
            } else {
                output.print_data(report.render_human(cli.verbose > 0))?;
            }
            Ok(report.exit_code())
        }

        Commands::Repair { dry_run, diff } => {
            let run = engine.repair(&scope, *dry_run, *diff);
            let code = run.exit_code();
            if output.is_json() {
                output.print_json(&JsonOutput::new(code == ExitCode::Success, &run, "repair"))?;
            } else {
                print_repair(&output, &run, cli.verbose > 0)?;
            }
            Ok(code)
        }

        Commands::Schema => {
            let view = SchemaView::from(engine.schema());
            if output.is_json() {
                output.print_json(&JsonOutput::success(&view, "schema"))?;
            } else {
                output.print_data(render_schema(engine.schema()))?;
            }
            Ok(ExitCode::Success)
        }
    }
}

fn print_repair(output: &OutputContext, run: &RepairRun, verbose: bool) -> std::io::Result<()> {
    let stats: &RepairStats = &run.stats;

    if stats.actions.is_empty() && !stats.has_failures() {
        for skipped in &stats.skipped {
            output.print_warning(skipped)?;
        }
        output.print_data(&run.before.render_human(verbose))?;
        output.print_data("")?;
        return output.print_data("✓ Nothing to repair");
    }

    let verb = if stats.dry_run { "Would apply" } else { "Applied" };
    output.print_data(format!(
        "{} {} change(s): {} fixed, {} removed",
        verb,
        stats.actions.len(),
        stats.fixed(),
        stats.removed()
    ))?;
    for action in &stats.actions {
        output.print_data(format!("  {}", action))?;
    }

    for preview in &stats.previews {
        output.print_data("")?;
        output.print_data(preview.diff.trim_end())?;
    }

    for backup in &stats.backups {
        output.print_info(format!("Backup written: {}", backup.display()))?;
    }
    for skipped in &stats.skipped {
        output.print_warning(skipped)?;
    }
    for failure in &stats.failures {
        output.print_error(format!(
            "{} not repaired ({} change(s) abandoned): {}",
            failure.path.display(),
            failure.abandoned_actions,
            failure.error
        ))?;
    }

    if let Some(after) = &run.after {
        output.print_data("")?;
        output.print_data(after.render_human(verbose))?;
    } else if stats.dry_run {
        output.print_info("\nDry run: no files were modified")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct SchemaView<'a> {
    domains: &'a [DomainSpec],
    fields: &'a [FieldSpec],
    inverses: &'a [InversePair],
}

impl<'a> From<&'a Schema> for SchemaView<'a> {
    fn from(schema: &'a Schema) -> Self {
        Self {
            domains: schema.domains(),
            fields: schema.fields(),
            inverses: schema.inverses(),
        }
    }
}

fn render_schema(schema: &Schema) -> String {
    let mut lines = vec!["Domains:".to_string()];
    for domain in schema.domains() {
        lines.push(format!(
            "  {:<14} {} (key: {})",
            domain.name,
            domain.file.display(),
            domain.container_key
        ));
    }

    lines.push(String::new());
    lines.push("Relationships:".to_string());
    for field in schema.fields() {
        let mut line = format!("  {}.{} -> {}", field.domain, field.field, field.target);
        if let Some((inv_domain, inv_field)) = schema.inverse_of(&field.domain, &field.field) {
            line.push_str(&format!("  (inverse: {}.{})", inv_domain, inv_field));
        }
        lines.push(line);
    }
    lines.join("\n")
}

