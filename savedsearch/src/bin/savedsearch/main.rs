mod commands;
mod context;
mod examples;
mod output;
mod theme;

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use anyhow::Result;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};
use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};

use commands::{
    query::{EscapeArgs, QueryArgs, handle_escape, handle_query},
    saved::{SavedCommands, handle_saved_commands},
    search::{SearchArgs, handle_locations, handle_search},
};
use context::{CliContext, Overrides};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("SOLR_URL", "Solr core URL, e.g. http://localhost:8983/solr/jobs"),
    ("REDIS_URL", "Redis connection URL for stored saved searches"),
    ("RUST_LOG", "Log filter, e.g. savedsearch=debug"),
];

#[derive(Parser)]
#[command(name = "savedsearch")]
#[command(version)]
#[command(
    about = "Build and run saved job searches against Solr",
    long_about = r#"Saved search CLI that provides:

• Escaped Solr queries built from titles, keywords, locations and business units
• Grouped (field-collapsing) searches with nested group queries
• Saved searches stored in Redis, listed per scope

Commands:
  escape     Escape raw tokens for a Solr query
  query      Build a query string from search criteria
  search     Run a grouped search
  locations  List location choices from the full_loc facet
  saved      Manage stored saved searches
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file (default: nearest .savedsearch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Solr core URL, overrides the config file
    #[arg(long, env = "SOLR_URL", global = true, hide_env_values = true)]
    solr_url: Option<String>,

    /// Redis URL, overrides the config file
    #[arg(long, env = "REDIS_URL", global = true, hide_env_values = true)]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let matches = match command.styles(help_styles()).try_get_matches() {
            Ok(matches) => matches,
            Err(err) => exit_with_clap_error(err),
        };
        match Cli::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(err) => exit_with_clap_error(err),
        }
    }
}

fn exit_with_clap_error(err: clap::error::Error) -> ! {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = print_blank_line_stdout();
            if let Err(print_err) = err.print()
                && print_err.kind() != io::ErrorKind::BrokenPipe
            {
                eprintln!("Failed to display help: {print_err}");
            }
            let _ = print_blank_line_stdout();
            std::process::exit(0);
        }
        ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            handle_missing_subcommand(err);
        }
        _ => {
            let exit_code = err.exit_code();
            let _ = print_blank_line_stderr();
            if let Err(print_err) = err.print()
                && print_err.kind() != io::ErrorKind::BrokenPipe
            {
                eprintln!("Failed to display error: {print_err}");
            }
            let _ = print_blank_line_stderr();
            std::process::exit(exit_code);
        }
    }
}

fn handle_missing_subcommand(error: clap::error::Error) -> ! {
    let mut command = build_cli_command();
    let command_name = command
        .get_display_name()
        .unwrap_or_else(|| command.get_name())
        .to_string();

    let _ = print_blank_line_stderr();
    eprintln!("error: '{command_name}' requires a subcommand but one was not provided");
    let _ = print_blank_line_stderr();

    command = command.styles(help_styles());

    let mut stderr = io::stderr();
    if command.write_long_help(&mut stderr).is_ok() {
        let _ = IoWrite::write_all(&mut stderr, b"\n");
        let _ = IoWrite::flush(&mut stderr);
    }

    let _ = print_blank_line_stderr();
    std::process::exit(error.exit_code());
}

fn build_cli_command() -> Command {
    let use_color = detect_color_support();
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command().after_long_help(appendix);
    command = command.color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    attach_command_examples(&mut command, use_color);
    command
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let heading = stylize("Examples:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for (index, group) in groups.iter().enumerate() {
        let title = stylize(group.title, theme.primary, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = stylize(ICONS.arrow, theme.secondary, false, use_color);
            let command_text = stylize(command, theme.secondary, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }

    if !buffer.ends_with('\n') {
        buffer.push('\n');
    }

    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let env_heading = stylize("Environment Variables:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, theme.key, true, use_color);
        let value_text = stylize(description, theme.value, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');

    let tip_heading = stylize("Tip:", theme.highlight, true, use_color);
    let tip_text = stylize(
        "Use 'savedsearch <command> --help' to view examples for each command.",
        theme.secondary,
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");

    buffer
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

fn print_blank_line_stderr() -> io::Result<()> {
    let mut stderr = io::stderr();
    IoWrite::write_all(&mut stderr, b"\n")?;
    IoWrite::flush(&mut stderr)
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    let styled = text.color(color);
    if bold { styled.bold().to_string() } else { styled.to_string() }
}

fn detect_color_support() -> bool {
    ShouldColorize::from_env().should_colorize()
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(style_from_color(theme.primary).bold())
        .header(style_from_color(theme.highlight).bold())
        .literal(style_from_color(theme.secondary))
        .placeholder(style_from_color(theme.muted))
        .valid(style_from_color(theme.success))
        .invalid(style_from_color(theme.warning))
        .error(style_from_color(theme.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Escape raw tokens for use in a Solr query
    Escape(EscapeArgs),

    /// Build a Solr query string from search criteria
    Query(QueryArgs),

    /// Run a grouped search against Solr
    Search(SearchArgs),

    /// List location choices from the full_loc facet
    Locations,

    /// Create, list, run and delete stored saved searches
    #[command(subcommand)]
    Saved(SavedCommands),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();

    let _ = print_blank_line_stdout();

    match execute(cli).await {
        Ok(()) => {
            let _ = print_blank_line_stdout();
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            let _ = print_blank_line_stdout();
            std::process::exit(1);
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let global_options = GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };
    if global_options.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(global_options);
    let overrides = Overrides {
        config: cli.config,
        solr_url: cli.solr_url,
        redis_url: cli.redis_url,
    };

    match cli.command {
        Commands::Escape(args) => handle_escape(args, &output)?,
        Commands::Query(args) => handle_query(args, &output)?,
        Commands::Search(args) => {
            let ctx = CliContext::load(&overrides)?;
            handle_search(args, &ctx, &output).await?;
        }
        Commands::Locations => {
            let ctx = CliContext::load(&overrides)?;
            handle_locations(&ctx, &output).await?;
        }
        Commands::Saved(command) => {
            let ctx = CliContext::load(&overrides)?;
            if let Some(path) = &ctx.config_path {
                output.verbose(&format!("using {}", path.display()));
            }
            handle_saved_commands(command, &ctx, &output).await?;
        }
    }

    Ok(())
}
