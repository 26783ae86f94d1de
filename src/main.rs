mod core;
mod pipeline;
mod registry;
mod version;

use clap::Parser;
use core::error::{print_error, PilotError};
use pipeline::RunOptions;

/// Release a Python package to PyPI: version checks, test gate, build,
/// smoke test, upload, and post-upload verification in one sequential run.
#[derive(Parser)]
#[command(name = "pypilot")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// Run every local stage but perform no network mutation
  #[arg(long)]
  dry_run: bool,

  /// Bypass test/coverage/git-cleanliness gates, proceeding with warnings
  #[arg(long)]
  force: bool,

  /// Skip the test gate entirely
  #[arg(long)]
  skip_tests: bool,

  /// Minimum coverage percentage when a coverage report exists
  #[arg(long, default_value_t = 80, value_name = "PERCENT")]
  coverage_threshold: u32,

  /// On a registry collision (or a version-record mismatch), bump the patch
  /// version and rewrite both version records instead of aborting
  #[arg(long)]
  auto_version_bump: bool,

  /// Produce a detached GPG signature per artifact
  #[arg(long)]
  sign: bool,

  /// Answer yes to interactive confirmations
  #[arg(short, long)]
  yes: bool,

  /// Print the release summary as JSON
  #[arg(long)]
  json: bool,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  let opts = RunOptions {
    dry_run: cli.dry_run,
    force: cli.force,
    skip_tests: cli.skip_tests,
    auto_version_bump: cli.auto_version_bump,
    sign: cli.sign,
    assume_yes: cli.yes,
    coverage_threshold: cli.coverage_threshold,
    json: cli.json,
  };

  if let Err(err) = pipeline::run(&root, opts) {
    handle_error(err);
  }
}

fn handle_error(err: PilotError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
