use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

/// Replay a draw script against a recording GL driver and print the calls.
#[derive(Parser, Debug)]
#[command(name = "cogl-trace", version)]
struct Cli {
    /// Input draw script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output trace JSON path. Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print per-call counts instead of the full trace.
    #[arg(long, default_value_t = false)]
    summary: bool,

    /// Extra COGL_DEBUG keys, e.g. `disable-software-clip,disable-batching`.
    #[arg(long)]
    debug: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut script = cogl::Script::from_path(&cli.in_path)?;
    script.config = script.config.with_env_overrides();
    if let Some(list) = &cli.debug {
        script.config = script.config.with_debug_list(list);
    }

    let trace = cogl::run_script(&script)
        .with_context(|| format!("replay '{}'", cli.in_path.display()))?;

    if cli.summary {
        let mut stdout = std::io::stdout().lock();
        for (name, count) in trace.summary() {
            writeln!(stdout, "{name:<28} {count}")?;
        }
        writeln!(stdout, "{:<28} {}", "total", trace.calls.len())?;
        return Ok(());
    }

    let json = serde_json::to_string_pretty(&trace).context("serialize trace")?;
    match &cli.out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(out, json)
                .with_context(|| format!("write trace '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
