use std::path::Path;
use std::process;
use tracing::info;

use playfit::cli::{self, Commands};
use playfit::config::Policy;
use playfit::engine::plan::RunId;
use playfit::engine::policy::DecisionReport;
use playfit::engine::{self, Executor, build_plan};
use playfit::error::Result;
use playfit::output;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::parse();

    match run(cli.command) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(err.exit_code());
        }
    }
}

fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Info { source } => cmd_info(&source),
        Commands::Start { source, dest } => cmd_start(&source, &dest).map(|()| 0),
        Commands::Dry { source, dest } => cmd_dry(&source, &dest).map(|()| 0),
        Commands::CheckTools => cmd_check_tools().map(|()| 0),
        Commands::InitConfig => cmd_init_config().map(|()| 0),
    }
}

fn cmd_info(source: &Path) -> Result<i32> {
    output::ensure_source_exists(source)?;
    engine::require_tools()?;

    let policy = Policy::load()?;
    let facts = engine::probe_stream_facts(source)?;
    let report = DecisionReport::build(&policy, &facts);

    print!("{}", report);
    if report.is_direct_play() {
        println!("{}: direct play", source.display());
        Ok(0)
    } else {
        println!("{}: conversion needed", source.display());
        Ok(3)
    }
}

fn cmd_start(source: &Path, dest: &Path) -> Result<()> {
    output::ensure_source_exists(source)?;
    engine::require_tools()?;

    let policy = Policy::load()?;
    let facts = engine::probe_stream_facts(source)?;
    let report = DecisionReport::build(&policy, &facts);

    let container_ext = report.container.target().unwrap_or(&facts.container);
    let dest = output::derive_destination(source, dest, container_ext);
    output::ensure_destination_free(&dest)?;

    let plan = build_plan(&report, &facts, &policy, RunId::new())?;
    info!(
        source = %source.display(),
        dest = %dest.display(),
        passes = plan.passes,
        "starting conversion"
    );

    let duration = engine::probe_duration(source);
    let mut executor = Executor::new(policy.extra_args.clone());
    executor.run(source, &dest, &plan, duration)?;

    println!("wrote {}", dest.display());
    Ok(())
}

fn cmd_dry(source: &Path, dest: &Path) -> Result<()> {
    output::ensure_source_exists(source)?;
    engine::require_tools()?;

    let policy = Policy::load()?;
    let facts = engine::probe_stream_facts(source)?;
    let report = DecisionReport::build(&policy, &facts);

    let container_ext = report.container.target().unwrap_or(&facts.container);
    let dest = output::derive_destination(source, dest, container_ext);

    let plan = build_plan(&report, &facts, &policy, RunId::new())?;
    let executor = Executor::new(policy.extra_args.clone());
    println!("{}", executor.render(source, &dest, &plan));
    Ok(())
}

fn cmd_check_tools() -> Result<()> {
    let (ffmpeg, ffprobe) = engine::require_tools()?;
    println!("{}", ffmpeg);
    println!("{}", ffprobe);
    Ok(())
}

fn cmd_init_config() -> Result<()> {
    let path = Policy::ensure_default_file()?;
    println!("{}", path.display());
    Ok(())
}
