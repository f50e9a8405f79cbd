use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use eyre::Result;
use graph_common::{
    config::{Config, Suite},
    manifest::RunManifest,
};
use regex::Regex;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod bench;

const MODULES: &[&str] = &["thread_graphs", "graph_common"];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = false)]
    no_progress: bool,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SuiteArg {
    Graphs,
    Fibonacci,
}

impl From<SuiteArg> for Suite {
    fn from(v: SuiteArg) -> Self {
        match v {
            SuiteArg::Graphs => Suite::Graphs,
            SuiteArg::Fibonacci => Suite::Fibonacci,
        }
    }
}

#[derive(Args)]
struct ConfigSource {
    /// YAML configuration, used instead of a built-in suite
    #[arg(short, long, conflicts_with = "builtin")]
    config_file: Option<PathBuf>,
    /// Built-in suite to use when no configuration file is given
    #[arg(long, value_enum, default_value_t = SuiteArg::Graphs)]
    builtin: SuiteArg,
}

impl ConfigSource {
    async fn load(&self) -> Result<Config> {
        let config = match &self.config_file {
            Some(path) => Config::load(path).await?,
            None => Config::builtin(self.builtin.into())?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run benchmarks, then chart and summarise them
    Bench {
        #[command(flatten)]
        source: ConfigSource,
        /// Do not generate charts
        #[arg(long, default_value_t = false)]
        skip_plot: bool,
        /// Only tests whose name matches
        #[arg(short, long)]
        filter: Option<Regex>,
    },
    /// Redraw charts and summaries from cached samples
    Plot {
        #[command(flatten)]
        source: ConfigSource,
        /// Only tests whose name matches
        #[arg(short, long)]
        filter: Option<Regex>,
    },
    /// Print generated benchmark commands
    Print {
        #[command(flatten)]
        source: ConfigSource,
    },
    /// List cached series
    Ls {
        #[command(flatten)]
        source: ConfigSource,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new("warn");
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let result = execute(args.command, !args.no_progress).await;
    if let Err(err) = &result {
        error!("{err:#?}");
    }
    result
}

async fn execute(command: Commands, progress: bool) -> Result<()> {
    match command {
        Commands::Bench {
            source,
            skip_plot,
            filter,
        } => {
            let config = source.load().await?;
            bench::run_benchmark(config, filter.as_ref(), progress, skip_plot).await
        }
        Commands::Plot { source, filter } => {
            let config = source.load().await?;
            bench::replot(config, filter.as_ref()).await
        }
        Commands::Print { source } => print_commands(&source.load().await?),
        Commands::Ls { source } => list_series(&source.load().await?).await,
    }
}

fn print_commands(config: &Config) -> Result<()> {
    for experiment in &config.benches {
        println!("{}:", experiment.name);
        for cmd in experiment.bench.cmds(&experiment.name, &config.settings)? {
            if cmd.times > 1 {
                println!("  {} (x{})", cmd.line, cmd.times);
            } else {
                println!("  {}", cmd.line);
            }
        }
    }
    Ok(())
}

async fn list_series(config: &Config) -> Result<()> {
    let manifest = RunManifest::load_or_default(&config.settings.data_dir).await?;
    if let Some(updated) = &manifest.updated {
        println!("{} (updated {updated})", manifest.name);
    }
    for entry in &manifest.series {
        let secondary = entry
            .secondary
            .map(|y| format!(" yields={y}"))
            .unwrap_or_default();
        println!(
            "{} [{}{secondary}] {} samples -> {}",
            entry.bench,
            entry.variant,
            entry.params.len(),
            entry.file.display()
        );
    }
    for entry in &manifest.summaries {
        println!(
            "{} [{} runs] {} -> {}",
            entry.bench,
            entry.summary.count,
            entry.summary,
            entry.file.display()
        );
    }
    Ok(())
}
