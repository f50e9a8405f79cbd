use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;

use crate::{
    bench::Bench,
    benches::{repeat::Repeat, sweep::Sweep},
    chart::{ChartSettings, ParamAxis},
    extract::ColumnPattern,
    range::SweepRange,
    series::SamplePolicy,
    stats::SavitzkyGolay,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    pub benches: Vec<InnerBench>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where the benchmark executables live
    pub install_dir: PathBuf,
    pub img_dir: PathBuf,
    pub data_dir: PathBuf,
    /// `None` draws the raw samples
    pub smoothing: Option<SavitzkyGolay>,
    pub on_sample_error: SamplePolicy,
    pub chart: ChartSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("install/bin"),
            img_dir: PathBuf::from("graphs/imgs"),
            data_dir: PathBuf::from("graphs/data"),
            smoothing: Some(SavitzkyGolay::default()),
            on_sample_error: SamplePolicy::default(),
            chart: ChartSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerBench {
    pub name: String,
    pub bench: Box<dyn Bench>,
}

impl InnerBench {
    pub fn new(name: impl Into<String>, bench: impl Bench + 'static) -> Self {
        Self {
            name: name.into(),
            bench: Box::new(bench),
        }
    }
}

/// Configurations compiled into the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    /// Thread creation and switching sweeps, charted
    Graphs,
    /// Repeated fibonacci runs, summarised
    Fibonacci,
}

fn pattern(src: &str) -> Result<ColumnPattern> {
    src.parse::<ColumnPattern>()
        .wrap_err_with(|| format!("Built-in column pattern {src:?}"))
}

impl Config {
    pub fn builtin(suite: Suite) -> Result<Self> {
        let benches = match suite {
            Suite::Graphs => {
                let threads = SweepRange::new(1, 100, 10);
                let yields = SweepRange::new(1, 100, 10);
                let mut benches = Vec::new();
                for (name, columns) in [
                    ("21-create-many", r#"$1 "\t" $8"#),
                    ("22-create-many-recursive", r#"$1 "\t" $8"#),
                    ("23-create-many-once", r#"$1 "\t" $10"#),
                ] {
                    let sweep = Sweep::new(pattern(columns)?, threads).with_smooth(false);
                    benches.push(InnerBench::new(name, sweep));
                }
                for (name, columns) in [
                    ("31-switch-many", r#"$1 "\t" $4 "\t" $6"#),
                    ("32-switch-many-join", "$9; exit"),
                    ("33-switch-many-cascade", "$9; exit"),
                ] {
                    let sweep = Sweep::new(pattern(columns)?, threads)
                        .with_secondary(yields)
                        .with_smooth(false);
                    benches.push(InnerBench::new(name, sweep));
                }
                let fibonacci = Sweep::new(pattern(r#"$3 "\t" $7"#)?, SweepRange::new(1, 15, 10))
                    .with_pinned(SweepRange::new(1, 21, 1))
                    .with_axis(ParamAxis::ProblemSize);
                benches.push(InnerBench::new("51-fibonacci", fibonacci));
                benches
            }
            Suite::Fibonacci => {
                let mut benches = Vec::new();
                for n in [8, 15, 16] {
                    let repeat = Repeat {
                        program: "51-fibonacci".to_owned(),
                        args: vec![n],
                        runs: 100,
                        columns: pattern("$7; exit")?,
                    };
                    benches.push(InnerBench::new(format!("fibo-{n}"), repeat));
                }
                benches
            }
        };
        let name = match suite {
            Suite::Graphs => "graphs",
            Suite::Fibonacci => "fibonacci",
        };
        Ok(Self {
            name: name.to_owned(),
            settings: Settings::default(),
            benches,
        })
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_yml::from_str(data)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let data = read_to_string(path)
            .await
            .wrap_err_with(|| format!("Read config {}", path.display()))?;
        Self::parse(&data).wrap_err_with(|| format!("Parse config {}", path.display()))
    }

    /// Checks every experiment before anything is launched
    pub fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.settings.smoothing {
            filter.validate().wrap_err("Smoothing settings")?;
        }
        let mut seen = HashSet::new();
        for experiment in &self.benches {
            if !seen.insert(experiment.name.as_str()) {
                bail!("Test {} is configured twice", experiment.name);
            }
            experiment
                .bench
                .validate(&experiment.name, &self.settings)
                .wrap_err_with(|| format!("Invalid configuration for {}", experiment.name))?;
        }
        Ok(())
    }
}
