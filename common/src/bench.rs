use core::fmt::Debug;

use dyn_clone::{DynClone, clone_trait_object};
use eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{chart::ChartContext, config::Settings, manifest::RunManifest};

/// A command line an experiment launches, and how many times in a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub line: String,
    pub times: usize,
}

impl Cmd {
    pub fn once(line: String) -> Self {
        Self { line, times: 1 }
    }
}

/// State shared by every experiment of one run
#[derive(Debug)]
pub struct Session {
    pub settings: Settings,
    pub chart: ChartContext,
    pub manifest: RunManifest,
    pub skip_plot: bool,
    progress: bool,
}

impl Session {
    pub fn new(settings: Settings, manifest: RunManifest) -> Self {
        let chart = ChartContext::new(settings.chart.clone());
        Self {
            settings,
            chart,
            manifest,
            skip_plot: false,
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_skip_plot(mut self, skip_plot: bool) -> Self {
        self.skip_plot = skip_plot;
        self
    }

    /// A bar over `len` invocations, hidden unless progress was asked for
    pub fn progress_bar(&self, len: usize, message: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{msg:>32} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.to_owned());
        bar
    }
}

#[typetag::serde(tag = "type")]
#[async_trait::async_trait]
pub trait Bench: Debug + DynClone + Send + Sync {
    /// Kind of experiment, for identification
    fn kind(&self) -> &'static str;
    /// Checks the experiment before anything is launched
    ///
    /// Arguments:
    /// * `name` - The test name, ie. 21-create-many
    /// * `settings` - The settings from the config
    fn validate(&self, name: &str, settings: &Settings) -> Result<()>;
    /// The command lines the experiment launches, in launch order
    fn cmds(&self, name: &str, settings: &Settings) -> Result<Vec<Cmd>>;
    /// Collects fresh samples, then charts or summarises them
    async fn run(&self, name: &str, session: &mut Session) -> Result<()>;
    /// Charts or summarises the samples a previous run left in the cache
    async fn replot(&self, name: &str, session: &mut Session) -> Result<()>;
}
clone_trait_object!(Bench);
