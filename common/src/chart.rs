//! Line charts rendered through gnuplot.
//!
//! A [`ChartContext`] owns the drawing surface. A chart is opened with
//! [`ChartContext::begin`], filled with [`ChartContext::plot`] and closed with
//! [`ChartContext::finish`], which always leaves the context empty so one
//! chart can never bleed into the next.

use std::{
    ffi::OsString,
    fmt::Write as _,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{fs::create_dir_all, io::AsyncWriteExt, process::Command};
use tracing::debug;

pub const Y_LABEL: &str = "Execution Time";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart {0:?} is still open")]
    AlreadyOpen(String),
    #[error("no chart is open")]
    NotOpen,
    #[error("chart {0:?} has no data")]
    NoData(String),
    #[error("could not launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Render {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the swept parameter measures, which decides the x axis label
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamAxis {
    #[default]
    Threads,
    ProblemSize,
}

impl ParamAxis {
    pub fn label(&self) -> &'static str {
        match self {
            ParamAxis::Threads => "Number of threads",
            ParamAxis::ProblemSize => "Problem size N",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    /// Pipe the script into gnuplot and write the image
    #[default]
    Gnuplot,
    /// Only write the gnuplot script next to where the image would go
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartSettings {
    pub renderer: Renderer,
    pub program: String,
    pub terminal: String,
    pub extension: String,
    pub size: (u32, u32),
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            renderer: Renderer::Gnuplot,
            program: "gnuplot".to_owned(),
            terminal: "pngcairo".to_owned(),
            extension: "png".to_owned(),
            size: (640, 480),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub color: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

impl Chart {
    pub fn new(title: impl Into<String>, axis: ParamAxis) -> Self {
        Self {
            title: title.into(),
            x_label: axis.label().to_owned(),
            y_label: Y_LABEL.to_owned(),
            series: Vec::new(),
        }
    }

    fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.points.is_empty())
    }

    /// The gnuplot program drawing this chart into `output`, inline data included
    pub fn script(&self, settings: &ChartSettings, output: &Path) -> String {
        let mut s = String::new();
        let (width, height) = settings.size;
        _ = writeln!(s, "set terminal {} size {width},{height}", settings.terminal);
        _ = writeln!(s, "set output {}", quote(&output.display().to_string()));
        _ = writeln!(s, "set title {}", quote(&self.title));
        _ = writeln!(s, "set xlabel {}", quote(&self.x_label));
        _ = writeln!(s, "set ylabel {}", quote(&self.y_label));
        s.push_str("set key top left\nset grid\n");

        let lines = self
            .series
            .iter()
            .filter(|series| !series.points.is_empty())
            .collect::<Vec<_>>();
        let plots = lines
            .iter()
            .map(|series| {
                format!(
                    "'-' using 1:2 with lines linecolor rgb {} title {}",
                    quote(&series.color),
                    quote(&series.label)
                )
            })
            .collect::<Vec<_>>();
        _ = writeln!(s, "plot {}", plots.join(", "));

        for series in lines {
            for (x, y) in &series.points {
                if x.is_finite() && y.is_finite() {
                    _ = writeln!(s, "{x} {y}");
                }
            }
            s.push_str("e\n");
        }
        s
    }
}

/// gnuplot single-quoted string, where a quote is escaped by doubling it
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Owned drawing surface: at most one chart is open at a time
#[derive(Debug)]
pub struct ChartContext {
    settings: ChartSettings,
    open: Option<Chart>,
}

impl ChartContext {
    pub fn new(settings: ChartSettings) -> Self {
        Self {
            settings,
            open: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<&Chart> {
        self.open.as_ref()
    }

    pub fn begin(&mut self, title: impl Into<String>, axis: ParamAxis) -> Result<(), ChartError> {
        if let Some(chart) = &self.open {
            return Err(ChartError::AlreadyOpen(chart.title.clone()));
        }
        self.open = Some(Chart::new(title, axis));
        Ok(())
    }

    pub fn plot(&mut self, series: ChartSeries) -> Result<(), ChartError> {
        self.open
            .as_mut()
            .ok_or(ChartError::NotOpen)?
            .series
            .push(series);
        Ok(())
    }

    /// Drops the open chart without drawing it
    pub fn reset(&mut self) {
        if let Some(chart) = self.open.take() {
            debug!("Discarding chart {}", chart.title);
        }
    }

    /// Renders the open chart to `<stem>.<extension>` and clears the surface.
    ///
    /// Returns the written file: the image for [`Renderer::Gnuplot`], the
    /// script for [`Renderer::Script`].
    pub async fn finish(&mut self, stem: &Path) -> Result<PathBuf, ChartError> {
        let chart = self.open.take().ok_or(ChartError::NotOpen)?;
        if !chart.has_data() {
            return Err(ChartError::NoData(chart.title));
        }

        let image = with_extension(stem, &self.settings.extension);
        if let Some(parent) = image.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).await?;
        }
        let script = chart.script(&self.settings, &image);

        match self.settings.renderer {
            Renderer::Gnuplot => {
                render_gnuplot(&self.settings.program, &script).await?;
                Ok(image)
            }
            Renderer::Script => {
                let path = with_extension(stem, "gp");
                tokio::fs::write(&path, script).await?;
                Ok(path)
            }
        }
    }
}

/// Appends an extension without touching dots already in the file name
fn with_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

async fn render_gnuplot(program: &str, script: &str) -> Result<(), ChartError> {
    let mut gnuplot = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ChartError::Launch {
            program: program.to_owned(),
            source,
        })?;

    if let Some(mut stdin) = gnuplot.stdin.take() {
        stdin.write_all(script.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    let output = gnuplot.wait_with_output().await?;
    if !output.status.success() {
        return Err(ChartError::Render {
            program: program.to_owned(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(())
}
