use chrono::Local;
use eyre::{Context, Result, bail};
use graph_common::{
    bench::Session,
    config::{Config, InnerBench},
    manifest::RunManifest,
    util::ensure_dirs,
};
use regex::Regex;
use tracing::debug;

fn selected<'a>(config: &'a Config, filter: Option<&'a Regex>) -> Vec<&'a InnerBench> {
    config
        .benches
        .iter()
        .filter(|x| filter.is_none_or(|re| re.is_match(&x.name)))
        .collect()
}

pub async fn run_benchmark(
    config: Config,
    filter: Option<&Regex>,
    progress: bool,
    skip_plot: bool,
) -> Result<()> {
    let settings = config.settings.clone();
    ensure_dirs(&[settings.data_dir.clone(), settings.img_dir.clone()]).await?;

    let mut manifest = RunManifest::load_or_default(&settings.data_dir).await?;
    manifest.name = config.name.clone();
    manifest.updated = Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

    let experiments = selected(&config, filter);
    if experiments.is_empty() {
        bail!("No test of {} matches the filter", config.name);
    }

    let mut session = Session::new(settings, manifest)
        .with_progress(progress)
        .with_skip_plot(skip_plot);
    for experiment in experiments {
        println!("Exporting {} ...", experiment.name);
        debug!("Running {} ({})", experiment.name, experiment.bench.kind());
        let result = experiment
            .bench
            .run(&experiment.name, &mut session)
            .await
            .wrap_err_with(|| format!("Failed to run {}", experiment.name));

        if let Err(err) = result {
            session.chart.reset();
            session.manifest.save(&session.settings.data_dir).await?;
            return Err(err);
        }
        session.manifest.save(&session.settings.data_dir).await?;
    }

    debug!("Exiting");
    Ok(())
}

pub async fn replot(config: Config, filter: Option<&Regex>) -> Result<()> {
    let settings = config.settings.clone();
    let manifest = RunManifest::load(&settings.data_dir)
        .await
        .wrap_err("Nothing cached yet, run the benchmarks first")?;
    ensure_dirs(&[settings.img_dir.clone()]).await?;

    let mut session = Session::new(settings, manifest);
    for experiment in selected(&config, filter) {
        println!("Exporting {} ...", experiment.name);
        if let Err(err) = experiment.bench.replot(&experiment.name, &mut session).await {
            session.chart.reset();
            return Err(err).wrap_err_with(|| format!("Failed to redraw {}", experiment.name));
        }
    }
    Ok(())
}
