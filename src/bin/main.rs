use std::{fs, path::PathBuf};

use eri_analysis::{match_all, plot, BrightnessComparison, Dataset, DetectorFormat, SourceKind};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "eri-analysis",
    about = "Compares the brightness of matched ERI and Hamamatsu acquisitions"
)]
struct Opt {
    /// Path to the reference (ERI) dataset
    reference: PathBuf,
    /// Path to the candidate (Hamamatsu) dataset
    candidate: PathBuf,
    /// Detector width [px]
    #[structopt(long, default_value = "2048")]
    width: usize,
    /// Detector height [px]
    #[structopt(long, default_value = "1024")]
    height: usize,
    /// Save the per-pair statistics to a CSV file
    #[structopt(long)]
    csv: Option<String>,
    /// Plot the matched parameters and the brightness comparison
    #[structopt(short, long)]
    plot: bool,
    /// Output directory for the plots
    #[structopt(long, default_value = "brightness-comparison")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let format = DetectorFormat {
        width: opt.width,
        height: opt.height,
    };

    let reference = Dataset::scan(&opt.reference)?;
    let candidate = Dataset::scan(&opt.candidate)?;
    for (kind, dataset) in [
        (SourceKind::Eri, &reference),
        (SourceKind::Hamamatsu, &candidate),
    ] {
        if !kind.matches(&dataset.name()) {
            log::warn!("{:?} does not look like a {} dataset", dataset.path(), kind);
        }
    }

    let pairs = match_all(&reference, &candidate)?;
    let comparison = BrightnessComparison::evaluate(&pairs, format)?;
    comparison.summary();

    if let Some(filename) = opt.csv {
        comparison.to_csv(filename)?;
    }
    if opt.plot {
        fs::create_dir_all(&opt.output)?;
        let style = plot::PlotStyleConfig::default();
        let zip = |(voltage, current): (Vec<f64>, Vec<f64>)| -> Vec<(f64, f64)> {
            voltage.into_iter().zip(current).collect()
        };
        let series = [
            plot::ParameterSeries {
                label: candidate.name(),
                points: zip(candidate.voltage_current()),
                scatter: true,
            },
            plot::ParameterSeries {
                label: reference.name(),
                points: zip(reference.voltage_current()),
                scatter: false,
            },
            plot::ParameterSeries {
                label: "Best match".into(),
                points: pairs
                    .iter()
                    .map(|p| (p.candidate.voltage_kv as f64, p.candidate.current_ua as f64))
                    .collect(),
                scatter: false,
            },
        ];
        let filename = |stem: &str| {
            opt.output
                .join(format!(
                    "{}-{}_vs_{}.png",
                    stem,
                    candidate.name(),
                    reference.name()
                ))
                .to_str()
                .unwrap()
                .to_string()
        };
        plot::parameter_chart(&series, &filename("Match"), &style);
        let (reference_name, candidate_name) = (reference.name(), candidate.name());
        plot::brightness_curves(
            &comparison,
            (reference_name.as_str(), candidate_name.as_str()),
            &filename("Brightness"),
            &style,
        );
        plot::ratio_curve(
            &comparison,
            &format!("{} / {}", candidate.name(), reference.name()),
            &filename("Ratio"),
            &style,
        );
    }
    Ok(())
}
