use std::path::PathBuf;

use eri_analysis::{fit, plot, Dataset, SourceKind};
use structopt::StructOpt;
use strum::IntoEnumIterator;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "voltage-current",
    about = "Voltage/current relation of the acquired datasets"
)]
struct Opt {
    /// Dataset directories
    datasets: Vec<PathBuf>,
    /// Plot the scatter and the fitted trend
    #[structopt(short, long)]
    plot: bool,
    /// Plot filename
    #[structopt(long, default_value = "VoltageVsCurrent.png")]
    output: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut series = vec![];
    let mut eri_voltage = vec![];
    let mut eri_current = vec![];
    for dir in &opt.datasets {
        let dataset = Dataset::scan(dir)?;
        let (voltage, current) = dataset.voltage_current();
        // the current of the ERI source is set by its power supply, so only
        // its records carry the exponential trend
        if SourceKind::iter().find(|kind| kind.matches(&dataset.name())) == Some(SourceKind::Eri) {
            eri_voltage.extend_from_slice(&voltage);
            eri_current.extend_from_slice(&current);
        }
        if let Some((min, max)) = dataset.power_extrema() {
            println!(
                "{}: output power between {:.2} W ({} kV/{} uA) and {:.2} W ({} kV/{} uA)",
                dataset.name(),
                min.power_w(),
                min.voltage_kv,
                min.current_ua,
                max.power_w(),
                max.voltage_kv,
                max.current_ua
            );
        }
        series.push(plot::ParameterSeries {
            label: dataset.name(),
            points: voltage.into_iter().zip(current).collect(),
            scatter: true,
        });
    }

    match fit::exponential(&eri_voltage, &eri_current) {
        Ok(trend) => {
            println!(
                "Best exponential fit: {:.2e} * exp({:.2e} * kV) + {:.2e}",
                trend.scale, trend.rate, trend.offset
            );
            let mut voltages = eri_voltage.clone();
            voltages.sort_by(f64::total_cmp);
            voltages.dedup();
            series.push(plot::ParameterSeries {
                label: "Fitted trend".into(),
                points: voltages.iter().map(|&v| (v, trend.value(v))).collect(),
                scatter: false,
            });
        }
        Err(error) => log::warn!("No exponential fit to the ERI records: {error}"),
    }
    if opt.plot {
        plot::parameter_chart(&series, &opt.output, &plot::PlotStyleConfig::default());
    }
    Ok(())
}
