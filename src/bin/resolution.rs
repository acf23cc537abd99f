use std::path::PathBuf;

use eri_analysis::{
    plot, resolution::normalize, AcquisitionRecord, DetectorFormat, EdgeRegion, EdgeResponse,
    RawImage,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "resolution",
    about = "Slanted-edge resolution comparison of two raw images"
)]
struct Opt {
    /// First raw image (e.g. ERI)
    first: PathBuf,
    /// Second raw image (e.g. Hamamatsu)
    second: PathBuf,
    /// Detector width [px]
    #[structopt(long, default_value = "2048")]
    width: usize,
    /// Detector height [px]
    #[structopt(long, default_value = "1024")]
    height: usize,
    /// First cropped row
    #[structopt(long, default_value = "100")]
    row_start: usize,
    /// One past the last cropped row
    #[structopt(long, default_value = "900")]
    row_end: usize,
    /// First cropped column
    #[structopt(long, default_value = "1600")]
    col_start: usize,
    /// One past the last cropped column
    #[structopt(long, default_value = "1750")]
    col_end: usize,
    /// Save the MTF curves to a CSV file
    #[structopt(long)]
    csv: Option<String>,
    /// Plot the MTF comparison
    #[structopt(short, long)]
    plot: bool,
    /// Plot filename
    #[structopt(long, default_value = "MTF.png")]
    output: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let format = DetectorFormat {
        width: opt.width,
        height: opt.height,
    };
    let region = EdgeRegion {
        row_start: opt.row_start,
        row_end: opt.row_end,
        col_start: opt.col_start,
        col_end: opt.col_end,
    };

    let mut curves = vec![];
    for path in [&opt.first, &opt.second] {
        let record = AcquisitionRecord::from_path(path)?;
        let image = RawImage::load(path, format)?;
        let response = EdgeResponse::evaluate(&image, &region)?;
        if response.is_degenerate() {
            log::warn!("No usable edge fit for {:?}", path);
            curves.push((record.source, response.mtf));
        } else {
            curves.push((record.source, normalize(&response.mtf)?));
        }
    }

    if let Some(filename) = &opt.csv {
        let mut wtr = csv::Writer::from_path(filename)?;
        wtr.write_record(["bin", curves[0].0.as_str(), curves[1].0.as_str()])?;
        for k in 0..curves[0].1.len().max(curves[1].1.len()) {
            let cell = |curve: &[f64]| {
                curve
                    .get(k)
                    .map(|v| format!("{v}"))
                    .unwrap_or_default()
            };
            wtr.write_record([k.to_string(), cell(&curves[0].1), cell(&curves[1].1)])?;
        }
        wtr.flush()?;
    }
    if opt.plot {
        plot::mtf_chart(&curves, &opt.output, &plot::PlotStyleConfig::default());
    }
    Ok(())
}
