use std::{fs, path::PathBuf};

use eri_analysis::{plot, Dataset, DetectorFormat, Frame, RawImage};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "flat-correction",
    about = "Corrects projections with averaged dark and flat frames"
)]
struct Opt {
    /// Path to the projection dataset
    projections: PathBuf,
    /// Path to the dark frames
    #[structopt(long)]
    darks: PathBuf,
    /// Path to the flat frames
    #[structopt(long)]
    flats: PathBuf,
    /// Detector width [px]
    #[structopt(long, default_value = "2048")]
    width: usize,
    /// Detector height [px]
    #[structopt(long, default_value = "1024")]
    height: usize,
    /// Output directory for the corrected PNG images
    #[structopt(long, default_value = "corrected")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let format = DetectorFormat {
        width: opt.width,
        height: opt.height,
    };

    let dark = Frame::average(&RawImage::load_dir(&opt.darks, format)?)?;
    let flat = Frame::average(&RawImage::load_dir(&opt.flats, format)?)?;
    let projections = Dataset::scan(&opt.projections)?;
    fs::create_dir_all(&opt.output)?;

    for record in projections.iter() {
        log::info!(
            "Correcting {:?} ({} kV, {} uA, {} s exposure)",
            record.path.file_name().unwrap_or_default(),
            record.voltage_kv,
            record.current_ua,
            record.exposure_s
        );
        let projection = RawImage::load(&record.path, format)?;
        let corrected = Frame::flat_correct(&projection, &dark, &flat)?;
        let stem = record
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let out = opt.output.join(format!("{stem}.corrected.png"));
        plot::frame_png(&corrected, out.to_str().unwrap());
    }
    Ok(())
}
