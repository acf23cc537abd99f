use plotters::prelude::*;

use crate::{brightness::BrightnessRecord, image::Frame};

/// Chart styling, passed explicitly to every helper
#[derive(Debug, Clone)]
pub struct PlotStyleConfig {
    pub size: (u32, u32),
    pub margin: u32,
    pub left_label_area: u32,
    pub bottom_label_area: u32,
}
impl Default for PlotStyleConfig {
    fn default() -> Self {
        Self {
            size: (768, 512),
            margin: 10,
            left_label_area: 60,
            bottom_label_area: 40,
        }
    }
}

fn color(index: usize) -> RGBColor {
    let c = colorous::TABLEAU10[index % colorous::TABLEAU10.len()];
    RGBColor(c.r, c.g, c.b)
}

fn max_value(x: impl Iterator<Item = f64>) -> f64 {
    x.fold(f64::NEG_INFINITY, f64::max)
}
fn min_value(x: impl Iterator<Item = f64>) -> f64 {
    x.fold(f64::INFINITY, f64::min)
}

/// One labelled (voltage, current) series; drawn as markers when `scatter`
#[derive(Debug, Clone)]
pub struct ParameterSeries {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub scatter: bool,
}

/// Voltage vs current chart over any number of datasets
pub fn parameter_chart(series: &[ParameterSeries], filename: &str, style: &PlotStyleConfig) {
    if series.iter().all(|s| s.points.is_empty()) {
        return;
    }
    let plot = BitMapBackend::new(filename, style.size).into_drawing_area();
    plot.fill(&WHITE).unwrap();

    let points = || series.iter().flat_map(|s| s.points.iter().copied());
    let x_max = max_value(points().map(|(x, _)| x));
    let y_max = max_value(points().map(|(_, y)| y));
    let mut chart = ChartBuilder::on(&plot)
        .set_label_area_size(LabelAreaPosition::Left, style.left_label_area)
        .set_label_area_size(LabelAreaPosition::Bottom, style.bottom_label_area)
        .margin(style.margin)
        .build_cartesian_2d(0f64..x_max * 1.1, 0f64..y_max * 1.1)
        .unwrap();
    chart
        .configure_mesh()
        .x_desc("Voltage [kV]")
        .y_desc("Current [uA]")
        .draw()
        .unwrap();

    for (k, s) in series.iter().enumerate() {
        let rgb = color(k);
        if s.scatter {
            chart
                .draw_series(
                    s.points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 3, rgb.filled())),
                )
                .unwrap()
                .label(&s.label)
                .legend(move |(x, y)| Circle::new((x + 10, y), 3, rgb.filled()));
        } else {
            chart
                .draw_series(LineSeries::new(s.points.iter().copied(), &rgb))
                .unwrap()
                .label(&s.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], rgb));
        }
    }
    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .unwrap();
    plot.present().unwrap();
}

/// Mean brightness of both sources against the tube voltage
pub fn brightness_curves(
    records: &[BrightnessRecord],
    labels: (&str, &str),
    filename: &str,
    style: &PlotStyleConfig,
) {
    if records.is_empty() {
        return;
    }
    let plot = BitMapBackend::new(filename, style.size).into_drawing_area();
    plot.fill(&WHITE).unwrap();

    let means = |f: fn(&BrightnessRecord) -> f64| {
        records
            .iter()
            .map(move |r| (r.voltage_kv as f64, f(r)))
            .collect::<Vec<_>>()
    };
    let reference = means(|r| r.reference_mean);
    let candidate = means(|r| r.candidate_mean);
    let x_min = min_value(records.iter().map(|r| r.voltage_kv as f64));
    let x_max = max_value(records.iter().map(|r| r.voltage_kv as f64));
    let y_max = max_value(reference.iter().chain(&candidate).map(|&(_, y)| y));
    let mut chart = ChartBuilder::on(&plot)
        .set_label_area_size(LabelAreaPosition::Left, style.left_label_area)
        .set_label_area_size(LabelAreaPosition::Bottom, style.bottom_label_area)
        .margin(style.margin)
        .build_cartesian_2d(x_min - 1.0..x_max + 1.0, 0f64..y_max * 1.1)
        .unwrap();
    chart
        .configure_mesh()
        .x_desc("Voltage [kV]")
        .y_desc("Mean image brightness")
        .draw()
        .unwrap();

    for (k, (label, series)) in [(labels.0, &reference), (labels.1, &candidate)]
        .into_iter()
        .enumerate()
    {
        let rgb = color(k);
        chart
            .draw_series(LineSeries::new(series.iter().copied(), &rgb))
            .unwrap()
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], rgb));
    }
    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .unwrap();
    plot.present().unwrap();
}

/// Relative brightness (candidate over reference) against the tube voltage
pub fn ratio_curve(
    records: &[BrightnessRecord],
    label: &str,
    filename: &str,
    style: &PlotStyleConfig,
) {
    if records.is_empty() {
        return;
    }
    let plot = BitMapBackend::new(filename, style.size).into_drawing_area();
    plot.fill(&WHITE).unwrap();

    let series: Vec<_> = records
        .iter()
        .map(|r| (r.voltage_kv as f64, r.ratio))
        .collect();
    let x_min = min_value(series.iter().map(|&(x, _)| x));
    let x_max = max_value(series.iter().map(|&(x, _)| x));
    let y_max = max_value(series.iter().map(|&(_, y)| y));
    let mut chart = ChartBuilder::on(&plot)
        .set_label_area_size(LabelAreaPosition::Left, style.left_label_area)
        .set_label_area_size(LabelAreaPosition::Bottom, style.bottom_label_area)
        .margin(style.margin)
        .build_cartesian_2d(x_min - 1.0..x_max + 1.0, 0f64..y_max * 1.1)
        .unwrap();
    chart
        .configure_mesh()
        .x_desc("Voltage [kV]")
        .y_desc("Relative brightness")
        .draw()
        .unwrap();
    let rgb = color(2);
    chart
        .draw_series(LineSeries::new(series.into_iter(), &rgb))
        .unwrap()
        .label(label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], rgb));
    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .unwrap();
    plot.present().unwrap();
}

/// Contrast transfer curves against the spatial frequency bin
pub fn mtf_chart(curves: &[(String, Vec<f64>)], filename: &str, style: &PlotStyleConfig) {
    let n = curves.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
    if n == 0 {
        return;
    }
    let plot = BitMapBackend::new(filename, style.size).into_drawing_area();
    plot.fill(&WHITE).unwrap();

    let y_max = max_value(curves.iter().flat_map(|(_, c)| c.iter().copied())).max(1e-9);
    let mut chart = ChartBuilder::on(&plot)
        .set_label_area_size(LabelAreaPosition::Left, style.left_label_area)
        .set_label_area_size(LabelAreaPosition::Bottom, style.bottom_label_area)
        .margin(style.margin)
        .build_cartesian_2d(0f64..n as f64, 0f64..y_max * 1.05)
        .unwrap();
    chart
        .configure_mesh()
        .x_desc("Spatial frequency bin")
        .y_desc("MTF")
        .draw()
        .unwrap();

    for (k, (label, curve)) in curves.iter().enumerate() {
        let rgb = color(k);
        chart
            .draw_series(LineSeries::new(
                curve.iter().enumerate().map(|(i, &y)| (i as f64, y)),
                &rgb,
            ))
            .unwrap()
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], rgb));
    }
    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .unwrap();
    plot.present().unwrap();
}

/// Writes a frame as a grayscale PNG, dark-to-bright over its value range
pub fn frame_png(frame: &Frame, filename: &str) {
    let plot = BitMapBackend::new(filename, (frame.width() as u32, frame.height() as u32))
        .into_drawing_area();
    let (min, max) = frame.min_max();
    let span = if max > min { max - min } else { 1.0 };
    for row in 0..frame.height() {
        for col in 0..frame.width() {
            let t = (frame.get(row, col) - min) / span;
            let c = colorous::GREYS.eval_continuous(1.0 - t);
            plot.draw_pixel((col as i32, row as i32), &RGBColor(c.r, c.g, c.b))
                .unwrap();
        }
    }
    plot.present().unwrap();
}
