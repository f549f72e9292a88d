//! ### Graph
//! Renders a charge type's hourly congestion profile as a png.

use plotters::backend::BitMapBackend;
use plotters::chart::ChartBuilder;
use plotters::drawing::IntoDrawingArea;
use plotters::prelude::Rectangle;
use plotters::style::Color;
use plotters::style::RGBColor;
use plotters::style::BLACK;
use plotters::style::WHITE;
use std::path::Path;

use crate::level::CongestionLevel;
use crate::record::ClassifiedHour;

pub struct Graphing<'a> {
    path: &'a Path,
}

impl<'a> Graphing<'a> {
    const CHART_COLOR: RGBColor = WHITE;

    pub fn new(path: &'a Path) -> Self {
        Graphing { path }
    }

    fn level_color(level: CongestionLevel) -> RGBColor {
        let (r, g, b) = level.meta().rgb;
        RGBColor(r, g, b)
    }

    /// One bar per observed hour, coloured by its level. `hours` must be the
    /// rows of a single charge type; with no rows only the axes are drawn.
    pub fn hourly_congestion(
        &self,
        charge_type: &str,
        hours: &[&ClassifiedHour],
    ) -> anyhow::Result<()> {
        let root = BitMapBackend::new(self.path, (1080, 720)).into_drawing_area();
        root.fill(&Self::CHART_COLOR)?;

        let max_kwh = hours.iter().fold(0f64, |acc, row| row.mean_kwh.max(acc));
        let mut chart = ChartBuilder::on(&root)
            .x_label_area_size(72)
            .y_label_area_size(72)
            .margin(20)
            .caption(
                format!("Average hourly charging load: {charge_type}"),
                ("sans-serif", 40.),
            )
            .build_cartesian_2d(0u32..24u32, 0f64..(max_kwh * 1.1).max(1.))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(WHITE.mix(0.3))
            .y_desc("kWh")
            .x_desc("Hour of day")
            .axis_desc_style(("sans-serif", 30))
            .x_label_formatter(&|hour| format!("{hour:02}:00"))
            .y_label_formatter(&|kwh| format!("{kwh:.1}"))
            .x_labels(24)
            .y_labels(10)
            .x_label_style(("sans-serif", 16))
            .y_label_style(("sans-serif", 16))
            .draw()?;

        chart.draw_series(hours.iter().map(|row| {
            let hour = u32::from(row.hour);
            Rectangle::new(
                [(hour, 0.), (hour + 1, row.mean_kwh)],
                Self::level_color(row.level).filled(),
            )
        }))?;
        chart.draw_series(hours.iter().map(|row| {
            let hour = u32::from(row.hour);
            Rectangle::new([(hour, 0.), (hour + 1, row.mean_kwh)], BLACK.stroke_width(1))
        }))?;

        root.present()?;

        Ok(())
    }
}
