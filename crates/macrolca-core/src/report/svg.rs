//! SVG charts drawn with `plotters`, plus a thin HTML wrapper.

use plotters::prelude::*;

use crate::error::MacroLcaError;

/// Okabe-Ito colour-blind safe palette.
pub const PALETTE: [RGBColor; 9] = [
    RGBColor(0x00, 0x9E, 0x73),
    RGBColor(0xE6, 0x9F, 0x00),
    RGBColor(0x56, 0xB4, 0xE9),
    RGBColor(0xF0, 0xE4, 0x42),
    RGBColor(0x00, 0x72, 0xB2),
    RGBColor(0xD5, 0x5E, 0x00),
    RGBColor(0xCC, 0x79, 0xA7),
    RGBColor(0x00, 0x00, 0x00),
    RGBColor(0x99, 0x99, 0x99),
];

const BOX_SIZE: (u32, u32) = (1000, 600);
const SCATTER_SIZE: (u32, u32) = (1000, 640);
const FONT: &str = "sans-serif";

pub fn colour(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

fn plot_error<E: std::fmt::Display>(e: E) -> MacroLcaError {
    MacroLcaError::Plot(e.to_string())
}

fn tick(v: f64, log: bool) -> String {
    if log {
        format!("{:.0e}", 10f64.powf(v))
    } else {
        format!("{v:.2e}")
    }
}

fn segment_label(v: &SegmentValue<&String>) -> String {
    match v {
        SegmentValue::Exact(s) | SegmentValue::CenterOf(s) => s.to_string(),
        SegmentValue::Last => String::new(),
    }
}

/// Box plots over named groups, optionally split into coloured series.
///
/// With `series` empty every group holds one value set and is coloured by
/// position; otherwise `values[i]` belongs to `series[i]`.
#[derive(Debug, Clone)]
pub struct BoxPlot {
    pub title: String,
    pub group_label: String,
    pub value_label: String,
    pub log_scale: bool,
    pub show_outliers: bool,
    pub series: Vec<String>,
    pub groups: Vec<BoxGroup>,
}

#[derive(Debug, Clone)]
pub struct BoxGroup {
    pub name: String,
    pub values: Vec<Vec<f64>>,
}

struct BoxMark {
    group: usize,
    series: usize,
    quartiles: Quartiles,
    outliers: Vec<f32>,
}

impl BoxPlot {
    /// Quartiles are taken in log10 space on a log plot, so the whiskers
    /// never cross zero.
    fn marks(&self) -> Vec<BoxMark> {
        let mut marks = Vec::new();
        for (g, group) in self.groups.iter().enumerate() {
            for (s, values) in group.values.iter().enumerate() {
                let v: Vec<f64> = values
                    .iter()
                    .copied()
                    .filter(|v| v.is_finite() && (!self.log_scale || *v > 0.0))
                    .map(|v| if self.log_scale { v.log10() } else { v })
                    .collect();
                if v.is_empty() {
                    continue;
                }
                let quartiles = Quartiles::new(&v);
                let [lo, _, _, _, hi] = quartiles.values();
                let outliers = v.iter().map(|x| *x as f32).filter(|x| *x < lo || *x > hi).collect();
                marks.push(BoxMark {
                    group: g,
                    series: s,
                    quartiles,
                    outliers,
                });
            }
        }
        marks
    }
}

pub fn render_box_plot(plot: &BoxPlot) -> Result<String, MacroLcaError> {
    let marks = plot.marks();
    if marks.is_empty() {
        return Err(MacroLcaError::Plot(format!("{}: nothing to draw", plot.title)));
    }
    let (lo, hi) = marks
        .iter()
        .flat_map(|m| {
            let extra: &[f32] = if plot.show_outliers { &m.outliers } else { &[] };
            m.quartiles.values().into_iter().chain(extra.iter().copied())
        })
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));
    let pad = ((hi - lo) * 0.05).max(0.5);

    let names: Vec<String> = plot.groups.iter().map(|g| g.name.clone()).collect();
    let series = plot.series.len().max(1);
    let slot = (BOX_SIZE.0 - 140) / names.len().max(1) as u32;
    let width = (slot * 3 / 4 / series as u32).clamp(4, 60);
    let offset = |s: usize| (s as f64 - (series as f64 - 1.0) / 2.0) * f64::from(width + 2);
    let style = |m: &BoxMark| {
        if plot.series.is_empty() {
            colour(m.group)
        } else {
            colour(m.series)
        }
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, BOX_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&plot.title, (FONT, 20))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(90)
            .build_cartesian_2d(names[..].into_segmented(), (lo - pad)..(hi + pad))
            .map_err(plot_error)?;
        let log = plot.log_scale;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(plot.group_label.as_str())
            .y_desc(plot.value_label.as_str())
            .x_label_formatter(&segment_label)
            .y_label_formatter(&|v: &f32| tick(f64::from(*v), log))
            .draw()
            .map_err(plot_error)?;

        let names = &names;
        for s in 0..series {
            let drawn = chart
                .draw_series(marks.iter().filter(|m| m.series == s).map(|m| {
                    Boxplot::new_vertical(SegmentValue::CenterOf(&names[m.group]), &m.quartiles)
                        .width(width)
                        .whisker_width(0.5)
                        .style(style(m))
                        .offset(offset(s))
                }))
                .map_err(plot_error)?;
            if let Some(name) = plot.series.get(s) {
                let c = colour(s);
                drawn
                    .label(name.as_str())
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], c.filled()));
            }

            if plot.show_outliers {
                let dx = offset(s) as i32;
                chart
                    .draw_series(marks.iter().filter(|m| m.series == s).flat_map(|m| {
                        let c = style(m);
                        m.outliers.iter().map(move |v| {
                            EmptyElement::at((SegmentValue::CenterOf(&names[m.group]), *v))
                                + Circle::new((dx, 0), 3, c)
                        })
                    }))
                    .map_err(plot_error)?;
            }
        }

        if !plot.series.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(plot_error)?;
        }
        root.present().map_err(plot_error)?;
    }
    Ok(svg)
}

#[derive(Debug, Clone)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub group: String,
    pub hover: String,
}

#[derive(Debug, Clone)]
pub struct ScatterPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub log_scale: bool,
    pub points: Vec<ScatterPoint>,
    /// Fitted curve sampled in data space.
    pub fit: Vec<(f64, f64)>,
}

impl ScatterPlot {
    /// Group names in sorted order; one colour each.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self.points.iter().map(|p| p.group.as_str()).collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    fn range(&self, axis: impl Fn(&ScatterPoint) -> f64) -> (f64, f64) {
        let (lo, hi) = self
            .points
            .iter()
            .map(axis)
            .filter(|v| v.is_finite() && (!self.log_scale || *v > 0.0))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));
        if !lo.is_finite() {
            return if self.log_scale { (0.1, 10.0) } else { (-1.0, 1.0) };
        }
        if self.log_scale {
            (lo / 2.0, hi * 2.0)
        } else {
            let pad = ((hi - lo) * 0.05).max(0.5);
            (lo - pad, hi + pad)
        }
    }
}

/// Draws points per group, the fit line and the legend on any 2d coordinate.
macro_rules! draw_scatter {
    ($root:expr, $plot:expr, $x:expr, $y:expr) => {{
        let log = $plot.log_scale;
        let mut chart = ChartBuilder::on($root)
            .caption(&$plot.title, (FONT, 16))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(90)
            .build_cartesian_2d($x, $y)
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .x_desc($plot.x_label.as_str())
            .y_desc($plot.y_label.as_str())
            .x_label_formatter(&|v: &f64| if log { format!("{v:.0e}") } else { format!("{v:.1}") })
            .y_label_formatter(&|v: &f64| if log { format!("{v:.0e}") } else { format!("{v:.1}") })
            .draw()
            .map_err(plot_error)?;

        for (i, group) in $plot.groups().into_iter().enumerate() {
            let c = colour(i);
            chart
                .draw_series(
                    $plot
                        .points
                        .iter()
                        .filter(|p| p.group == group)
                        .map(|p| Circle::new((p.x, p.y), 4, c.filled())),
                )
                .map_err(plot_error)?
                .label(group)
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, c.filled()));
        }
        if $plot.fit.len() > 1 {
            chart
                .draw_series(LineSeries::new($plot.fit.iter().copied(), BLACK.stroke_width(2)))
                .map_err(plot_error)?;
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_error)?;
    }};
}

pub fn render_scatter_plot(plot: &ScatterPlot) -> Result<String, MacroLcaError> {
    let (x0, x1) = plot.range(|p| p.x);
    let (y0, y1) = plot.range(|p| p.y);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SCATTER_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        if plot.log_scale {
            draw_scatter!(&root, plot, (x0..x1).log_scale(), (y0..y1).log_scale());
        } else {
            draw_scatter!(&root, plot, x0..x1, y0..y1);
        }
        root.present().map_err(plot_error)?;
    }
    Ok(svg)
}

/// Standalone HTML page embedding one SVG. `points` become a collapsible
/// list under the chart.
pub fn html_page(title: &str, svg: &str, points: &[&str]) -> String {
    let title = quick_xml::escape::escape(title);
    let mut list = String::new();
    if !points.is_empty() {
        list.push_str(&format!("<details>\n<summary>{} points</summary>\n<ol>\n", points.len()));
        for p in points {
            list.push_str(&format!("<li>{}</li>\n", quick_xml::escape::escape(*p).replace('\n', "<br>")));
        }
        list.push_str("</ol>\n</details>\n");
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n{svg}\n{list}</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;

    fn well_formed(svg: &str) {
        assert!(svg.contains("<svg"));
        let mut reader = quick_xml::Reader::from_str(svg);
        while !matches!(reader.read_event().unwrap(), Event::Eof) {}
    }

    #[test]
    fn test_box_plot_by_category() {
        let plot = BoxPlot {
            title: "Total waste (kg/kg)".into(),
            group_label: "Product category".into(),
            value_label: "kg/kg".into(),
            log_scale: true,
            show_outliers: true,
            series: vec![],
            groups: vec![
                BoxGroup {
                    name: "ProcBio".into(),
                    values: vec![vec![0.1, 0.2, 0.3, 0.4, 50.0]],
                },
                BoxGroup {
                    name: "MetalAlloy".into(),
                    values: vec![vec![1.0, 2.0]],
                },
            ],
        };
        let marks = plot.marks();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].outliers.len(), 1);

        let svg = render_box_plot(&plot).unwrap();
        well_formed(&svg);
        assert!(svg.contains("ProcBio"));
        assert!(svg.contains("MetalAlloy"));
    }

    #[test]
    fn test_box_plot_with_series_draws_legend() {
        let plot = BoxPlot {
            title: "Human health damage (DALY/kg)".into(),
            group_label: "Year".into(),
            value_label: "DALY/kg".into(),
            log_scale: false,
            show_outliers: false,
            series: vec!["SSP1-PkBudg500".into(), "SSP5-Base".into()],
            groups: vec![
                BoxGroup {
                    name: "2030".into(),
                    values: vec![vec![1.0, 2.0, 3.0], vec![2.0, 4.0]],
                },
                BoxGroup {
                    name: "2050".into(),
                    values: vec![vec![], vec![5.0]],
                },
            ],
        };
        assert_eq!(plot.marks().len(), 3);
        let svg = render_box_plot(&plot).unwrap();
        well_formed(&svg);
        assert!(svg.contains("SSP5-Base"));
        assert!(svg.contains("2050"));
    }

    #[test]
    fn test_box_plot_without_values_fails() {
        let plot = BoxPlot {
            title: "empty".into(),
            group_label: String::new(),
            value_label: String::new(),
            log_scale: true,
            show_outliers: true,
            series: vec![],
            groups: vec![BoxGroup {
                name: "a".into(),
                values: vec![vec![0.0, -1.0]],
            }],
        };
        assert!(matches!(render_box_plot(&plot), Err(MacroLcaError::Plot(_))));
    }

    #[test]
    fn test_scatter_with_fit_and_point_list() {
        let plot = ScatterPlot {
            title: "x vs y".into(),
            x_label: "x".into(),
            y_label: "y".into(),
            log_scale: true,
            points: vec![
                ScatterPoint { x: 1.0, y: 2.0, group: "B".into(), hover: "market for a".into() },
                ScatterPoint { x: 10.0, y: 20.0, group: "A".into(), hover: "market for b".into() },
            ],
            fit: vec![(1.0, 2.0), (10.0, 20.0)],
        };
        assert_eq!(plot.groups(), vec!["A", "B"]);
        let svg = render_scatter_plot(&plot).unwrap();
        well_formed(&svg);
        assert!(svg.contains("<polyline"));

        let hovers: Vec<&str> = plot.points.iter().map(|p| p.hover.as_str()).collect();
        let html = html_page("x & y", &svg, &hovers);
        assert!(html.contains("<title>x &amp; y</title>"));
        assert!(html.contains("<li>market for a</li>"));
    }
}
