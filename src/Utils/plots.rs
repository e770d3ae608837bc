use itertools::izip;
use nalgebra::{DMatrix, DVector};

pub fn plots(arg: String, values: Vec<String>, t_result: DVector<f64>, y_result: DMatrix<f64>) {
    use plotters::prelude::*;
    let x = t_result;
    let y = y_result;
    let x_min = x.min();
    let x_max = x.max();
    for col in 0..y.ncols() {
        let y_col = y.column(col);
        let y_min = y_col.min();
        let y_max = y_col.max();
        let varname = values[col].clone();
        let filename = format!("{}.png", varname);
        let root_area = BitMapBackend::new(&filename, (800, 600)).into_drawing_area();
        root_area.fill(&WHITE).unwrap();

        let mut chart = ChartBuilder::on(&root_area)
            .caption(format!("{}", varname), ("sans-serif", 50))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_cartesian_2d(x_min * 0.95..x_max * 1.05, y_min * 0.95..y_max * 1.05)
            .unwrap();

        chart
            .configure_mesh()
            .x_desc(&arg)
            .y_desc(&varname)
            .draw()
            .unwrap();

        let series: Vec<(f64, f64)> = izip!(x.iter(), y_col.iter())
            .map(|(&x, &y)| (x, y))
            .collect();
        chart
            .draw_series(LineSeries::new(series, &Palette99::pick(col)))
            .unwrap()
            .label(format!(" {}", varname))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(col))
            });

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .unwrap();
    }
}

/// one named curve of a fit-overlay plot
pub struct FitSeries {
    pub name: String,
    pub t: DVector<f64>,
    pub y: DVector<f64>,
}

/// overlay of one observed component: noisy observations as a scatter, the
/// true-parameter curve and both fitted curves as lines
pub fn plot_fit(
    filename: &str,
    caption: &str,
    arg: &str,
    varname: &str,
    t_data: &DVector<f64>,
    y_data: &DVector<f64>,
    curves: &[FitSeries],
) {
    use plotters::prelude::*;

    let mut x_min = t_data.min();
    let mut x_max = t_data.max();
    let mut y_min = y_data.min();
    let mut y_max = y_data.max();
    for curve in curves {
        x_min = x_min.min(curve.t.min());
        x_max = x_max.max(curve.t.max());
        y_min = y_min.min(curve.y.min());
        y_max = y_max.max(curve.y.max());
    }
    let y_pad = 0.05 * (y_max - y_min).abs().max(1e-12);

    let root_area = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root_area.fill(&WHITE).unwrap();

    let mut chart = ChartBuilder::on(&root_area)
        .caption(caption, ("sans-serif", 40))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, (y_min - y_pad)..(y_max + y_pad))
        .unwrap();

    chart
        .configure_mesh()
        .x_desc(arg)
        .y_desc(varname)
        .draw()
        .unwrap();

    let points: Vec<(f64, f64)> = izip!(t_data.iter(), y_data.iter())
        .map(|(&t, &y)| (t, y))
        .collect();
    chart
        .draw_series(
            points
                .iter()
                .map(|&(t, y)| Circle::new((t, y), 2, BLACK.filled())),
        )
        .unwrap()
        .label(" noisy data")
        .legend(|(x, y)| Circle::new((x + 10, y), 2, BLACK.filled()));

    for (i, curve) in curves.iter().enumerate() {
        let series: Vec<(f64, f64)> = izip!(curve.t.iter(), curve.y.iter())
            .map(|(&t, &y)| (t, y))
            .collect();
        chart
            .draw_series(LineSeries::new(series, &Palette99::pick(i)))
            .unwrap()
            .label(format!(" {}", curve.name))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(i))
            });
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .unwrap();
}

use gnuplot::{AxesCommon, Caption, Color, Figure};
pub fn plot_fit_gnuplot(
    filename: &str,
    caption: &str,
    arg: &str,
    varname: &str,
    t_data: &DVector<f64>,
    y_data: &DVector<f64>,
    curves: &[FitSeries],
) {
    let mut fg = Figure::new();
    let palette = ["blue", "red", "green", "magenta", "cyan"];
    {
        let axes = fg
            .axes2d()
            .set_title(caption, &[])
            .set_x_label(arg, &[])
            .set_y_label(varname, &[]);
        let t: Vec<f64> = t_data.iter().copied().collect();
        let y: Vec<f64> = y_data.iter().copied().collect();
        axes.points(&t, &y, &[Caption("noisy data"), Color("black")]);
        for (i, curve) in curves.iter().enumerate() {
            let t: Vec<f64> = curve.t.iter().copied().collect();
            let y: Vec<f64> = curve.y.iter().copied().collect();
            axes.lines(
                &t,
                &y,
                &[Caption(&curve.name), Color(palette[i % palette.len()])],
            );
        }
    }
    fg.save_to_png(filename, 800, 600).unwrap();
}
