//! Faceted histogram rendering using Plotters

use std::fs;
use std::path::Path;

use anyhow::Context;

use log::{debug, info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle, FontTransform};

use crate::data::AnalysisTable;
use crate::error::PipelineError;
use crate::model::{partition_facets, AccountBalance, CreditCardUse, Facet, Histogram, LoanUse};

pub const DEFAULT_TITLE: &str = "Account Average Balance by Loan and Credit Card Use";
pub const DEFAULT_BINS: usize = 20;
pub const DEFAULT_FONT: &str = "Lato-Regular.ttf";

/// Family name the font file is registered under
const FONT_FAMILY: &str = "balancegrid";

const X_DESC: &str = "Average Balance";
const Y_DESC: &str = "Frequency";

const IMAGE_SIZE: (u32, u32) = (1000, 800);
const COL_LABEL_HEIGHT: u32 = 30;
const ROW_LABEL_WIDTH: u32 = 30;

const BAR_COLOR: RGBColor = RGBColor(76, 114, 176);

/// Appearance of the facet grid
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Histogram bins per cell
    pub bins: usize,
    /// Overall title drawn above the grid
    pub title: String,
    /// TrueType/OpenType font file used for every piece of text
    pub font_path: String,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            title: DEFAULT_TITLE.to_string(),
            font_path: DEFAULT_FONT.to_string(),
        }
    }
}

/// Render the 2x2 grid of average balance histograms: loan use selects the
/// row, credit card use the column. Paths ending in `.svg` are drawn as SVG,
/// anything else as a bitmap.
pub fn render_facet_grid(
    records: &[AccountBalance],
    options: &GridOptions,
    output_path: &str,
) -> crate::Result<()> {
    if options.bins == 0 {
        return Err(PipelineError::InvalidBinCount.into());
    }
    if records.is_empty() {
        warn!("no accounts to plot, rendering empty facets");
    }

    load_font(&options.font_path)?;

    let facets = partition_facets(records);
    let histograms = facets
        .iter()
        .map(|facet| Histogram::from_values(&facet.balances, options.bins))
        .collect::<crate::Result<Vec<_>>>()?;

    let is_svg = Path::new(output_path)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(output_path, IMAGE_SIZE).into_drawing_area();
        draw_grid(&root, &facets, &histograms, options)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(output_path, IMAGE_SIZE).into_drawing_area();
        draw_grid(&root, &facets, &histograms, options)?;
        root.present()?;
    }

    info!("facet grid saved to: {}", output_path);
    Ok(())
}

/// Register the font file under `FONT_FAMILY`. A missing or unreadable file
/// fails the render.
fn load_font(font_path: &str) -> crate::Result<()> {
    let bytes = fs::read(font_path).with_context(|| format!("cannot read font file {}", font_path))?;
    // registered fonts must outlive every chart drawn in this process
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(FONT_FAMILY, FontStyle::Normal, bytes).map_err(|_| PipelineError::InvalidFont {
        path: font_path.to_string(),
    })?;
    debug!("registered font {}", font_path);
    Ok(())
}

/// Shared x range over all non-empty cells, unit range when every cell is empty
fn shared_x_range(histograms: &[Histogram]) -> (f64, f64) {
    histograms
        .iter()
        .filter_map(Histogram::range)
        .fold(None, |acc: Option<(f64, f64)>, (lo, hi)| match acc {
            Some((a, b)) => Some((a.min(lo), b.max(hi))),
            None => Some((lo, hi)),
        })
        .unwrap_or((0.0, 1.0))
}

fn draw_grid<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    facets: &[Facet],
    histograms: &[Histogram],
    options: &GridOptions,
) -> crate::Result<()>
where
    DB::ErrorType: 'static,
{
    let font = FONT_FAMILY;
    root.fill(&WHITE)?;

    let area = root.titled(&options.title, (font, 26).into_font())?;
    let (width, _) = area.dim_in_pixel();
    let (body, row_label_strip) = area.split_horizontally(width.saturating_sub(ROW_LABEL_WIDTH));
    let (col_label_strip, cells_area) = body.split_vertically(COL_LABEL_HEIGHT);
    let (_, row_label_strip) = row_label_strip.split_vertically(COL_LABEL_HEIGHT);

    let n_cols = CreditCardUse::ALL.len();
    let n_rows = LoanUse::ALL.len();

    // Margin titles: column names along the top, row names down the right side
    let col_style = TextStyle::from((font, 18).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    for (strip, cc_user) in col_label_strip.split_evenly((1, n_cols)).iter().zip(CreditCardUse::ALL) {
        draw_centered(strip, cc_user.label(), &col_style)?;
    }
    let row_style = TextStyle::from((font, 18).into_font().transform(FontTransform::Rotate90))
        .pos(Pos::new(HPos::Center, VPos::Center));
    for (strip, loan_user) in row_label_strip.split_evenly((n_rows, 1)).iter().zip(LoanUse::ALL) {
        draw_centered(strip, loan_user.label(), &row_style)?;
    }

    let (x_min, x_max) = shared_x_range(histograms);
    let max_count = histograms.iter().map(Histogram::max_count).max().unwrap_or(0);
    let y_max = if max_count == 0 { 1.0 } else { max_count as f64 * 1.05 };

    let cells = cells_area.split_evenly((n_rows, n_cols));
    for (idx, ((cell, facet), hist)) in cells.iter().zip(facets).zip(histograms).enumerate() {
        let (row, col) = (idx / n_cols, idx % n_cols);
        debug!(
            "drawing {} / {}: {} accounts in {} bins",
            facet.loan_user,
            facet.cc_user,
            hist.total(),
            hist.counts.len()
        );

        let mut chart = ChartBuilder::on(cell)
            .margin(8)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)?;

        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh()
            .x_labels(5)
            .label_style((font, 12))
            .axis_desc_style((font, 15));
        if row == n_rows - 1 {
            mesh.x_desc(X_DESC);
        }
        if col == 0 {
            mesh.y_desc(Y_DESC);
        }
        mesh.draw()?;

        chart.draw_series(
            hist.bars()
                .map(|(left, right, count)| Rectangle::new([(left, 0.0), (right, count as f64)], BAR_COLOR.filled())),
        )?;
        chart.draw_series(
            hist.bars()
                .map(|(left, right, count)| Rectangle::new([(left, 0.0), (right, count as f64)], WHITE.stroke_width(1))),
        )?;
    }

    Ok(())
}

fn draw_centered<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    text: &str,
    style: &TextStyle,
) -> crate::Result<()>
where
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    area.draw_text(text, style, ((w / 2) as i32, (h / 2) as i32))?;
    Ok(())
}

/// Print per-facet statistics of the joined table to console
pub fn print_facet_statistics(table: &AnalysisTable) {
    println!("\n=== Average Balance by Facet ===");
    println!("Total accounts: {}", table.len());
    println!();
    println!("  {:<12} | {:<18} | {:>8} | {:>10} | {:>10} | {:>10}", "Loans", "Credit Cards", "Accounts", "Mean", "Min", "Max");
    println!("  {:-<12}-|-{:-<18}-|-{:->8}-|-{:->10}-|-{:->10}-|-{:->10}", "", "", "", "", "", "");
    for facet in partition_facets(&table.records) {
        match facet.summary() {
            Some(s) => println!(
                "  {:<12} | {:<18} | {:>8} | {:>10.2} | {:>10.2} | {:>10.2}",
                facet.loan_user.label(),
                facet.cc_user.label(),
                s.count,
                s.mean,
                s.min,
                s.max
            ),
            None => println!(
                "  {:<12} | {:<18} | {:>8} | {:>10} | {:>10} | {:>10}",
                facet.loan_user.label(),
                facet.cc_user.label(),
                0,
                "-",
                "-",
                "-"
            ),
        }
    }
}
