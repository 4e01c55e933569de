//! Anomalies-only vector chart.
//!
//! Hand-assembled SVG with fixed two-decimal coordinates, no font embedding
//! and no path simplification, so the same classified gaps always produce
//! the same bytes. Each anomaly is one bar: position is its start within
//! the period, height scales with log duration.

use fxaudit_core::domain::{ClassifiedGap, GapLabel};
use fxaudit_core::period::Period;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 320.0;
const MARGIN_LEFT: f64 = 50.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 30.0;

/// Render the anomaly chart for one period. Non-anomaly gaps are ignored.
pub fn render_anomaly_chart(period: &Period, classified: &[ClassifiedGap]) -> String {
    let anomalies: Vec<&ClassifiedGap> = classified
        .iter()
        .filter(|c| c.label == GapLabel::Anomaly)
        .collect();

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let span_secs = (period.end - period.start).num_seconds().max(1) as f64;

    // Log scale against the longest anomaly; a lone 61 s gap still shows.
    let max_log = anomalies
        .iter()
        .map(|c| (c.gap.length_secs() as f64).ln())
        .fold(f64::ln(61.0), f64::max);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
    ));
    svg.push_str(&format!(
        "  <text x=\"{MARGIN_LEFT}\" y=\"24\" font-family=\"sans-serif\" font-size=\"16\">\
         Anomaly gaps — {} ({} total)</text>\n",
        period.label,
        anomalies.len()
    ));
    // Baseline.
    svg.push_str(&format!(
        "  <line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"#333\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        MARGIN_TOP + plot_h,
        MARGIN_LEFT + plot_w,
        MARGIN_TOP + plot_h
    ));

    for cg in &anomalies {
        let offset = (cg.gap.start_ts - period.start).num_seconds() as f64;
        let x = MARGIN_LEFT + plot_w * offset / span_secs;
        let w = (plot_w * cg.gap.length_secs() as f64 / span_secs).max(1.0);
        let h = plot_h * (cg.gap.length_secs() as f64).ln() / max_log;
        svg.push_str(&format!(
            "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"#c0392b\">\
             <title>{} .. {} ({} s)</title></rect>\n",
            x,
            MARGIN_TOP + plot_h - h,
            w,
            h,
            cg.gap.start_ts.to_rfc3339(),
            cg.gap.end_ts.to_rfc3339(),
            cg.gap.length_secs()
        ));
    }

    svg.push_str("</svg>\n");
    svg
}
