//! Plain-text and JSON rendering of analysis results.

use std::fmt::Write as _;

use crate::analysis::AnalysisReport;
use crate::mcs::CutSet;

/// Renders the full plain-text report.
pub fn format_report(report: &AnalysisReport) -> String {
    let mut out = String::new();

    for warning in &report.warnings {
        let _ = writeln!(out, "\nWARNING: {}", warning);
    }

    let _ = writeln!(out, "\nMinimal Cut Sets");
    let _ = writeln!(out, "================\n");
    let _ = writeln!(out, "{:<40}{}", "Top Event:", report.summary.top_gate);
    if let Some(name) = &report.model_name {
        let _ = writeln!(out, "{:<40}{}", "Model:", name);
    }
    let _ = writeln!(
        out,
        "{:<40}{}",
        "Time:",
        report.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<40}{}",
        "Number of Basic Events:", report.summary.num_basic_events
    );
    let _ = writeln!(out, "{:<40}{}", "Number of Gates:", report.summary.num_gates);
    let _ = writeln!(
        out,
        "{:<40}{}",
        "Limit on order of cut sets:", report.limit_order
    );
    let _ = writeln!(
        out,
        "{:<40}{}",
        "Minimal Cut Set Maximum Order:", report.mcs.max_order
    );
    let _ = writeln!(
        out,
        "{:<40}{}",
        "Total number of MCS found:",
        report.mcs.cut_sets.len()
    );
    let _ = writeln!(
        out,
        "{:<40}{:.5}s",
        "Gate Expansion Time:", report.exp_time
    );
    let _ = writeln!(
        out,
        "{:<40}{:.5}s",
        "MCS Generation Time:",
        report.mcs_time - report.exp_time
    );

    for order in 1..=report.mcs.max_order {
        let sets: Vec<&CutSet> = report
            .mcs
            .cut_sets
            .iter()
            .filter(|set| set.order() == order)
            .collect();
        if sets.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\nOrder {}:", order);
        for (i, set) in sets.iter().enumerate() {
            let _ = writeln!(out, "{}) {}", i + 1, set);
        }
    }

    if let Some(probability) = &report.probability {
        let _ = writeln!(out, "\nProbability Analysis");
        let _ = writeln!(out, "====================\n");
        let _ = writeln!(out, "{:<40}{:.6e}", "Total Probability:", probability.p_total);
        if let Some(p_time) = report.p_time {
            let _ = writeln!(out, "{:<40}{:.5}s", "Probability Calculation Time:", p_time);
        }
        let _ = writeln!(
            out,
            "{:<40}{}",
            "Cut sets above the cut-off:", probability.num_prob_mcs
        );

        if !probability.mcs_probabilities.is_empty() {
            let _ = writeln!(out, "\nMinimal Cut Set Probabilities Sorted by Order:");
            let mut by_order = probability.mcs_probabilities.clone();
            by_order.sort_by(|a, b| a.0.order().cmp(&b.0.order()).then_with(|| a.0.cmp(&b.0)));
            for (i, (set, p)) in by_order.iter().enumerate() {
                let _ = writeln!(out, "{:<4}{:<50}{:.6e}", i + 1, set.to_string(), p);
            }

            let _ = writeln!(out, "\nMinimal Cut Set Probabilities Sorted by Probability:");
            let mut by_probability = probability.mcs_probabilities.clone();
            by_probability.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            for (i, (set, p)) in by_probability.iter().enumerate() {
                let _ = writeln!(out, "{:<4}{:<50}{:.6e}", i + 1, set.to_string(), p);
            }
        }

        if !probability.importance.is_empty() {
            let _ = writeln!(out, "\nBasic Event Importance (Fussell-Vesely):");
            let _ = writeln!(out, "{:<30}{:>14}{:>14}", "Event", "Contribution", "Importance");
            for record in &probability.importance {
                let _ = writeln!(
                    out,
                    "{:<30}{:>14.6e}{:>13.2}%",
                    record.literal.to_string(),
                    record.contribution,
                    100.0 * record.importance
                );
            }
        }
    }

    if let Some(uncertainty) = &report.uncertainty {
        let _ = writeln!(out, "\nUncertainty Analysis");
        let _ = writeln!(out, "====================\n");
        let _ = writeln!(out, "{:<40}{:.6e}", "Mean:", uncertainty.mean);
        let _ = writeln!(out, "{:<40}{:.6e}", "Standard Deviation:", uncertainty.sigma);
        let _ = writeln!(
            out,
            "{:<40}[{:.6e}, {:.6e}]",
            "95% Confidence Interval:",
            uncertainty.confidence_interval.0,
            uncertainty.confidence_interval.1
        );
        if let Some(u_time) = report.u_time {
            let _ = writeln!(out, "{:<40}{:.5}s", "Sampling Time:", u_time);
        }

        let _ = writeln!(out, "\nDensity Distribution:");
        let _ = writeln!(out, "{:>14}{:>14}", "Midpoint", "Density");
        for (midpoint, density) in &uncertainty.distribution {
            let _ = writeln!(out, "{:>14.6e}{:>14.6e}", midpoint, density);
        }

        let _ = writeln!(out, "\nQuantiles:");
        let n = uncertainty.quantiles.len();
        for (i, value) in uncertainty.quantiles.iter().enumerate() {
            let level = (i + 1) as f64 / n as f64;
            let _ = writeln!(out, "{:>8.2}{:>18.6e}", level, value);
        }
    }

    out
}

/// Renders the report as pretty JSON.
pub fn format_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RiskAnalysis;
    use sylva_model::{BasicEvent, Formula, Model, Settings};

    fn full_report() -> AnalysisReport {
        let mut model = Model::new("demo");
        model.add_basic_event(BasicEvent::with_probability("pump-a", 0.1)).unwrap();
        model.add_basic_event(BasicEvent::with_probability("pump-b", 0.2)).unwrap();
        model
            .add_gate("top", Formula::any_of(&["pump-a", "pump-b"]))
            .unwrap();
        let settings = Settings::default().importance(true).uncertainty(true);
        RiskAnalysis::new(model, settings).analyze().unwrap()
    }

    #[test]
    fn text_report_carries_every_section() {
        let text = format_report(&full_report());
        assert!(text.contains("Minimal Cut Sets"));
        assert!(text.contains("Order 1:"));
        assert!(text.contains("{pump-a}"));
        assert!(text.contains("Probability Analysis"));
        assert!(text.contains("Total Probability:"));
        assert!(text.contains("Sorted by Order"));
        assert!(text.contains("Sorted by Probability"));
        assert!(text.contains("Fussell-Vesely"));
        assert!(text.contains("Uncertainty Analysis"));
        assert!(text.contains("95% Confidence Interval:"));
        assert!(text.contains("Quantiles:"));
    }

    #[test]
    fn json_report_parses_back() {
        let json = format_json(&full_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["mcs"]["cut_sets"].is_array());
        assert!(value["probability"]["p_total"].is_number());
        assert!(value["uncertainty"]["mean"].is_number());
    }
}
