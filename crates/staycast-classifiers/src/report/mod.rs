//! Side-by-side comparison of refit models, as CSV and as a static HTML page.
use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::{Deserialize, Serialize};

use crate::config::ModelFamily;
use crate::experiment::ModelBundle;
use crate::metrics::Metric;

/// Held-out scores of one final model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestScores {
    pub roc_auc: f64,
    pub accuracy: f64,
    pub log_loss: f64,
}

impl TestScores {
    pub fn compute(proba: &[f64], labels: &[bool]) -> Self {
        Self {
            roc_auc: crate::metrics::roc_auc(proba, labels),
            accuracy: crate::metrics::accuracy(proba, labels),
            log_loss: crate::metrics::log_loss(proba, labels),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub rank: usize,
    pub family: ModelFamily,
    pub config: String,
    pub cv_mean: f64,
    pub cv_std_err: f64,
    pub test_auc: f64,
    pub test_accuracy: f64,
    pub overridden: bool,
}

/// Final models ranked by held-out AUC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub cv_metric: Metric,
    pub rows: Vec<ComparisonRow>,
}

impl ModelComparison {
    pub fn from_bundles(bundles: &[ModelBundle]) -> Self {
        let cv_metric = bundles.first().map(|b| b.metric).unwrap_or_default();
        let mut rows: Vec<ComparisonRow> = bundles
            .iter()
            .map(|b| ComparisonRow {
                rank: 0,
                family: b.family,
                config: b.final_model.config.to_string(),
                cv_mean: b.selected.mean,
                cv_std_err: b.selected.std_err,
                test_auc: b.test_scores.roc_auc,
                test_accuracy: b.test_scores.accuracy,
                overridden: b.overridden_from.is_some(),
            })
            .collect();
        rows.sort_by(|a, b| b.test_auc.total_cmp(&a.test_auc).then(b.cv_mean.total_cmp(&a.cv_mean)));
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        if let Some(best) = rows.first() {
            log::info!("Best held-out model: {} (test AUC {:.4})", best.config, best.test_auc);
        }
        Self { cv_metric, rows }
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create comparison file: {}", path.as_ref().display()))?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn table(&self) -> Markup {
        html! {
            table {
                thead {
                    tr {
                        th { "Rank" }
                        th { "Family" }
                        th { "Configuration" }
                        th { "CV " (self.cv_metric.to_string()) " (mean ± s.e.)" }
                        th { "Test AUC" }
                        th { "Test accuracy" }
                    }
                }
                tbody {
                    @for row in &self.rows {
                        tr {
                            td { (row.rank) }
                            td { (row.family.to_string()) }
                            td {
                                code { (row.config) }
                                @if row.overridden { " (override)" }
                            }
                            td { (format!("{:.4} ± {:.4}", row.cv_mean, row.cv_std_err)) }
                            td { (format!("{:.4}", row.test_auc)) }
                            td { (format!("{:.4}", row.test_accuracy)) }
                        }
                    }
                }
            }
        }
    }
}

/// A titled block of HTML content.
pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string(), content: Vec::new() }
    }

    pub fn add_content(&mut self, markup: Markup) {
        self.content.push(markup);
    }
}

/// Minimal single-page HTML report.
pub struct Report {
    title: String,
    subtitle: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(title: &str, subtitle: &str) -> Self {
        Self { title: title.to_string(), subtitle: subtitle.to_string(), sections: Vec::new() }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    style {
                        (PreEscaped("body { font-family: sans-serif; margin: 2em; }
                        table { border-collapse: collapse; }
                        th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
                        th { background-color: #f5f5f5; }"))
                    }
                }
                body {
                    h1 { (self.title) }
                    p { (self.subtitle) }
                    @for s in &self.sections {
                        section {
                            h2 { (s.title) }
                            @for block in &s.content {
                                (block)
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(&path, self.render().into_string())
            .with_context(|| format!("Failed to write report: {}", path.as_ref().display()))
    }
}

/// HTML page with the comparison table and each model's held-out log loss.
pub fn comparison_report(comparison: &ModelComparison, bundles: &[ModelBundle]) -> Report {
    let mut report = Report::new(
        "Staycast model comparison",
        &format!("Generated {}", chrono::Local::now().format("%Y-%m-%d %H:%M")),
    );

    let mut overview = ReportSection::new("Final models");
    overview.add_content(html! {
        p { "Each family was tuned by cross-validation on the training split, refit on all training rows, and scored on the held-out test split." }
    });
    overview.add_content(comparison.table());
    report.add_section(overview);

    let mut details = ReportSection::new("Search details");
    details.add_content(html! {
        ul {
            @for b in bundles {
                li {
                    strong { (b.family.to_string()) } ": "
                    (b.search.ranked.len()) " of " (b.search.n_candidates()) " candidates scored, "
                    (b.search.failures.len()) " failed; test log loss "
                    (format!("{:.4}", b.test_scores.log_loss))
                    @if let Some(orig) = &b.overridden_from {
                        " (search selected " code { (orig.to_string()) } ")"
                    }
                }
            }
        }
    });
    report.add_section(details);
    report
}
