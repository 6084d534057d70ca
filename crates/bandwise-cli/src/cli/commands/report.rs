use std::fmt::Write as _;

use bandwise_core::{EssayFeedback, TaskNumber};

use crate::cli::args::OutputFormat;

pub fn render(feedback: &EssayFeedback, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(feedback)?,
        OutputFormat::Text => format_text(feedback),
    })
}

pub fn format_text(feedback: &EssayFeedback) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report {}", feedback.id());
    let _ = writeln!(
        out,
        "Overall band: {:.1} (target {:.1})",
        feedback.overall_score(),
        feedback.target_band()
    );

    for task in TaskNumber::ALL {
        let Some(eval) = feedback.per_task().get(task) else {
            continue;
        };
        let _ = writeln!(out);
        if eval.placeholder {
            let _ = writeln!(out, "{}: not submitted", task);
            continue;
        }
        let _ = writeln!(out, "{}", task);
        for criterion in task.criteria() {
            match eval.score(criterion) {
                Some(score) => {
                    let _ = writeln!(out, "  {:<32} {:.1}", criterion.label(), score);
                }
                None => {
                    let _ = writeln!(out, "  {:<32} -", criterion.label());
                }
            }
        }

        let findings: Vec<_> = feedback.findings_for(task).collect();
        if !findings.is_empty() {
            let _ = writeln!(out, "  Improvements:");
            for f in findings {
                let _ = writeln!(
                    out,
                    "    [{}] \"{}\" -> \"{}\" ({})",
                    f.id,
                    f.original_span,
                    f.improved_span,
                    f.criterion.label()
                );
                if !f.explanation.is_empty() {
                    let _ = writeln!(out, "        {}", f.explanation);
                }
            }
        }
    }

    if !feedback.overall_feedback().is_empty() {
        let _ = writeln!(out, "\n{}", feedback.overall_feedback());
    }
    if !feedback.strengths().is_empty() {
        let _ = writeln!(out, "\nStrengths:");
        for s in feedback.strengths() {
            let _ = writeln!(out, "  - {}", s);
        }
    }
    if !feedback.areas_for_improvement().is_empty() {
        let _ = writeln!(out, "\nAreas for improvement:");
        for a in feedback.areas_for_improvement() {
            let _ = writeln!(out, "  - {}: {}", a.title, a.feedback);
        }
    }
    out
}
