use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::CalouroStatus;
use crate::view::StudentViewModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub status: CalouroStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSummary {
    pub course: String,
    pub count: usize,
    pub favorites: usize,
}

/// Counts per status, every status listed even when zero.
pub fn summarize_by_status(rows: &[StudentViewModel]) -> Vec<StatusSummary> {
    CalouroStatus::ALL
        .into_iter()
        .map(|status| StatusSummary {
            status,
            count: rows.iter().filter(|row| row.status == status).count(),
        })
        .collect()
}

pub fn summarize_by_course(rows: &[StudentViewModel]) -> Vec<CourseSummary> {
    let mut map: HashMap<&str, (usize, usize)> = HashMap::new();

    for row in rows {
        let entry = map.entry(row.course.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if row.is_favorited {
            entry.1 += 1;
        }
    }

    let mut summaries: Vec<CourseSummary> = map
        .into_iter()
        .map(|(course, (count, favorites))| CourseSummary {
            course: course.to_string(),
            count,
            favorites,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.course.cmp(&b.course)));
    summaries
}

pub fn build_report(city: &str, generated_on: NaiveDate, rows: &[StudentViewModel]) -> String {
    let statuses = summarize_by_status(rows);
    let courses = summarize_by_course(rows);
    let favorites = rows.iter().filter(|row| row.is_favorited).count();
    let remanejados = rows.iter().filter(|row| row.remanejado).count();

    let mut output = String::new();

    let _ = writeln!(output, "# Calouros de {city}");
    let _ = writeln!(output, "Gerado em {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "- Total: {}", rows.len());
    let _ = writeln!(output, "- Favoritos: {favorites}");
    let _ = writeln!(output, "- Remanejados: {remanejados}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status");

    for summary in &statuses {
        let _ = writeln!(output, "- {}: {}", summary.status.label(), summary.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cursos");

    if courses.is_empty() {
        let _ = writeln!(output, "Nenhum calouro para os filtros atuais.");
    } else {
        for summary in courses.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} calouros ({} favoritos)",
                summary.course, summary.count, summary.favorites
            );
        }
    }

    output
}
