use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use varscreen_cli::types::{
    EncodeReport, MergeReport, PredictReport, RunReport, ScreenReport,
};
use varscreen_score::RiskBand;

pub fn print_screen_summary(report: &ScreenReport) {
    println!("Cohort: {} subjects", report.cohort_size);
    println!("Registry: {}", report.registry_path.display());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Domain"),
        header_cell("Files"),
        header_cell("Accepted"),
        header_cell("Rejected"),
        header_cell("Failed"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=4 {
        align_column(&mut table, index, CellAlignment::Right);
    }

    let (mut files, mut accepted, mut rejected, mut failed) = (0, 0, 0, 0);
    for domain in &report.screening.domains {
        let domain_rejected: usize = domain.rejections().values().sum();
        files += domain.files.len();
        accepted += domain.accepted_count();
        rejected += domain_rejected;
        failed += domain.failures.len();
        table.add_row(vec![
            Cell::new(&domain.domain)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(domain.files.len()),
            count_cell(domain.accepted_count(), Color::Green),
            dim_cell(domain_rejected),
            count_cell(domain.failures.len(), Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(files).add_attribute(Attribute::Bold),
        count_cell(accepted, Color::Green).add_attribute(Attribute::Bold),
        Cell::new(rejected).add_attribute(Attribute::Bold),
        count_cell(failed, Color::Red).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    print_registry_table(report);
    print_rejection_table(report);

    let failures: Vec<_> = report.screening.failures().collect();
    if !failures.is_empty() {
        eprintln!("Errors:");
        for failure in failures {
            if failure.source_file.is_empty() {
                eprintln!("- {}: {}", failure.domain, failure.message);
            } else {
                eprintln!("- {}/{}: {}", failure.domain, failure.source_file, failure.message);
            }
        }
    }
}

/// Accepted variables per file, split by display group.
fn print_registry_table(report: &ScreenReport) {
    let registry = &report.screening.registry;
    if registry.is_empty() {
        return;
    }
    let totals: std::collections::BTreeMap<String, usize> =
        registry.domain_counts().into_iter().collect();

    let mut rows: Vec<(&str, &str, usize, usize)> = Vec::new();
    for record in registry.sorted_for_display() {
        let numerical = usize::from(record.var_type.category_label() == "Numerical");
        match rows.last_mut() {
            Some((domain, file, categorical, numeric))
                if *domain == record.domain && *file == record.source_file =>
            {
                *categorical += 1 - numerical;
                *numeric += numerical;
            }
            _ => rows.push((
                record.domain.as_str(),
                record.source_file.as_str(),
                1 - numerical,
                numerical,
            )),
        }
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Domain"),
        header_cell("File"),
        header_cell("Categorical"),
        header_cell("Numerical"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    let mut previous = None;
    for (domain, file, categorical, numeric) in rows {
        let domain_cell = if previous == Some(domain) {
            Cell::new("")
        } else {
            let count = totals.get(domain).copied().unwrap_or_default();
            Cell::new(format!("{domain} ({count})")).fg(Color::Blue)
        };
        previous = Some(domain);
        table.add_row(vec![
            domain_cell,
            Cell::new(file),
            Cell::new(categorical),
            Cell::new(numeric),
        ]);
    }
    println!();
    println!("Accepted variables:");
    println!("{table}");
}

fn print_rejection_table(report: &ScreenReport) {
    let mut totals = std::collections::BTreeMap::new();
    for domain in &report.screening.domains {
        for (reason, count) in domain.rejections() {
            *totals.entry(reason).or_insert(0usize) += count;
        }
    }
    if totals.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Reason"), header_cell("Variables")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (reason, count) in totals {
        table.add_row(vec![Cell::new(reason.as_str()), Cell::new(count)]);
    }
    println!();
    println!("Rejections:");
    println!("{table}");
}

pub fn print_merge_summary(report: &MergeReport) {
    println!("Merged: {}", report.merged_path.display());
    let mut table = Table::new();
    table.set_header(vec![header_cell("Rows"), header_cell("Columns"), header_cell("Complete cases")]);
    apply_table_style(&mut table);
    table.add_row(vec![
        Cell::new(report.cohort_size),
        Cell::new(report.columns),
        Cell::new(report.complete_cases),
    ]);
    println!("{table}");

    if report.skipped.is_empty() {
        return;
    }
    let mut skipped = Table::new();
    skipped.set_header(vec![
        header_cell("Domain"),
        header_cell("File"),
        header_cell("Variable"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut skipped);
    for skip in &report.skipped {
        skipped.add_row(vec![
            Cell::new(&skip.domain),
            Cell::new(&skip.source_file),
            skip.variable
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            Cell::new(&skip.reason).fg(Color::Yellow),
        ]);
    }
    println!();
    println!("Skipped:");
    println!("{skipped}");
}

pub fn print_encode_summary(report: &EncodeReport) {
    println!("Encoded: {}", report.encoded_path.display());
    println!("Features: {}", report.features_path.display());
    println!("Catalog: {}", report.catalog_path.display());
    println!("Correlations: {}", report.correlations_path.display());
    println!("Level summary: {}", report.level_summary_path.display());

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rows"),
        header_cell("Variables"),
        header_cell("Features"),
        header_cell("Dropped"),
        header_cell("Pruned"),
        header_cell("Label cut-off"),
    ]);
    apply_table_style(&mut table);
    table.add_row(vec![
        Cell::new(report.rows),
        Cell::new(report.variables),
        Cell::new(report.features),
        count_cell(report.dropped.len(), Color::Yellow),
        count_cell(report.pruned.len(), Color::Yellow),
        report
            .label_threshold
            .map_or_else(|| dim_cell("-"), |t| Cell::new(format!("{t:.2}"))),
    ]);
    println!("{table}");

    if report.top_correlations.is_empty() {
        return;
    }
    let mut ranking = Table::new();
    ranking.set_header(vec![header_cell("Variable"), header_cell("rho"), header_cell("n")]);
    apply_table_style(&mut ranking);
    align_column(&mut ranking, 1, CellAlignment::Right);
    align_column(&mut ranking, 2, CellAlignment::Right);
    for entry in &report.top_correlations {
        ranking.add_row(vec![
            Cell::new(&entry.variable),
            Cell::new(format!("{:+.3}", entry.rho)),
            Cell::new(entry.n),
        ]);
    }
    println!();
    println!("Strongest outcome correlations:");
    println!("{ranking}");
}

pub fn print_run_summary(report: &RunReport) {
    print_screen_summary(&report.screen);
    println!();
    print_merge_summary(&report.merge);
    println!();
    print_encode_summary(&report.encode);
}

pub fn print_prediction(report: &PredictReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Class"),
        header_cell("P(0)"),
        header_cell("P(1)"),
        header_cell("Risk"),
        header_cell("Answered"),
    ]);
    apply_table_style(&mut table);
    let [p0, p1] = report.prediction.probabilities;
    table.add_row(vec![
        Cell::new(report.prediction.class).add_attribute(Attribute::Bold),
        Cell::new(format!("{p0:.3}")),
        Cell::new(format!("{p1:.3}")),
        band_cell(report.band),
        Cell::new(format!("{}/{}", report.answered, report.features)),
    ]);
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn band_cell(band: RiskBand) -> Cell {
    let color = match band {
        RiskBand::Low => Color::Green,
        RiskBand::Moderate => Color::Yellow,
        RiskBand::High => Color::Red,
    };
    Cell::new(band.as_str())
        .fg(color)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
