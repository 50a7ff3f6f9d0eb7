use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use renal_cli::types::{AnalyzeResult, MergeResult};

pub fn print_merge_summary(result: &MergeResult) {
    println!("Merged data: {}", result.out_dir.display());
    println!("Merge QC: {}", result.qc_dir.display());

    let mut centers = Table::new();
    centers.set_header(vec![
        header_cell("Directory"),
        header_cell("Center"),
        header_cell("Patients"),
        header_cell("Visits"),
    ]);
    apply_summary_table_style(&mut centers);
    align_column(&mut centers, 2, CellAlignment::Right);
    align_column(&mut centers, 3, CellAlignment::Right);
    let mut total_patients = 0usize;
    let mut total_visits = 0usize;
    for center in &result.report.centers {
        total_patients += center.patients_n;
        total_visits += center.visits_n;
        centers.add_row(vec![
            Cell::new(center.directory.display()),
            Cell::new(&center.center_code)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(center.patients_n),
            Cell::new(center.visits_n),
        ]);
    }
    centers.add_row(vec![
        total_cell("TOTAL"),
        total_cell(format!("{} center code(s)", result.center_codes)),
        Cell::new(total_patients).add_attribute(Attribute::Bold),
        Cell::new(total_visits).add_attribute(Attribute::Bold),
    ]);
    println!("{centers}");

    let mut tables = Table::new();
    tables.set_header(vec![header_cell("Table"), header_cell("Rows merged")]);
    apply_table_style(&mut tables);
    align_column(&mut tables, 1, CellAlignment::Right);
    for (table, rows) in &result.report.row_counts {
        let rows_cell = if *rows > 0 {
            Cell::new(rows)
        } else {
            dim_cell("-")
        };
        tables.add_row(vec![Cell::new(table.name()), rows_cell]);
    }
    println!("{tables}");

    let report = &result.report;
    let counts = [
        ("Duplicate groups", report.duplicates.len()),
        ("Patient code collisions", report.collisions.len()),
    ];
    for (label, count) in counts {
        if count > 0 {
            println!("{label}: {count}");
        }
    }
    if !report.warnings.is_empty() {
        eprintln!("Warnings:");
        for warning in &report.warnings {
            eprintln!("- {warning}");
        }
    }
}

pub fn print_analyze_summary(result: &AnalyzeResult) {
    let log = &result.run_log;
    println!("Output: {}", result.output_dir.display());

    let mut table = Table::new();
    table.set_header(vec![header_cell("Measure"), header_cell("Value")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows: Vec<(&str, String)> = vec![
        ("Patients", log.patients_n.to_string()),
        ("Visits", log.visits_n.to_string()),
        ("Centers", log.centers_n.to_string()),
        ("Anchored patients", result.anchored.to_string()),
        ("eGFR decline >=40%", log.egfr_endpoints.n_40pct.to_string()),
        ("eGFR decline >=57%", log.egfr_endpoints.n_57pct.to_string()),
        ("IgAN patients", log.igan_remission.n_patients.to_string()),
        ("IgAN complete remission", log.igan_remission.n_cr.to_string()),
        ("IgAN partial remission", log.igan_remission.n_pr.to_string()),
        ("KFRE-4 evaluable", result.kfre4_evaluable.to_string()),
        ("KFRE-8 evaluable", result.kfre8_evaluable.to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");

    match &result.slope {
        Some(estimate) => println!(
            "eGFR slope: {:.2} mL/min/1.73m²/yr (95% CI {:.2} to {:.2}, p={:.4})",
            estimate.slope, estimate.ci_lower, estimate.ci_upper, estimate.p_value
        ),
        None => println!("eGFR slope: {}", log.slope_method),
    }
    for harmonization in &log.unit_harmonizations {
        eprintln!(
            "note: {} converted ({}, {} values)",
            harmonization.covariate, harmonization.conversion, harmonization.values_converted
        );
    }

    let mut files = Table::new();
    files.set_header(vec![header_cell("Generated file")]);
    apply_table_style(&mut files);
    for name in &log.generated_files {
        files.add_row(vec![Cell::new(name)]);
    }
    println!("{files}");
}

fn apply_table_style(table: &mut Table) {
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

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn total_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
