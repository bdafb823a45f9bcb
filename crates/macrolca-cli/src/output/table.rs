use macrolca_core::report::SummaryRow;
use macrolca_core::FilterRun;

pub fn print_filter(run: &FilterRun, explain: bool) {
    for outcome in &run.outcomes {
        println!("=== {} ===\n", outcome.database);
        println!("  Kept {} of {} activities", outcome.records.len(), outcome.total);
        if outcome.degraded {
            println!("  (no classification data; every activity passed through unfiltered)");
        }
        if outcome.ambiguous() > 0 {
            println!("  {} kept activity(ies) matched overlapping category ranges", outcome.ambiguous());
        }

        let counts = outcome.trace.rejection_counts();
        if !counts.is_empty() {
            println!("\n  Rejections:");
            for (dim, n) in &counts {
                println!("    {:>6}  {}", n, dim.describe());
            }
        }

        for w in &outcome.trace.warnings {
            println!("\n  warning: {}", w.message);
        }

        if explain {
            let max_name = outcome
                .trace
                .decisions
                .iter()
                .map(|d| d.name.len())
                .max()
                .unwrap_or(10);
            println!();
            for d in &outcome.trace.decisions {
                let mark = if d.kept { "+" } else { "-" };
                println!("  {} {:<width$}  {}", mark, d.name, d.reason(), width = max_name);
            }
        }
        println!();
    }

    let mut per_category: Vec<(String, usize)> = Vec::new();
    for r in &run.merged {
        let cat = r.category.clone().unwrap_or_else(|| "-".to_string());
        match per_category.iter_mut().find(|(c, _)| *c == cat) {
            Some((_, n)) => *n += 1,
            None => per_category.push((cat, 1)),
        }
    }
    per_category.sort();

    println!("Merged: {} activities", run.merged.len());
    for (cat, n) in &per_category {
        println!("  {:<12} {}", cat, n);
    }
    println!("\nWritten to {}", run.merged_path.display());
}

pub fn print_summary(rows: &[SummaryRow]) {
    let max_method = rows.iter().map(|r| r.method.len()).max().unwrap_or(10);
    println!(
        "  {:<width$}  {:<5} {:<5} {:>10} {:>10} {:>10} {:>10}",
        "Method",
        "SSP",
        "Year",
        "Median",
        "Std",
        "Min",
        "Max",
        width = max_method
    );
    println!("  {}", "-".repeat(max_method + 58));
    for r in rows {
        println!(
            "  {:<width$}  {:<5} {:<5} {:>10} {:>10} {:>10} {:>10}",
            r.method,
            r.ssp,
            r.year,
            r.median,
            r.std,
            r.min,
            r.max,
            width = max_method
        );
    }
}
