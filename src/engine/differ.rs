//! Diff display

use colored::Colorize;
use reconcile::{AccessDocument, Diff, DiffSummary};
use similar::{ChangeTag, TextDiff};

/// Display a pass diff grouped by direction
pub fn display_diff(diff: &Diff) {
    if diff.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Access Diff".bold()
    );
    println!("│");

    if !diff.new_subjects.is_empty() || !diff.removed_subjects.is_empty() {
        println!("│ {}", "Subjects".bold());
        for subject in &diff.new_subjects {
            println!("│   {} {}", "+".green(), subject);
        }
        for subject in &diff.removed_subjects {
            println!("│   {} {}", "-".red(), subject);
        }
        println!("│");
    }

    display_grants("Grants", &diff.to_add, "+".green().to_string());
    display_grants("Revokes", &diff.to_remove, "-".red().to_string());

    let summary = DiffSummary::from_diff(diff);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to grant, {} to revoke",
        summary.grants_to_add.to_string().green(),
        summary.grants_to_remove.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn display_grants(title: &str, document: &AccessDocument, symbol: String) {
    if document.is_empty() {
        return;
    }

    println!("│ {}", title.bold());
    for grant in document.grants() {
        println!(
            "│   {} {:<20} {}({}) {}",
            symbol,
            grant.subject,
            grant.capability,
            grant.qualifiers.join(", "),
            format!("on {}", grant.resource).dimmed()
        );
    }
    println!("│");
}

/// Changed lines between two texts, prefixed `- ` or `+ `
pub fn changed_lines(old: &str, new: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| {
            let sign = if change.tag() == ChangeTag::Delete { "-" } else { "+" };
            let line = change.to_string();
            (change.tag(), format!("{sign} {}", line.trim_end_matches('\n')))
        })
        .collect()
}

/// Show a line diff between the locked and desired documents
pub fn display_text_diff(locked: &str, desired: &str) {
    let lines = changed_lines(locked, desired);
    if lines.is_empty() {
        println!("    {}", "(files are identical)".dimmed());
        return;
    }

    for (tag, line) in lines {
        match tag {
            ChangeTag::Delete => println!("    {}", line.red()),
            _ => println!("    {}", line.green()),
        }
    }
}
