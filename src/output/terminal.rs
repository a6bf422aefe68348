// Colored terminal output for subgroup tables.
//
// Renders the subgroup hierarchy as an indented tree: size, matched users,
// cutoff, the most distinctive words, and exemplar ids.

use colored::Colorize;

use super::table::{SubgroupRow, SubgroupTable};

/// Display the subgroup hierarchy in the terminal.
pub fn display_table(table: &SubgroupTable) {
    let Some(root) = table.row(0) else {
        println!("No subgroups found. Run `strata analyze` first.");
        return;
    };

    let matched_users: usize = table.rows.iter().map(|r| r.matched_user_ids.len()).sum();
    println!(
        "\n{}",
        format!(
            "=== Subgroups ({} found, {} texts, {} user matches) ===",
            table.rows.len(),
            root.size(),
            matched_users
        )
        .bold()
    );
    println!(
        "  {}",
        format!("Generated {}", table.generated_at.format("%Y-%m-%d %H:%M UTC")).dimmed()
    );
    println!();

    let mut stack = vec![root];
    while let Some(row) = stack.pop() {
        display_row(row);
        let mut children = table.children(row.subgroup_id);
        children.reverse();
        stack.extend(children);
    }
}

fn display_row(row: &SubgroupRow) {
    let indent = "  ".repeat(row.depth + 1);
    let label = if row.parent_id.is_none() {
        "root".bold().to_string()
    } else {
        format!("#{}", row.subgroup_id).cyan().bold().to_string()
    };

    println!(
        "{indent}{label}  {} texts  {} users  {}",
        row.size(),
        colorize_count(row.matched_user_ids.len()),
        format!("cutoff {:.2}", row.cutoff).dimmed(),
    );

    if !row.top_words.is_empty() {
        let words: Vec<String> = row
            .top_words
            .iter()
            .map(|w| format!("{} ({:+.1})", w.word, w.z))
            .collect();
        println!("{indent}  {} {}", "+".green(), words.join(", "));
    }
    if !row.bottom_words.is_empty() {
        let words: Vec<String> = row
            .bottom_words
            .iter()
            .map(|w| format!("{} ({:+.1})", w.word, w.z))
            .collect();
        println!("{indent}  {} {}", "-".red(), words.join(", ").dimmed());
    }
    for exemplar in &row.exemplars {
        println!(
            "{indent}  {} {}",
            format!("{}:", exemplar.role).dimmed(),
            exemplar.id
        );
    }
}

fn colorize_count(count: usize) -> colored::ColoredString {
    if count == 0 {
        count.to_string().dimmed()
    } else {
        count.to_string().yellow()
    }
}
