//! Markdown rendering of the run summary

use crate::domain::RunSummary;

/// Renders the summary as the Markdown shown in the job summary.
///
/// With updates: an `Updated Packages` heading, the count line and a
/// `Package | Version` table. Without: the single "No packages were updated"
/// line.
pub fn render_markdown_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    if summary.has_updates() {
        out.push_str("## Updated Packages\n\n");
        out.push_str(&summary.headline());
        out.push_str("\n\n");
        out.push_str("| Package | Version |\n");
        out.push_str("| --- | --- |\n");
        for row in &summary.rows {
            out.push_str(&format!(
                "| {} | {} |\n",
                escape_cell(&row.package_name),
                escape_cell(&row.tag_name)
            ));
        }
    } else {
        out.push_str(&summary.headline());
        out.push('\n');
    }

    if !summary.untagged.is_empty() {
        out.push_str(&format!(
            "\n**Published without a tag:** {}\n",
            summary.untagged.join(", ")
        ));
    }

    if summary.cancelled {
        out.push_str("\n_Run cancelled before all packages were processed._\n");
    }

    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
