//! Plain-text and JSON rendering of power summaries.

use std::fmt::Write;

use mixpower_core::aggregate::PowerSummary;

/// Format a group value; count fields print without decimals
pub fn format_group_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}

/// Format a percentage value
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Render summaries as an aligned table, one row per group and term.
pub fn format_power_table(summaries: &[PowerSummary], alpha: f64) -> String {
    if summaries.is_empty() {
        return "no fixed-effect estimates to summarize\n".to_string();
    }

    let group_header = summaries
        .iter()
        .find_map(|s| s.group)
        .map(|g| g.field.name());

    let mut header = vec![
        "term".to_string(),
        "n".to_string(),
        "mean estimate".to_string(),
        "mean SE".to_string(),
        format!("power (alpha={})", alpha),
        "MC error".to_string(),
    ];
    if let Some(name) = group_header {
        header.insert(0, name.to_string());
    }

    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            let mut row = vec![
                s.term_name.clone(),
                s.n.to_string(),
                format!("{:.3}", s.mean_estimate),
                format_optional(s.mean_std_error),
                format_percentage(s.power),
                format_percentage(s.power_mc_error),
            ];
            if group_header.is_some() {
                row.insert(0, s.group.map_or_else(String::new, |g| format_group_value(g.value)));
            }
            row
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            rows.iter()
                .map(|r| r[col].len())
                .chain(std::iter::once(header[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let mut push_line = |cells: &[String]| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                // Text columns left-aligned, numbers right-aligned
                let text_column = i == usize::from(group_header.is_some());
                if text_column {
                    format!("{:<w$}", cell)
                } else {
                    format!("{:>w$}", cell)
                }
            })
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };
    push_line(&header);
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    push_line(&rule);
    for row in &rows {
        push_line(row);
    }
    out
}

/// Render summaries as pretty-printed JSON
pub fn power_json(summaries: &[PowerSummary]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixpower_core::aggregate::GroupValue;
    use mixpower_core::model::DesignField;

    fn summary(group: Option<f64>, term: &str, power: f64) -> PowerSummary {
        PowerSummary {
            group: group.map(|value| GroupValue {
                field: DesignField::NSubjects,
                value,
            }),
            term_name: term.to_string(),
            n: 100,
            mean_estimate: 49.5,
            mean_std_error: Some(9.25),
            power,
            power_mc_error: 0.04,
        }
    }

    #[test]
    fn test_format_group_value() {
        assert_eq!(format_group_value(20.0), "20");
        assert_eq!(format_group_value(0.25), "0.250");
        assert_eq!(format_group_value(-0.0), "0");
    }

    #[test]
    fn test_empty_table() {
        assert!(format_power_table(&[], 0.05).starts_with("no fixed-effect"));
    }

    #[test]
    fn test_grouped_table_layout() {
        let table = format_power_table(
            &[
                summary(Some(5.0), "conditiontreatment", 0.25),
                summary(Some(40.0), "conditiontreatment", 0.9),
            ],
            0.05,
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("n_subjects  term"));
        assert!(lines[0].contains("power (alpha=0.05)"));
        assert!(lines[1].starts_with("----------"));
        assert!(lines[2].trim_start().starts_with("5  conditiontreatment"));
        assert!(lines[2].contains("25.0%"));
        assert!(lines[3].contains("90.0%"));
        assert!(lines[3].contains("9.250"));
    }

    #[test]
    fn test_ungrouped_table_has_no_group_column() {
        let table = format_power_table(&[summary(None, "(Intercept)", 1.0)], 0.01);
        assert!(table.starts_with("term"));
        assert!(table.contains("100.0%"));
    }

    #[test]
    fn test_json_round_trips() {
        let summaries = vec![summary(Some(5.0), "conditiontreatment", 0.25)];
        let json = power_json(&summaries).unwrap();
        let parsed: Vec<PowerSummary> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summaries);
    }
}
