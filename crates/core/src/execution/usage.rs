//! Usage text

use crate::output::SharedWriter;
use crate::taskflow::Taskflow;

const PADDING: usize = 4;

/// Align tab-separated cells into columns. The last cell of a row is not
/// part of any column.
fn align(rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = Vec::new();
    for row in rows {
        let aligned = row.len().saturating_sub(1);
        for (i, cell) in row.iter().take(aligned).enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(i) {
                Some(max) => *max = (*max).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut text = String::new();
    for row in rows {
        let aligned = row.len().saturating_sub(1);
        for (i, cell) in row.iter().enumerate() {
            text.push_str(cell);
            if i < aligned {
                let fill = widths[i] + PADDING - cell.chars().count();
                text.push_str(&" ".repeat(fill));
            }
        }
        text.push('\n');
    }
    text
}

/// Render the usage text: flags, described tasks and the default task.
pub fn usage(flow: &Taskflow) -> String {
    let mut text = String::from("Usage: [flag(s)] task(s)\nFlags:\n");

    let flags: Vec<Vec<String>> = flow
        .params()
        .map(|param| {
            let info = param.info();
            vec![
                format!("  {}", info.short_flag().unwrap_or_default()),
                info.long_flag(),
                format!("Default: {}", param.new_value()),
                info.usage.clone(),
            ]
        })
        .collect();
    text.push_str(&align(&flags));

    text.push_str("Tasks:\n");
    let tasks: Vec<Vec<String>> = flow
        .tasks()
        .filter(|task| !task.description.is_empty())
        .map(|task| {
            let params = task
                .params
                .iter()
                .map(|name| format!("--{name}"))
                .collect::<Vec<_>>();
            let mut description = task.description.clone();
            if !params.is_empty() {
                description.push_str("; ");
                description.push_str(&params.join(" "));
            }
            vec![format!("  {}", task.name), description]
        })
        .collect();
    text.push_str(&align(&tasks));

    if let Some(task) = flow.default_task() {
        text.push_str(&format!("Default task: {}\n", task.name()));
    }
    text
}

pub fn write_usage(flow: &Taskflow, writer: &SharedWriter) {
    let text = usage(flow);
    writer.write_line(format_args!("{}", text.trim_end_matches('\n')));
}
