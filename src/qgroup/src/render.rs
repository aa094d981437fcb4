use crate::{
    id::QgroupId,
    listing::{Columns, QgroupRow},
    units::UnitMode,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

struct Column {
    header: &'static str,
    align: Align,
    cell: fn(&QgroupRow, UnitMode) -> String,
}

fn limit_cell(limit: Option<u64>, units: UnitMode) -> String {
    match limit {
        Some(n) => units.format(n),
        None => "none".to_string(),
    }
}

fn id_list_cell(ids: &[QgroupId]) -> String {
    if ids.is_empty() {
        return "---".to_string();
    }
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

fn selected_columns(columns: Columns) -> Vec<Column> {
    let mut out = vec![
        Column { header: "qgroupid", align: Align::Left, cell: |r, _| r.qgroupid.to_string() },
        Column { header: "rfer", align: Align::Right, cell: |r, u| u.format(r.rfer) },
        Column { header: "excl", align: Align::Right, cell: |r, u| u.format(r.excl) },
    ];
    if columns.contains(Columns::MAX_RFER) {
        out.push(Column { header: "max_rfer", align: Align::Right, cell: |r, u| limit_cell(r.max_rfer, u) });
    }
    if columns.contains(Columns::MAX_EXCL) {
        out.push(Column { header: "max_excl", align: Align::Right, cell: |r, u| limit_cell(r.max_excl, u) });
    }
    if columns.contains(Columns::PARENT) {
        out.push(Column { header: "parent", align: Align::Left, cell: |r, _| id_list_cell(&r.parents) });
    }
    if columns.contains(Columns::CHILD) {
        out.push(Column { header: "child", align: Align::Left, cell: |r, _| id_list_cell(&r.children) });
    }
    out
}

fn push_row(out: &mut String, cells: &[String], columns: &[Column], widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        let w = widths[i];
        line.push_str(&match columns[i].align {
            Align::Left => format!("{:<w$}", cell),
            Align::Right => format!("{:>w$}", cell),
        });
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn table(rows: &[QgroupRow], columns: Columns, units: UnitMode) -> String {
    let cols = selected_columns(columns);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| cols.iter().map(|c| (c.cell)(r, units)).collect())
        .collect();

    let widths: Vec<usize> = cols
        .iter()
        .enumerate()
        .map(|(i, c)| cells.iter().map(|row| row[i].len()).fold(c.header.len(), usize::max))
        .collect();

    let mut out = String::new();
    let headers: Vec<String> = cols.iter().map(|c| c.header.to_string()).collect();
    push_row(&mut out, &headers, &cols, &widths);
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &dashes, &cols, &widths);
    for row in &cells {
        push_row(&mut out, row, &cols, &widths);
    }
    out
}

pub fn json(rows: &[QgroupRow]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}
