use std::collections::HashMap;
use std::io::{BufRead, Write};

use thiserror::Error;

use crate::config::Constraints;
use crate::plates::Plate;
use crate::solution::Solution;
use crate::types::{Batch, Defect, Item, Stack};

pub const SOLUTION_HEADER: &str = "PLATE_ID;NODE_ID;X;Y;WIDTH;HEIGHT;TYPE;CUT;PARENT";

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing column {0}")]
    MissingColumn(&'static str),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

struct Table {
    columns: HashMap<String, usize>,
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    fn read<R: BufRead>(reader: R) -> Result<Self, InstanceError> {
        let mut lines = reader.lines().enumerate();
        let mut columns = HashMap::new();
        for (_, line) in lines.by_ref() {
            let line = line?;
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }
            for (i, name) in line.split(';').enumerate() {
                columns.insert(name.trim().to_uppercase(), i);
            }
            break;
        }

        let mut rows = Vec::new();
        for (i, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = line.split(';').map(|f| f.trim().to_string()).collect();
            rows.push((i + 1, fields));
        }
        Ok(Self { columns, rows })
    }

    fn column(&self, name: &'static str) -> Result<usize, InstanceError> {
        self.columns
            .get(name)
            .copied()
            .ok_or(InstanceError::MissingColumn(name))
    }
}

/// Reads a non-negative integer. Values written as floats are truncated.
fn field(row: &[String], line: usize, column: usize, name: &str) -> Result<u32, InstanceError> {
    let raw = row.get(column).map(String::as_str).unwrap_or("");
    if let Ok(value) = raw.parse::<u32>() {
        return Ok(value);
    }
    let value: f64 = raw.parse().map_err(|_| InstanceError::Parse {
        line,
        message: format!("invalid {name} '{raw}'"),
    })?;
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(InstanceError::Parse {
            line,
            message: format!("{name} out of range '{raw}'"),
        });
    }
    if value.fract() != 0.0 {
        tracing::warn!(line, column = name, value, "truncating fractional value");
    }
    Ok(value.trunc() as u32)
}

/// Reads a batch file with columns `ITEM_ID`, `LENGTH_ITEM`, `WIDTH_ITEM`,
/// `STACK` and optionally `SEQUENCE`. Stacks keep the order in which they
/// first appear; items inside a stack follow `SEQUENCE` when it is given and
/// file order otherwise.
pub fn read_batch<R: BufRead>(reader: R) -> Result<Batch, InstanceError> {
    let table = Table::read(reader)?;
    let id_col = table.column("ITEM_ID")?;
    let length_col = table.column("LENGTH_ITEM")?;
    let width_col = table.column("WIDTH_ITEM")?;
    let stack_col = table.column("STACK")?;
    let sequence_col = table.columns.get("SEQUENCE").copied();

    let mut order: HashMap<u32, usize> = HashMap::new();
    let mut stacks: Vec<(u32, Vec<(u32, Item)>)> = Vec::new();
    for (line, row) in &table.rows {
        let line = *line;
        let item = Item::new(
            field(row, line, id_col, "ITEM_ID")?,
            field(row, line, width_col, "WIDTH_ITEM")?,
            field(row, line, length_col, "LENGTH_ITEM")?,
        );
        if item.width == 0 || item.length == 0 {
            return Err(InstanceError::Parse {
                line,
                message: format!("item {} has a zero dimension", item.id),
            });
        }
        let stack = field(row, line, stack_col, "STACK")?;
        let sequence = match sequence_col {
            Some(col) => field(row, line, col, "SEQUENCE")?,
            None => 0,
        };
        let slot = *order.entry(stack).or_insert_with(|| {
            stacks.push((stack, Vec::new()));
            stacks.len() - 1
        });
        stacks[slot].1.push((sequence, item));
    }

    let stacks = stacks
        .into_iter()
        .map(|(id, mut items)| {
            items.sort_by_key(|&(sequence, _)| sequence);
            Stack::new(id, items.into_iter().map(|(_, item)| item).collect())
        })
        .collect::<Vec<_>>();
    tracing::debug!(stacks = stacks.len(), rows = table.rows.len(), "read batch");
    Ok(Batch::new(stacks))
}

/// Builds the plate pool: plates `0..max_plates` of the configured size,
/// carrying the defects the file lists for them. Defects on plates outside
/// the pool are skipped.
pub fn read_defects<R: BufRead>(
    reader: R,
    constraints: &Constraints,
) -> Result<Vec<Plate>, InstanceError> {
    let table = Table::read(reader)?;
    let plate_col = table.column("PLATE_ID")?;
    let id_col = table.column("DEFECT_ID")?;
    let x_col = table.column("X")?;
    let y_col = table.column("Y")?;
    let width_col = table.column("WIDTH")?;
    let height_col = table.column("HEIGHT")?;

    let mut plates = default_plates(constraints);
    for (line, row) in &table.rows {
        let line = *line;
        let plate_id = field(row, line, plate_col, "PLATE_ID")?;
        let defect = Defect::new(
            field(row, line, id_col, "DEFECT_ID")?,
            field(row, line, x_col, "X")?,
            field(row, line, y_col, "Y")?,
            field(row, line, width_col, "WIDTH")?,
            field(row, line, height_col, "HEIGHT")?,
        );
        match plates.get_mut(plate_id as usize) {
            Some(plate) => plate.defects.push(defect),
            None => tracing::warn!(plate_id, defect = defect.id, "defect outside the plate pool"),
        }
    }
    Ok(plates)
}

pub fn default_plates(constraints: &Constraints) -> Vec<Plate> {
    (0..constraints.max_plates as u32)
        .map(|id| {
            Plate::new(
                id,
                constraints.plate_width,
                constraints.plate_height,
                Vec::new(),
            )
        })
        .collect()
}

/// Writes the node table of `solution`, roots with an empty `PARENT`.
pub fn write_solution<W: Write>(mut writer: W, solution: &Solution) -> std::io::Result<()> {
    writeln!(writer, "{SOLUTION_HEADER}")?;
    for r in solution.records() {
        let parent = r.parent.map(|p| p.to_string()).unwrap_or_default();
        writeln!(
            writer,
            "{};{};{};{};{};{};{};{};{}",
            r.plate_id, r.node_id, r.x, r.y, r.width, r.height, r.r#type, r.cut, parent
        )?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Solver;
    use std::io::Cursor;

    #[test]
    fn test_read_batch_groups_stacks_in_first_seen_order() {
        let csv = "ITEM_ID;LENGTH_ITEM;WIDTH_ITEM;STACK;SEQUENCE\n\
                   0;1000;500;7;2\n\
                   1;800;300;3;1\n\
                   2;1200;700;7;1\n";
        let batch = read_batch(Cursor::new(csv)).unwrap();
        let ids: Vec<u32> = batch.stacks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 3]);
        let first: Vec<u32> = batch.stacks[0].items.iter().map(|i| i.id).collect();
        assert_eq!(first, vec![2, 0], "items follow SEQUENCE inside a stack");
        assert_eq!(batch.stacks[0].items[0], Item::new(2, 700, 1200));
    }

    #[test]
    fn test_read_batch_without_sequence_keeps_file_order() {
        let csv = "ITEM_ID;LENGTH_ITEM;WIDTH_ITEM;STACK\n5;10;20;0\n\n4;30;40;0\n";
        let batch = read_batch(Cursor::new(csv)).unwrap();
        let ids: Vec<u32> = batch.stacks[0].items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[test]
    fn test_read_batch_reports_missing_column() {
        let csv = "ITEM_ID;LENGTH_ITEM;STACK\n0;10;0\n";
        let err = read_batch(Cursor::new(csv)).unwrap_err();
        assert!(matches!(err, InstanceError::MissingColumn("WIDTH_ITEM")));
    }

    #[test]
    fn test_read_batch_reports_bad_number_with_line() {
        let csv = "ITEM_ID;LENGTH_ITEM;WIDTH_ITEM;STACK\n0;10;20;0\n1;abc;20;0\n";
        let err = read_batch(Cursor::new(csv)).unwrap_err();
        match err {
            InstanceError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("LENGTH_ITEM"), "{message}");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_read_defects_truncates_floats_and_fills_pool() {
        let csv = "PLATE_ID;DEFECT_ID;X;Y;WIDTH;HEIGHT\n\
                   1;0;2500.9;100.0;4.5;12\n\
                   1;1;10;20;3;3\n\
                   7;2;10;20;3;3\n";
        let constraints = Constraints::default().with_max_plates(3);
        let plates = read_defects(Cursor::new(csv), &constraints).unwrap();
        assert_eq!(plates.len(), 3);
        assert!(plates[0].defects.is_empty());
        assert_eq!(plates[1].defects.len(), 2);
        assert_eq!(plates[1].defects[0], Defect::new(0, 2500, 100, 4, 12));
        assert!(plates.iter().all(|p| p.width == 6000 && p.height == 3210));
    }

    #[test]
    fn test_negative_values_are_rejected() {
        let csv = "PLATE_ID;DEFECT_ID;X;Y;WIDTH;HEIGHT\n0;0;-5;0;1;1\n";
        let err = read_defects(Cursor::new(csv), &Constraints::default()).unwrap_err();
        assert!(matches!(err, InstanceError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_write_solution_table() {
        let batch = read_batch(Cursor::new(
            "ITEM_ID;LENGTH_ITEM;WIDTH_ITEM;STACK\n3;2000;1000;0\n",
        ))
        .unwrap();
        let constraints = Constraints::default().with_max_plates(1);
        let solution = Solver::new(default_plates(&constraints), constraints)
            .solve(batch)
            .unwrap();

        let mut out = Vec::new();
        write_solution(&mut out, &solution).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], SOLUTION_HEADER);
        assert_eq!(lines[1], "0;0;0;0;6000;3210;-2;0;");
        assert_eq!(lines[2], "0;1;0;0;1000;3210;-2;1;0");
        assert_eq!(lines[3], "0;2;0;0;1000;2000;3;2;1");
        assert_eq!(lines.len(), 1 + solution.tree().len());
    }
}
