use crate::tree::{CutTree, NodeIdx, NodeKind};
use crate::types::Rect;

const MAX_WIDTH: f64 = 80.0;
const MAX_HEIGHT: f64 = 40.0;

/// Draws the finished pieces of one plate, origin at the bottom left.
/// Items are labelled with their id, waste is hatched and the leftover is
/// left blank.
pub fn render_plate(tree: &CutTree, root: NodeIdx) -> String {
    let plate = tree.node(root).rect;
    let scale = f64::min(
        MAX_WIDTH / plate.width as f64,
        MAX_HEIGHT / plate.height as f64,
    );
    let grid_w = (plate.width as f64 * scale).round() as usize;
    let grid_h = (plate.height as f64 * scale).round() as usize;

    if grid_w == 0 || grid_h == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; grid_h + 1];

    for idx in tree.preorder(root) {
        let node = tree.node(idx);
        if !node.children().is_empty() || node.kind == NodeKind::Branch {
            continue;
        }
        let Some(cell) = Cell::scaled(node.rect, scale, grid_h) else {
            continue;
        };
        match node.kind {
            NodeKind::Waste => hatch(&mut grid, &cell),
            NodeKind::Item(id) => label(&mut grid, &cell, &format!("#{id}")),
            _ => {}
        }
        draw_rect(&mut grid, cell.x, cell.y, cell.w, cell.h);
    }

    // Plate border last so it is never hatched over.
    draw_rect(&mut grid, 0, 0, grid_w, grid_h);

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

/// A rectangle in grid coordinates, row 0 at the top.
struct Cell {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Cell {
    fn scaled(rect: Rect, scale: f64, grid_h: usize) -> Option<Self> {
        let x = (rect.x as f64 * scale).round() as usize;
        let w = (rect.width as f64 * scale).round() as usize;
        let h = (rect.height as f64 * scale).round() as usize;
        let top = (rect.top() as f64 * scale).round() as usize;
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self {
            x,
            y: grid_h.saturating_sub(top),
            w,
            h,
        })
    }
}

fn hatch(grid: &mut [Vec<char>], cell: &Cell) {
    for j in cell.y + 1..cell.y + cell.h {
        for i in cell.x + 1..cell.x + cell.w {
            if let Some(ch) = grid.get_mut(j).and_then(|row| row.get_mut(i)) {
                *ch = '/';
            }
        }
    }
}

fn label(grid: &mut [Vec<char>], cell: &Cell, text: &str) {
    let chars: Vec<char> = text.chars().collect();
    if cell.w <= chars.len() || cell.h < 2 {
        return;
    }
    let cy = cell.y + cell.h / 2;
    let start_x = (cell.x + cell.w / 2).saturating_sub(chars.len() / 2);
    for (i, &ch) in chars.iter().enumerate() {
        let x = start_x + i;
        if x > cell.x && x < cell.x + cell.w && cy > cell.y && cy < cell.y + cell.h {
            grid[cy][x] = ch;
        }
    }
}

fn edge(current: char, line: char) -> char {
    match (current, line) {
        ('+', _) => '+',
        ('|', '-') | ('-', '|') => '+',
        _ => line,
    }
}

fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let cols = if rows > 0 { grid[0].len() } else { return };

    for i in x..=(x + w).min(cols - 1) {
        for j in [y, y + h] {
            if j < rows {
                grid[j][i] = edge(grid[j][i], '-');
            }
        }
    }
    for j in y..=(y + h).min(rows - 1) {
        for i in [x, x + w] {
            if i < cols {
                grid[j][i] = edge(grid[j][i], '|');
            }
        }
    }
    for cx in [x, x + w] {
        for cy in [y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}
