use crate::types::{Defect, Rect};

/// Uncut part of a branch node, with every defect touching it. Cuts return
/// new halves instead of shrinking it in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Residual {
    rect: Rect,
    defects: Vec<Defect>,
}

impl Residual {
    pub fn new<'a>(rect: Rect, defects: impl IntoIterator<Item = &'a Defect>) -> Self {
        let defects = defects
            .into_iter()
            .filter(|d| d.touches(rect.x, rect.right(), rect.y, rect.top()))
            .copied()
            .collect();
        Self { rect, defects }
    }

    pub fn exhausted(x: u32, y: u32) -> Self {
        Self {
            rect: Rect::new(x, y, 0, 0),
            defects: Vec::new(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn x(&self) -> u32 {
        self.rect.x
    }

    pub fn y(&self) -> u32 {
        self.rect.y
    }

    pub fn width(&self) -> u32 {
        self.rect.width
    }

    pub fn height(&self) -> u32 {
        self.rect.height
    }

    pub fn right(&self) -> u32 {
        self.rect.right()
    }

    pub fn top(&self) -> u32 {
        self.rect.top()
    }

    pub fn area(&self) -> u64 {
        self.rect.area()
    }

    pub fn is_empty(&self) -> bool {
        self.rect.is_empty()
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn defects_in(&self, x_lo: u32, x_hi: u32, y_lo: u32, y_hi: u32) -> Vec<Defect> {
        self.defects
            .iter()
            .filter(|d| d.touches(x_lo, x_hi, y_lo, y_hi))
            .copied()
            .collect()
    }

    pub fn has_defect_in(&self, x_lo: u32, x_hi: u32, y_lo: u32, y_hi: u32) -> bool {
        self.defects
            .iter()
            .any(|d| d.touches(x_lo, x_hi, y_lo, y_hi))
    }

    fn blockers(&self, x: u32, y: u32, width: u32, length: u32) -> impl Iterator<Item = &Defect> {
        let footprint = Rect::new(x, y, width, length);
        self.defects
            .iter()
            .filter(move |d| d.rect().overlaps(&footprint))
    }

    /// Finds the first defect-free spot for a `width`×`length` footprint,
    /// starting from the bottom-left corner.
    ///
    /// With `vertical_first` the footprint climbs upward over blocking defects
    /// and only moves right once the column is exhausted, so the result is the
    /// least `(x, y)`. Otherwise it slides right first and the result is the
    /// least `(y, x)`.
    pub fn find_place(&self, width: u32, length: u32, vertical_first: bool) -> Option<(u32, u32)> {
        if width > self.width() || length > self.height() {
            return None;
        }
        if vertical_first {
            self.probe_upward(width, length)
        } else {
            self.probe_rightward(width, length)
        }
    }

    fn probe_upward(&self, width: u32, length: u32) -> Option<(u32, u32)> {
        let (mut x, mut y) = (self.x(), self.y());
        while x + width <= self.right() {
            if y + length <= self.top() {
                let lowest = self
                    .blockers(x, y, width, length)
                    .min_by_key(|d| (d.y, d.top()));
                match lowest {
                    None => return Some((x, y)),
                    Some(d) => {
                        y = d.top();
                        continue;
                    }
                }
            }
            // Nothing fits in this column; every x before the nearest blocking
            // right edge meets the same blockers.
            x = self
                .blockers(x, self.y(), width, self.height())
                .map(Defect::right)
                .min()?;
            y = self.y();
        }
        None
    }

    fn probe_rightward(&self, width: u32, length: u32) -> Option<(u32, u32)> {
        let (mut x, mut y) = (self.x(), self.y());
        while y + length <= self.top() {
            if x + width <= self.right() {
                let leftmost = self
                    .blockers(x, y, width, length)
                    .min_by_key(|d| (d.x, d.right()));
                match leftmost {
                    None => return Some((x, y)),
                    Some(d) => {
                        x = d.right();
                        continue;
                    }
                }
            }
            y = self
                .blockers(self.x(), y, self.width(), length)
                .map(Defect::top)
                .min()?;
            x = self.x();
        }
        None
    }

    /// A vertical line at `x` is cuttable unless it passes through a defect.
    pub fn can_cut_x(&self, x: u32) -> bool {
        !self.defects.iter().any(|d| d.x < x && x < d.right())
    }

    pub fn can_cut_y(&self, y: u32) -> bool {
        !self.defects.iter().any(|d| d.y < y && y < d.top())
    }

    /// Smallest cuttable x at or right of `from`.
    pub fn next_cut_x(&self, from: u32) -> u32 {
        let mut x = from;
        while let Some(edge) = self
            .defects
            .iter()
            .filter(|d| d.x < x && x < d.right())
            .map(Defect::right)
            .max()
        {
            x = edge;
        }
        x
    }

    pub fn next_cut_y(&self, from: u32) -> u32 {
        let mut y = from;
        while let Some(edge) = self
            .defects
            .iter()
            .filter(|d| d.y < y && y < d.top())
            .map(Defect::top)
            .max()
        {
            y = edge;
        }
        y
    }

    pub fn split_vertical(&self, x: u32) -> (Residual, Residual) {
        assert!(
            self.x() <= x && x <= self.right(),
            "vertical cut at {x} outside residual {}",
            self.rect
        );
        assert!(self.can_cut_x(x), "vertical cut at {x} crosses a defect");
        let left = Rect::new(self.x(), self.y(), x - self.x(), self.height());
        let right = Rect::new(x, self.y(), self.right() - x, self.height());
        (
            Residual::new(left, &self.defects),
            Residual::new(right, &self.defects),
        )
    }

    pub fn split_horizontal(&self, y: u32) -> (Residual, Residual) {
        assert!(
            self.y() <= y && y <= self.top(),
            "horizontal cut at {y} outside residual {}",
            self.rect
        );
        assert!(self.can_cut_y(y), "horizontal cut at {y} crosses a defect");
        let below = Rect::new(self.x(), self.y(), self.width(), y - self.y());
        let above = Rect::new(self.x(), y, self.width(), self.top() - y);
        (
            Residual::new(below, &self.defects),
            Residual::new(above, &self.defects),
        )
    }

    pub fn take(&self) -> (Residual, Residual) {
        (self.clone(), Residual::exhausted(self.right(), self.top()))
    }
}
