use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle on a plate, `x`/`y` is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn top(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Positive-area intersection; rectangles sharing only an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.top()
            && other.y < self.top()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && other.right() <= self.right()
            && other.top() <= self.top()
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@({},{})", self.width, self.height, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Defect {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Defect {
    pub fn new(id: u32, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn top(&self) -> u32 {
        self.y + self.height
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Closed-interval test: a defect touching the query boundary counts.
    pub fn touches(&self, x_lo: u32, x_hi: u32, y_lo: u32, y_hi: u32) -> bool {
        self.x <= x_hi && self.right() >= x_lo && self.y <= y_hi && self.top() >= y_lo
    }
}

/// A piece to cut. `width` runs along the plate's x axis and `length` along y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub width: u32,
    pub length: u32,
}

impl Item {
    pub fn new(id: u32, width: u32, length: u32) -> Self {
        Self { id, width, length }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.length as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            id: self.id,
            width: self.length,
            length: self.width,
        }
    }

    pub fn is_square(&self) -> bool {
        self.width == self.length
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}x{}", self.id, self.width, self.length)
    }
}

/// Items that must be cut in sequence. Only the head is ever eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: u32,
    pub items: Vec<Item>,
    #[serde(skip)]
    next: usize,
}

impl Stack {
    pub fn new(id: u32, items: Vec<Item>) -> Self {
        Self { id, items, next: 0 }
    }

    pub fn head(&self) -> Option<&Item> {
        self.items.get(self.next)
    }

    pub fn remaining(&self) -> &[Item] {
        &self.items[self.next.min(self.items.len())..]
    }

    pub fn is_empty(&self) -> bool {
        self.next >= self.items.len()
    }

    pub fn pop(&mut self) -> Option<Item> {
        let item = self.items.get(self.next).copied()?;
        self.next += 1;
        Some(item)
    }

    /// Puts the last popped item back on top. Only the search uses this.
    pub(crate) fn unpop(&mut self) {
        assert!(self.next > 0, "stack {} has nothing to put back", self.id);
        self.next -= 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub stacks: Vec<Stack>,
}

impl Batch {
    pub fn new(stacks: Vec<Stack>) -> Self {
        Self { stacks }
    }

    pub fn is_done(&self) -> bool {
        self.stacks.iter().all(Stack::is_empty)
    }

    pub fn remaining_items(&self) -> usize {
        self.stacks.iter().map(|s| s.remaining().len()).sum()
    }

    pub fn item_area(&self) -> u64 {
        self.stacks
            .iter()
            .flat_map(|s| s.remaining())
            .map(Item::area)
            .sum()
    }
}
