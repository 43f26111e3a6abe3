use serde::{Deserialize, Serialize};

use crate::config::Constraints;
use crate::error::{Result, SolveError};
use crate::guillotine::{PlaceOutcome, finish_plate, place};
use crate::plates::{Plate, PlatePool, start_new_bin};
use crate::solution::Solution;
use crate::tree::{Checkpoint, CutTree, NodeIdx};
use crate::types::{Batch, Item};
use crate::waste::{open_residual_area, total_waste_area, waste_area};

/// How the next item and its orientation are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Stacks in order, items as given.
    #[default]
    FirstFit,
    /// Stacks in order, each item placed in whichever orientation wastes less.
    FirstFitRotate,
    /// Looks `max_depth` choices ahead over every stack head and orientation.
    Backtrack {
        max_depth: usize,
        #[serde(default)]
        extended_waste: bool,
    },
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::FirstFit => write!(f, "first-fit"),
            Strategy::FirstFitRotate => write!(f, "first-fit with rotation"),
            Strategy::Backtrack {
                max_depth,
                extended_waste,
            } => write!(
                f,
                "backtracking (depth {max_depth}{})",
                if *extended_waste { ", extended waste" } else { "" }
            ),
        }
    }
}

pub struct Solver {
    plates: Vec<Plate>,
    constraints: Constraints,
    strategy: Strategy,
    first_node_id: u32,
}

impl Solver {
    pub fn new(plates: Vec<Plate>, constraints: Constraints) -> Self {
        Self {
            plates,
            constraints,
            strategy: Strategy::default(),
            first_node_id: 0,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Node ids of the next solve start at `first_id`.
    pub fn with_first_node_id(mut self, first_id: u32) -> Self {
        self.first_node_id = first_id;
        self
    }

    pub fn solve(&self, batch: Batch) -> Result<Solution> {
        self.constraints.validate()?;
        if let Strategy::Backtrack { max_depth: 0, .. } = self.strategy {
            return Err(SolveError::InvalidConfig(
                "backtracking depth must be at least 1".to_string(),
            ));
        }
        let min_waste = self.constraints.min_waste;
        if let Some(item) = batch
            .stacks
            .iter()
            .flat_map(|s| s.remaining())
            .find(|i| i.width < min_waste || i.length < min_waste)
        {
            return Err(SolveError::InvalidConfig(format!(
                "item {item} is below the minimum piece size {min_waste}"
            )));
        }
        for plate in &self.plates {
            plate.check_bounds()?;
        }
        tracing::info!(
            strategy = %self.strategy,
            items = batch.remaining_items(),
            area = batch.item_area(),
            plates = self.plates.len().min(self.constraints.max_plates),
            "starting solve"
        );

        let mut session = Session::new(
            CutTree::new(self.first_node_id),
            PlatePool::new(self.plates.clone(), self.constraints.max_plates),
            &self.constraints,
        )?;
        let mut batch = batch;
        match self.strategy {
            Strategy::FirstFit => session.first_fit(&mut batch, false)?,
            Strategy::FirstFitRotate => session.first_fit(&mut batch, true)?,
            Strategy::Backtrack {
                max_depth,
                extended_waste,
            } => session.backtrack(&mut batch, max_depth, extended_waste)?,
        }
        let solution = session.finish();

        tracing::info!(
            plates = solution.plate_count(),
            nodes = solution.tree().len(),
            waste = solution.waste_area(),
            "finished solve"
        );
        Ok(solution)
    }
}

/// One pick of the backtracking search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Choice {
    stack: usize,
    rotated: bool,
}

struct SessionCheckpoint {
    tree: Checkpoint,
    plates_used: usize,
    current: NodeIdx,
}

/// Mutable state of one solve: the forest, the plate pool and the node the
/// next placement starts from.
struct Session<'a> {
    tree: CutTree,
    pool: PlatePool,
    constraints: &'a Constraints,
    current: NodeIdx,
}

impl<'a> Session<'a> {
    fn new(mut tree: CutTree, mut pool: PlatePool, constraints: &'a Constraints) -> Result<Self> {
        let current = start_new_bin(&mut pool, &mut tree)?;
        Ok(Self {
            tree,
            pool,
            constraints,
            current,
        })
    }

    fn finish(mut self) -> Solution {
        finish_plate(&mut self.tree, self.current);
        Solution::new(self.tree)
    }

    fn checkpoint(&mut self) -> SessionCheckpoint {
        SessionCheckpoint {
            tree: self.tree.checkpoint(),
            plates_used: self.pool.used(),
            current: self.current,
        }
    }

    fn rollback(&mut self, checkpoint: SessionCheckpoint) {
        self.tree.rollback(checkpoint.tree);
        self.pool.rewind(checkpoint.plates_used);
        self.current = checkpoint.current;
    }

    fn commit(&mut self, checkpoint: SessionCheckpoint) {
        self.tree.commit(checkpoint.tree);
    }

    fn place(&mut self, item: &Item) -> PlaceOutcome {
        place(&mut self.tree, self.constraints, item, self.current)
    }

    fn new_plate(&mut self) -> Result<()> {
        self.current = start_new_bin(&mut self.pool, &mut self.tree)?;
        Ok(())
    }

    /// Places `item`, moving on to fresh plates until it fits.
    fn place_or_open(&mut self, item: &Item) -> Result<()> {
        loop {
            match self.place(item) {
                PlaceOutcome::Placed(next) => {
                    self.current = next;
                    return Ok(());
                }
                PlaceOutcome::Failed(_) => self.new_plate()?,
            }
        }
    }

    fn first_fit(&mut self, batch: &mut Batch, rotate: bool) -> Result<()> {
        for stack in &mut batch.stacks {
            while let Some(item) = stack.pop() {
                tracing::debug!(
                    item = %item,
                    plate = self.tree.node(self.current).plate_id,
                    "placing item"
                );
                if rotate && !item.is_square() {
                    self.place_best_orientation(&item)?;
                } else {
                    self.place_or_open(&item)?;
                }
            }
        }
        Ok(())
    }

    /// Waste of the plate `node` belongs to.
    fn plate_waste(&self, node: NodeIdx) -> u64 {
        waste_area(&self.tree, self.tree.root_of(node))
    }

    /// Tries both orientations on the current plate and keeps the one with
    /// less waste, the upright one on a tie. Opens a new plate when neither
    /// fits.
    fn place_best_orientation(&mut self, item: &Item) -> Result<()> {
        let rotated = item.rotated();
        loop {
            let cp = self.checkpoint();
            let upright = match self.place(item) {
                PlaceOutcome::Placed(next) => Some(self.plate_waste(next)),
                PlaceOutcome::Failed(_) => None,
            };
            self.rollback(cp);

            let cp = self.checkpoint();
            if let PlaceOutcome::Placed(next) = self.place(&rotated) {
                let turned = self.plate_waste(next);
                if upright.is_none_or(|waste| turned < waste) {
                    tracing::debug!(item = item.id, waste = turned, "placing rotated");
                    self.commit(cp);
                    self.current = next;
                    return Ok(());
                }
            }
            self.rollback(cp);

            // Replays the upright attempt for real: either it fits, or its
            // waste stays on this plate and the next plate is opened.
            match self.place(item) {
                PlaceOutcome::Placed(next) => {
                    self.current = next;
                    return Ok(());
                }
                PlaceOutcome::Failed(_) => self.new_plate()?,
            }
        }
    }

    fn backtrack(&mut self, batch: &mut Batch, max_depth: usize, extended: bool) -> Result<()> {
        while !batch.is_done() {
            let choice = match self.explore(batch, max_depth, extended) {
                Some((score, choice)) => {
                    tracing::debug!(stack = choice.stack, rotated = choice.rotated, score, "choice");
                    choice
                }
                // Nothing fits anywhere; let the committed path report it.
                None => candidates(batch)[0],
            };
            let item = take(batch, choice);
            self.place_or_open(&item)?;
        }
        Ok(())
    }

    /// Best scoring first choice among all paths of at most `depth` choices.
    fn explore(&mut self, batch: &mut Batch, depth: usize, extended: bool) -> Option<(u64, Choice)> {
        let mut best: Option<(u64, Choice)> = None;
        for choice in candidates(batch) {
            let cp = self.checkpoint();
            let item = take(batch, choice);
            let score = match self.place_or_open(&item) {
                Err(_) => None,
                Ok(()) if depth <= 1 || batch.is_done() => Some(self.score(batch, extended)),
                Ok(()) => self
                    .explore(batch, depth - 1, extended)
                    .map(|(score, _)| score),
            };
            batch.stacks[choice.stack].unpop();
            self.rollback(cp);

            tracing::trace!(stack = choice.stack, rotated = choice.rotated, ?score, depth, "candidate");
            if let Some(score) = score
                && best.is_none_or(|(b, _)| score < b)
            {
                best = Some((score, choice));
            }
        }
        best
    }

    fn score(&self, batch: &Batch, extended: bool) -> u64 {
        let mut score = total_waste_area(&self.tree);
        if extended {
            score += open_residual_area(&self.tree, self.current, batch.is_done());
        }
        score
    }
}

/// Stack heads in stack order, each upright before rotated.
fn candidates(batch: &Batch) -> Vec<Choice> {
    let mut choices = Vec::new();
    for (stack, s) in batch.stacks.iter().enumerate() {
        let Some(head) = s.head() else { continue };
        choices.push(Choice {
            stack,
            rotated: false,
        });
        if !head.is_square() {
            choices.push(Choice {
                stack,
                rotated: true,
            });
        }
    }
    choices
}

fn take(batch: &mut Batch, choice: Choice) -> Item {
    let stack = &mut batch.stacks[choice.stack];
    let Some(item) = stack.pop() else {
        unreachable!("choice on empty stack {}", stack.id);
    };
    if choice.rotated { item.rotated() } else { item }
}
