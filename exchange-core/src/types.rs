use serde::{Deserialize, Serialize};

// === IDS ===

/// Stable agent identifier. Scenario ids are dense from 0, so agents live in
/// a `Vec` indexed by id and ascending-id iteration is just slice order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Price = f64;
pub type Tick = u64;

// === POSITION ===

/// Integer cell coordinate on the N×N grid. `x` is the column, `y` the row.
///
/// Ordering is row-major (row first, then column), the canonical tie-break
/// order for equal-score targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn chebyshev(self, other: Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    pub fn manhattan(self, other: Position) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    pub fn distance(self, other: Position, metric: DistanceMetric) -> u32 {
        match metric {
            DistanceMetric::Chebyshev => self.chebyshev(other),
            DistanceMetric::Manhattan => self.manhattan(other),
        }
    }

    /// True iff `other` falls inside the Chebyshev box of radius `r`:
    /// `|Δx| ≤ r ∧ |Δy| ≤ r`. Interaction range always uses this check.
    pub fn in_box(self, other: Position, r: u32) -> bool {
        self.chebyshev(other) <= r
    }

    pub fn in_bounds(self, grid_size: u32) -> bool {
        let n = grid_size as i32;
        self.x >= 0 && self.x < n && self.y >= 0 && self.y < n
    }

    /// Row-major sort key: row first, then column.
    pub fn row_major(self) -> (i32, i32) {
        (self.y, self.x)
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.row_major().cmp(&other.row_major())
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Distance metric for vision. Interaction is always the Chebyshev box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Chebyshev,
    Manhattan,
}

// === GOODS ===

/// The two foraged goods. Money is tracked separately on the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Good {
    A,
    B,
}

impl Good {
    pub fn other(self) -> Good {
        match self {
            Good::A => Good::B,
            Good::B => Good::A,
        }
    }
}

impl std::fmt::Display for Good {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Good::A => write!(f, "A"),
            Good::B => write!(f, "B"),
        }
    }
}

// === INVENTORY ===

/// Non-negative integer holdings of the two goods plus money.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub a: u32,
    pub b: u32,
    #[serde(default)]
    pub money: u32,
}

impl Inventory {
    pub fn new(a: u32, b: u32) -> Self {
        Self { a, b, money: 0 }
    }

    pub fn with_money(mut self, money: u32) -> Self {
        self.money = money;
        self
    }

    pub fn amount_of(&self, good: Good) -> u32 {
        match good {
            Good::A => self.a,
            Good::B => self.b,
        }
    }

    pub fn set_amount(&mut self, good: Good, amount: u32) {
        match good {
            Good::A => self.a = amount,
            Good::B => self.b = amount,
        }
    }

    /// Apply a signed delta to one good, returning the new amount or `None`
    /// if the result would go negative.
    pub fn checked_apply(&self, good: Good, delta: i64) -> Option<u32> {
        let current = i64::from(self.amount_of(good));
        u32::try_from(current + delta).ok()
    }

    pub fn checked_apply_money(&self, delta: i64) -> Option<u32> {
        u32::try_from(i64::from(self.money) + delta).ok()
    }
}
