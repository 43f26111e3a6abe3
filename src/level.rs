use crate::config::Constraints;

/// The four nested guillotine passes, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CutLevel {
    First,
    Second,
    Third,
    Trim,
}

impl CutLevel {
    pub fn from_depth(depth: u8) -> Option<Self> {
        match depth {
            0 => Some(CutLevel::First),
            1 => Some(CutLevel::Second),
            2 => Some(CutLevel::Third),
            3 => Some(CutLevel::Trim),
            _ => None,
        }
    }

    pub fn depth(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Self> {
        Self::from_depth(self.depth() + 1)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, CutLevel::First | CutLevel::Third)
    }

    pub fn min_spacing(self, constraints: &Constraints) -> Option<u32> {
        match self {
            CutLevel::First => Some(constraints.min_1_cut),
            CutLevel::Second => Some(constraints.min_2_cut),
            CutLevel::Third => Some(constraints.min_waste),
            CutLevel::Trim => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_follow_depth() {
        assert_eq!(CutLevel::from_depth(0), Some(CutLevel::First));
        assert_eq!(CutLevel::from_depth(3), Some(CutLevel::Trim));
        assert_eq!(CutLevel::from_depth(4), None);
        assert_eq!(CutLevel::Third.depth(), 2);
    }

    #[test]
    fn test_transitions_end_at_trim() {
        assert_eq!(CutLevel::First.next(), Some(CutLevel::Second));
        assert_eq!(CutLevel::Second.next(), Some(CutLevel::Third));
        assert_eq!(CutLevel::Third.next(), Some(CutLevel::Trim));
        assert_eq!(CutLevel::Trim.next(), None);
    }

    #[test]
    fn test_orientation_alternates() {
        assert!(CutLevel::First.is_vertical());
        assert!(!CutLevel::Second.is_vertical());
        assert!(CutLevel::Third.is_vertical());
        assert!(!CutLevel::Trim.is_vertical());
    }

    #[test]
    fn test_spacing_rules() {
        let c = Constraints::new()
            .with_min_1_cut(150)
            .with_min_2_cut(120)
            .with_min_waste(25);
        assert_eq!(CutLevel::First.min_spacing(&c), Some(150));
        assert_eq!(CutLevel::Second.min_spacing(&c), Some(120));
        assert_eq!(CutLevel::Third.min_spacing(&c), Some(25));
        assert_eq!(CutLevel::Trim.min_spacing(&c), None);
    }
}
