use crate::error::MacroLcaError;
use crate::rules::schema::{CategoryRuleDef, CategoryTableDef};
use serde::Serialize;

/// Product category assigned to a CPC code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAssignment {
    pub category: String,
    pub subcategory: String,
    /// Number of ranges containing the code. More than one means the
    /// assignment was resolved by precedence and is flagged.
    pub matched: usize,
}

impl CategoryAssignment {
    pub fn is_flagged(&self) -> bool {
        self.matched > 1
    }
}

/// Two ranges of the table that share at least one code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeOverlap {
    pub first: usize,
    pub second: usize,
    /// Shared codes, `[start, end)`.
    pub start: i64,
    pub end: i64,
    /// One range fully contains the other.
    pub nested: bool,
    /// The two ranges map to different (category, subcategory) labels.
    pub conflicting: bool,
}

/// Ordered CPC range table.
///
/// Precedence is explicit: the narrowest range containing a code wins, and
/// between equally wide ranges the one listed later wins.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    def: CategoryTableDef,
}

impl CategoryTable {
    pub fn new(def: CategoryTableDef) -> Result<Self, MacroLcaError> {
        if def.rules.is_empty() {
            return Err(MacroLcaError::RulesetInvalid(
                "category table has no rules".into(),
            ));
        }
        for (i, rule) in def.rules.iter().enumerate() {
            if rule.end <= rule.start {
                return Err(MacroLcaError::RulesetInvalid(format!(
                    "category rule {} has an empty range [{}, {})",
                    i, rule.start, rule.end
                )));
            }
            if rule.category.trim().is_empty() {
                return Err(MacroLcaError::RulesetInvalid(format!(
                    "category rule {} has an empty category",
                    i
                )));
            }
        }
        Ok(CategoryTable { def })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn version(&self) -> &str {
        &self.def.version
    }

    pub fn description(&self) -> Option<&str> {
        self.def.description.as_deref()
    }

    pub fn rules(&self) -> &[CategoryRuleDef] {
        &self.def.rules
    }

    pub fn len(&self) -> usize {
        self.def.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.def.rules.is_empty()
    }

    /// All rules containing `code`, with their table index.
    pub fn matching(&self, code: i64) -> Vec<(usize, &CategoryRuleDef)> {
        self.def
            .rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.start <= code && code < r.end)
            .collect()
    }

    /// Assign a category to a CPC code. Returns `None` if no range matches.
    pub fn assign(&self, code: i64) -> Option<CategoryAssignment> {
        let matching = self.matching(code);
        let (_, winner) = matching.iter().min_by(|(ia, a), (ib, b)| {
            (a.end - a.start)
                .cmp(&(b.end - b.start))
                .then(ib.cmp(ia))
        })?;

        Some(CategoryAssignment {
            category: winner.category.clone(),
            subcategory: winner.subcategory.clone(),
            matched: matching.len(),
        })
    }

    /// Every pair of ranges sharing at least one code.
    pub fn overlaps(&self) -> Vec<RangeOverlap> {
        let rules = &self.def.rules;
        let mut out = Vec::new();

        for i in 0..rules.len() {
            for j in (i + 1)..rules.len() {
                let (a, b) = (&rules[i], &rules[j]);
                let start = a.start.max(b.start);
                let end = a.end.min(b.end);
                if start >= end {
                    continue;
                }
                let nested = (a.start <= b.start && b.end <= a.end)
                    || (b.start <= a.start && a.end <= b.end);
                let conflicting = a.category != b.category || a.subcategory != b.subcategory;
                out.push(RangeOverlap {
                    first: i,
                    second: j,
                    start,
                    end,
                    nested,
                    conflicting,
                });
            }
        }

        out
    }
}
