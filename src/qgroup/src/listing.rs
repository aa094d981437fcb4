//! Filter/sort specification for `show`, and its evaluation over loaded groups.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
};

use bitflags::bitflags;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Error, Result},
    id::QgroupId,
};

bitflags! {
    /// Optional columns; qgroupid, rfer and excl are always shown.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Columns: u8 {
        const MAX_RFER = 1 << 0;
        const MAX_EXCL = 1 << 1;
        const PARENT = 1 << 2;
        const CHILD = 1 << 3;
    }
}

impl Default for Columns {
    fn default() -> Self {
        Columns::empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    /// The group and every group above it.
    AllParents(QgroupId),
    /// The group and its direct parents.
    Parent(QgroupId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    AllParents,
    Parent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Qgroupid,
    Rfer,
    Excl,
    MaxRfer,
    MaxExcl,
}

impl SortField {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "qgroupid" => SortField::Qgroupid,
            "rfer" => SortField::Rfer,
            "excl" => SortField::Excl,
            "max_rfer" => SortField::MaxRfer,
            "max_excl" => SortField::MaxExcl,
            _ => return None,
        })
    }

    fn compare(self, a: &QgroupRow, b: &QgroupRow) -> Ordering {
        match self {
            SortField::Qgroupid => a.qgroupid.cmp(&b.qgroupid),
            SortField::Rfer => a.rfer.cmp(&b.rfer),
            SortField::Excl => a.excl.cmp(&b.excl),
            SortField::MaxRfer => a.max_rfer.cmp(&b.max_rfer),
            SortField::MaxExcl => a.max_excl.cmp(&b.max_excl),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: Direction,
}

/// Parses `[+|-]key[,[+|-]key...]`.
pub fn parse_sort_spec(spec: &str) -> Result<Vec<SortKey>> {
    spec.split(',')
        .map(|token| {
            let (direction, name) = match token.as_bytes().first() {
                Some(b'+') => (Direction::Ascending, &token[1..]),
                Some(b'-') => (Direction::Descending, &token[1..]),
                _ => (Direction::Ascending, token),
            };
            SortField::from_name(name)
                .map(|field| SortKey { field, direction })
                .ok_or_else(|| Error::InvalidSortSpec(token.to_string()))
        })
        .collect()
}

/// One quota group as loaded from the filesystem.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QgroupRow {
    pub qgroupid: QgroupId,
    pub rfer: u64,
    pub excl: u64,
    /// `None` when no limit is set.
    pub max_rfer: Option<u64>,
    pub max_excl: Option<u64>,
    pub parents: Vec<QgroupId>,
    pub children: Vec<QgroupId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingSpec {
    pub columns: Columns,
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
}

impl ListingSpec {
    /// Applies filters and ordering to a complete set of groups.
    pub fn select(&self, rows: Vec<QgroupRow>) -> Vec<QgroupRow> {
        let parents: HashMap<QgroupId, &[QgroupId]> =
            rows.iter().map(|r| (r.qgroupid, r.parents.as_slice())).collect();

        let allowed: Vec<BTreeSet<QgroupId>> = self
            .filters
            .iter()
            .map(|filter| match *filter {
                Filter::Parent(id) => {
                    let mut set = BTreeSet::from([id]);
                    set.extend(parents.get(&id).copied().unwrap_or_default());
                    set
                }
                Filter::AllParents(id) => ancestors(&parents, id),
            })
            .collect();

        let mut selected: Vec<QgroupRow> = rows
            .iter()
            .filter(|r| allowed.iter().all(|set| set.contains(&r.qgroupid)))
            .cloned()
            .collect();

        selected.sort_by(|a, b| {
            self.sort
                .iter()
                .map(|key| match key.direction {
                    Direction::Ascending => key.field.compare(a, b),
                    Direction::Descending => key.field.compare(b, a),
                })
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.qgroupid.cmp(&b.qgroupid))
        });

        debug!(total = rows.len(), selected = selected.len(), "evaluated listing spec");
        selected
    }
}

fn ancestors(parents: &HashMap<QgroupId, &[QgroupId]>, id: QgroupId) -> BTreeSet<QgroupId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![id];
    while let Some(cur) = stack.pop() {
        if seen.insert(cur) {
            stack.extend(parents.get(&cur).copied().unwrap_or_default());
        }
    }
    seen
}

/// Collects `show` options; the filter target is only resolved if a filter was asked for.
#[derive(Clone, Debug, Default)]
pub struct ListingSpecBuilder {
    columns: Columns,
    filters: Vec<FilterKind>,
    sort: Vec<SortKey>,
}

impl ListingSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(&mut self, column: Columns) -> &mut Self {
        self.columns |= column;
        self
    }

    pub fn filter(&mut self, kind: FilterKind) -> &mut Self {
        if !self.filters.contains(&kind) {
            self.filters.push(kind);
        }
        self
    }

    pub fn sort(&mut self, spec: &str) -> Result<&mut Self> {
        self.sort = parse_sort_spec(spec)?;
        Ok(self)
    }

    pub fn needs_root_id(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn build(&self, root_id: impl FnOnce() -> Result<u64>) -> Result<ListingSpec> {
        let filters = if self.needs_root_id() {
            let root_id = root_id()?;
            let id = QgroupId::subvolume(root_id).ok_or_else(|| Error::MalformedId(root_id.to_string()))?;
            self.filters
                .iter()
                .map(|kind| match kind {
                    FilterKind::AllParents => Filter::AllParents(id),
                    FilterKind::Parent => Filter::Parent(id),
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(ListingSpec {
            columns: self.columns,
            filters,
            sort: self.sort.clone(),
        })
    }
}
