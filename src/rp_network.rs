//! Network of members
//!
//! Owns the member registry, the dataset ownership table and the assignment
//! tree. Every membership change rebuilds the tree before returning, so no
//! caller ever observes a tree that disagrees with the registry.
//!
//! Distribution works in three steps:
//! 1. `[earliest, latest]` is cut into `N` equal intervals (`N` = members),
//! 2. the intervals are handed out in the tree's left_to_right order,
//! 3. each member receives the owner's dataset sliced to its interval.

use crate::rp_dataset::{Dataset, DatasetError};
use crate::rp_interface::{
    ColumnName, Frequency, MemberName, TimeRange, Timestamp, TreePolicy,
};
use crate::rp_member::Member;
use crate::rp_tree::AssignmentTree;
use chrono::{Duration, NaiveDate};
use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// A dataset name may be owned by one member only
    #[error("dataset '{column}' is already owned by member '{owner}'")]
    DuplicateOwner { column: ColumnName, owner: MemberName },

    #[error("member '{0}' is already registered")]
    DuplicateMember(MemberName),

    #[error("member '{0}' not found")]
    NotFound(MemberName),

    #[error("dataset '{0}' has no owner")]
    UnknownDataset(ColumnName),

    /// All datasets of a network share one frequency
    #[error("member '{member}' uses frequency {found}, the network runs at {expected}")]
    FrequencyMismatch {
        member: MemberName,
        expected: Frequency,
        found: Frequency,
    },

    /// Dataset grid is shifted against the network clock
    #[error("member '{member}' has data off the network grid (anchored at {at})")]
    MisalignedData { member: MemberName, at: Timestamp },

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Initial value of the network clock; every dataset grid must be aligned to it
    pub start_time: Timestamp,

    /// Step of the network clock and of every member dataset (default: 1h)
    pub frequency: Frequency,

    /// Assignment tree layout (default: balanced, left to right)
    pub policy: TreePolicy,

    /// Seed for `TreePolicy::BalancedRandom`; random when absent
    pub seed: Option<[u8; 32]>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            start_time: NaiveDate::from_ymd_opt(2000, 1, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            frequency: Frequency::hours(1),
            policy: TreePolicy::default(),
            seed: None,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-member share of a dataset's grid points held in received data
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageStats {
    /// Ratio (0.0 ..) per member, registry order
    pub per_member: IndexMap<MemberName, f64>,
    pub min_percent: f64,
    pub avg_percent: f64,
    pub max_percent: f64,
}

// ============================================================================
// Network
// ============================================================================

pub struct Network {
    members: IndexMap<MemberName, Member>,
    owner_lookup: HashMap<ColumnName, MemberName>,
    policy: TreePolicy,
    frequency: Frequency,
    current_time: Timestamp,
    tree: AssignmentTree<MemberName>,
    rng: StdRng,
}

impl Network {
    pub fn new(config: NetworkConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });

        Self {
            members: IndexMap::new(),
            owner_lookup: HashMap::new(),
            policy: config.policy,
            frequency: config.frequency,
            current_time: config.start_time,
            tree: AssignmentTree::default(),
            rng: StdRng::from_seed(seed),
        }
    }

    pub fn policy(&self) -> TreePolicy {
        self.policy
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    pub fn tree(&self) -> &AssignmentTree<MemberName> {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Members in insertion order
    pub fn members(&self) -> impl Iterator<Item = &Member> + '_ {
        self.members.values()
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    pub fn owner_of(&self, column: &str) -> Option<&Member> {
        self.owner_lookup
            .get(column)
            .and_then(|owner| self.members.get(owner))
    }

    /// Every owned dataset name, sorted
    pub fn dataset_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.owner_lookup.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The owner's own data for `column`, as an independent dataset
    pub fn get_dataset(&self, column: &str) -> Option<Dataset> {
        self.owner_of(column)
            .and_then(Member::own_data)
            .map(|data| data.select(&[column]))
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Register a member and claim its datasets.
    ///
    /// Nothing changes unless every check passes; the tree is rebuilt before
    /// returning.
    pub fn add_member(&mut self, member: Member) -> Result<(), NetworkError> {
        if self.members.contains_key(member.name()) {
            warn!("refusing duplicate member {}", member.name());
            return Err(NetworkError::DuplicateMember(member.name().to_string()));
        }
        for data in [member.own_data(), member.received_data()].into_iter().flatten() {
            self.check_grid(member.name(), data)?;
        }
        for column in member.datasets() {
            if let Some(owner) = self.owner_lookup.get(column) {
                warn!("member {} tried to claim dataset {} owned by {}", member.name(), column, owner);
                return Err(NetworkError::DuplicateOwner {
                    column: column.to_string(),
                    owner: owner.clone(),
                });
            }
        }

        let name = member.name().to_string();
        for column in member.datasets() {
            self.owner_lookup.insert(column.to_string(), name.clone());
        }
        self.members.insert(name.clone(), member);
        self.rebuild_tree();

        info!("member {} joined, {} members", name, self.members.len());
        Ok(())
    }

    /// Add members one by one; stops at the first failure, keeping the
    /// members registered before it.
    pub fn add_members<I: IntoIterator<Item = Member>>(&mut self, members: I) -> Result<(), NetworkError> {
        for member in members {
            self.add_member(member)?;
        }
        Ok(())
    }

    /// Unregister a member and release its datasets. The tree is rebuilt
    /// from the remaining insertion order, so balanced layouts may shift.
    pub fn remove_member(&mut self, name: &str) -> Result<Member, NetworkError> {
        let member = self
            .members
            .shift_remove(name)
            .ok_or_else(|| NetworkError::NotFound(name.to_string()))?;

        self.owner_lookup.retain(|_, owner| owner.as_str() != name);
        self.rebuild_tree();

        info!("member {} left, {} members", name, self.members.len());
        Ok(member)
    }

    /// Grow the own data of a registered member with new (or its own) datasets
    pub fn add_own_data(&mut self, name: &str, data: Dataset) -> Result<(), NetworkError> {
        if !self.members.contains_key(name) {
            return Err(NetworkError::NotFound(name.to_string()));
        }
        self.check_grid(name, &data)?;
        for column in data.column_names() {
            match self.owner_lookup.get(column) {
                Some(owner) if owner != name => {
                    return Err(NetworkError::DuplicateOwner {
                        column: column.to_string(),
                        owner: owner.clone(),
                    });
                }
                _ => {}
            }
        }

        let columns: Vec<ColumnName> = data.column_names().map(str::to_string).collect();
        if let Some(member) = self.members.get_mut(name) {
            member.add_own_data(data)?;
        }
        for column in columns {
            self.owner_lookup.insert(column, name.to_string());
        }
        Ok(())
    }

    /// Drop a dataset from its owner and from the ownership table
    pub fn remove_dataset(&mut self, column: &str) -> Result<(), NetworkError> {
        let owner = self
            .owner_lookup
            .remove(column)
            .ok_or_else(|| NetworkError::UnknownDataset(column.to_string()))?;
        if let Some(member) = self.members.get_mut(&owner) {
            member.remove_own_data(column);
        }
        debug!("dataset {} removed from {}", column, owner);
        Ok(())
    }

    pub fn set_policy(&mut self, policy: TreePolicy) {
        self.policy = policy;
        self.rebuild_tree();
    }

    fn check_grid(&self, member: &str, data: &Dataset) -> Result<(), NetworkError> {
        if data.frequency() != self.frequency {
            return Err(NetworkError::FrequencyMismatch {
                member: member.to_string(),
                expected: self.frequency,
                found: data.frequency(),
            });
        }
        if !data.is_aligned_with(self.current_time) {
            return Err(NetworkError::MisalignedData {
                member: member.to_string(),
                at: data.anchor(),
            });
        }
        Ok(())
    }

    fn rebuild_tree(&mut self) {
        let names: Vec<MemberName> = self.members.keys().cloned().collect();
        self.tree = AssignmentTree::build(self.policy, &names, &mut self.rng);
        debug!(
            "rebuilt {} tree over {} members (depth {})",
            self.policy,
            self.tree.len(),
            self.tree.depth()
        );
    }

    // ========================================================================
    // Time
    // ========================================================================

    /// Advance the clock one period; every member's own data grows with it
    pub fn tick(&mut self) {
        self.current_time += self.frequency.as_duration();
        for member in self.members.values_mut() {
            member.tick();
        }
    }

    pub fn earliest(&self) -> Option<Timestamp> {
        self.members.values().filter_map(Member::earliest).min()
    }

    /// Latest data point, never beyond the current time
    pub fn latest(&self) -> Option<Timestamp> {
        self.members
            .values()
            .filter_map(Member::latest)
            .max()
            .map(|latest| latest.min(self.current_time))
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// `N + 1` evenly spaced timestamps from `earliest` to `latest`.
    /// Empty when there are no members, no data, or `latest < earliest`.
    pub fn interval_boundaries(&self) -> Vec<Timestamp> {
        let count = self.members.len();
        let (Some(earliest), Some(latest)) = (self.earliest(), self.latest()) else {
            return Vec::new();
        };
        if count == 0 || latest < earliest {
            return Vec::new();
        }

        let span = i128::from((latest - earliest).num_milliseconds());
        (0..=count)
            .map(|i| {
                let offset = span * i as i128 / count as i128;
                earliest + Duration::milliseconds(offset as i64)
            })
            .collect()
    }

    /// One interval per member, in left_to_right order.
    ///
    /// Intervals are half-open except the last one, which also holds
    /// `latest`; together they partition `[earliest, latest]`.
    pub fn get_intervals(&self) -> IndexMap<MemberName, TimeRange> {
        let boundaries = self.interval_boundaries();
        if boundaries.len() < 2 {
            return IndexMap::new();
        }

        let last = boundaries.len() - 2;
        self.tree
            .left_to_right()
            .into_iter()
            .zip(boundaries.windows(2))
            .enumerate()
            .map(|(i, (name, bounds))| {
                let range = if i == last {
                    TimeRange::closed(bounds[0], bounds[1])
                } else {
                    TimeRange::half_open(bounds[0], bounds[1])
                };
                (name.clone(), range)
            })
            .collect()
    }

    /// Deliver every member (owner included) the slice of `column` that
    /// falls in its interval. Returns the number of deliveries, or `None`
    /// when nobody owns `column`.
    ///
    /// Calling it again without a tick delivers the same slices again and
    /// so doubles the received counts. All merges are computed before any is
    /// stored, so on error no member has received anything.
    pub fn distribute(&mut self, column: &str) -> Result<Option<usize>, NetworkError> {
        let Some(data) = self.get_dataset(column) else {
            debug!("nothing to distribute, dataset {} has no owner", column);
            return Ok(None);
        };

        let intervals = self.get_intervals();
        let mut merged = Vec::with_capacity(intervals.len());
        for (name, range) in &intervals {
            if let Some(member) = self.members.get(name) {
                merged.push((name, member.merged_received(&data.slice(range))?));
            }
        }

        let delivered = merged.len();
        for (name, received) in merged {
            if let Some(member) = self.members.get_mut(name) {
                member.replace_received(received);
            }
        }

        debug!(
            "distributed {} over {} members at {}",
            column, delivered, self.current_time
        );
        Ok(Some(delivered))
    }

    /// Distribute every owned dataset once; returns the total deliveries
    pub fn distribute_all(&mut self) -> Result<usize, NetworkError> {
        let columns: Vec<ColumnName> = self.dataset_names().into_iter().map(str::to_string).collect();
        let mut delivered = 0;
        for column in columns {
            delivered += self.distribute(&column)?.unwrap_or(0);
        }
        Ok(delivered)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Replication factor per grid point: how many members hold a nonzero
    /// cell of `column`. Covers the union of all received grids; points in
    /// gaps between them count 0.
    pub fn dataset_copies(&self, column: &str) -> BTreeMap<Timestamp, usize> {
        let mut copies = BTreeMap::new();
        let holders: Vec<&Dataset> = self
            .members
            .values()
            .filter_map(Member::received_data)
            .filter(|data| data.has_column(column) && !data.is_empty())
            .collect();

        let first = holders.iter().filter_map(|data| data.earliest()).min();
        let last = holders.iter().filter_map(|data| data.latest()).max();
        let (Some(first), Some(last)) = (first, last) else {
            return copies;
        };

        let mut at = first;
        while at <= last {
            copies.insert(at, 0);
            at += self.frequency.as_duration();
        }

        for data in holders {
            let cells = data.column(column).unwrap_or_default();
            for (at, &cell) in data.timestamps().zip(cells) {
                if cell > 0 {
                    *copies.entry(at).or_insert(0) += 1;
                }
            }
        }
        copies
    }

    /// Share of the owner's grid points each member has received.
    /// `None` when `column` is unowned, has no grid points, or the network
    /// is empty.
    pub fn coverage_stats(&self, column: &str) -> Option<CoverageStats> {
        let total = self.owner_of(column)?.own_data()?.len();
        if total == 0 || self.members.is_empty() {
            return None;
        }

        let per_member: IndexMap<MemberName, f64> = self
            .members
            .iter()
            .map(|(name, member)| (name.clone(), member.observations(column) as f64 / total as f64))
            .collect();

        let ratios = per_member.values().copied();
        let min = ratios.clone().fold(f64::INFINITY, f64::min);
        let max = ratios.clone().fold(f64::NEG_INFINITY, f64::max);
        let avg = ratios.sum::<f64>() / per_member.len() as f64;

        Some(CoverageStats {
            min_percent: min * 100.0,
            avg_percent: avg * 100.0,
            max_percent: max * 100.0,
            per_member,
        })
    }
}
