use crate::models::{Config, FundRecord, GroupBy, LinkOrdering, NB_LINKS};
use crate::table::FundTable;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Pool a link was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Group,
    Type,
    Random,
    Repair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    /// A donor had a blank slot
    FreeSlot,
    /// A donor's link to a fund with other inbound links was replaced
    RedundantLink,
    /// Last slot of the next fund was overwritten regardless of coverage
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    pub orphan: usize,
    pub donor: usize,
    pub slot: usize,
    pub displaced: Option<String>,
    pub kind: RepairKind,
}

#[derive(Debug, Clone)]
pub struct LinkReport {
    pub links: Vec<[String; NB_LINKS]>,
    pub sources: Vec<[Option<LinkSource>; NB_LINKS]>,
    pub repairs: Vec<Repair>,
    /// Rows that could not receive an inbound link
    pub unrepaired: Vec<usize>,
}

impl LinkReport {
    fn from_assignments(
        funds: &[FundRecord],
        assignments: &[Vec<Slot>],
        repairs: Vec<Repair>,
        unrepaired: Vec<usize>,
    ) -> Self {
        let mut links = Vec::with_capacity(assignments.len());
        let mut sources = Vec::with_capacity(assignments.len());
        for slots in assignments {
            let mut names: [String; NB_LINKS] = Default::default();
            let mut origin: [Option<LinkSource>; NB_LINKS] = Default::default();
            for (position, slot) in slots.iter().take(NB_LINKS).enumerate() {
                names[position] = funds[slot.target].name.clone();
                origin[position] = Some(slot.source);
            }
            links.push(names);
            sources.push(origin);
        }

        Self {
            links,
            sources,
            repairs,
            unrepaired,
        }
    }

    /// Number of outbound lists referencing each name
    pub fn inbound_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for name in self.links.iter().flatten().filter(|name| !name.is_empty()) {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Rows whose name is never linked to
    pub fn orphans(&self, table: &FundTable) -> Vec<usize> {
        let counts = self.inbound_counts();
        table
            .funds
            .iter()
            .enumerate()
            .filter(|(_, fund)| !fund.name.is_empty() && !counts.contains_key(&fund.name))
            .map(|(row, _)| row)
            .collect()
    }

    pub fn assigned_links(&self) -> usize {
        self.links.iter().flatten().filter(|name| !name.is_empty()).count()
    }

    pub fn blank_slots(&self) -> usize {
        self.links.len() * NB_LINKS - self.assigned_links()
    }

    pub fn forced_repairs(&self) -> usize {
        self.repairs
            .iter()
            .filter(|repair| repair.kind == RepairKind::Forced)
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    target: usize,
    source: LinkSource,
}

/// Collects up to `NB_LINKS` distinct names for one fund, never its own
struct Picker<'a> {
    funds: &'a [FundRecord],
    own: &'a str,
    slots: Vec<Slot>,
    names: HashSet<&'a str>,
}

impl<'a> Picker<'a> {
    fn new(funds: &'a [FundRecord], row: usize) -> Self {
        Self {
            funds,
            own: funds[row].name.as_str(),
            slots: Vec::with_capacity(NB_LINKS),
            names: HashSet::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.slots.len() >= NB_LINKS
    }

    fn accepts(&self, candidate: usize) -> bool {
        let name = self.funds[candidate].name.as_str();
        !name.is_empty() && name != self.own && !self.names.contains(name)
    }

    fn offer(&mut self, candidate: usize, source: LinkSource) {
        if self.is_full() || !self.accepts(candidate) {
            return;
        }
        self.names.insert(self.funds[candidate].name.as_str());
        self.slots.push(Slot {
            target: candidate,
            source,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pool {
    Type,
    Random,
}

pub struct LinkBuilder {
    pub group_by: GroupBy,
    pub ordering: LinkOrdering,
    pub soft_cap: usize,
    pub ensure_one_inbound: bool,
}

impl LinkBuilder {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            ordering: LinkOrdering::LeastUsed,
            soft_cap: 12,
            ensure_one_inbound: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            group_by: config.group_by,
            ordering: config.ordering,
            soft_cap: config.soft_cap,
            ensure_one_inbound: config.ensure_one_inbound,
        }
    }

    pub fn ordering(mut self, ordering: LinkOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn soft_cap(mut self, soft_cap: usize) -> Self {
        self.soft_cap = soft_cap;
        self
    }

    pub fn ensure_one_inbound(mut self, enabled: bool) -> Self {
        self.ensure_one_inbound = enabled;
        self
    }

    /// Computes the links of every fund in `table`.
    ///
    /// The table is not modified. All randomness is drawn from `rng`, so a
    /// seeded generator gives reproducible links.
    pub fn build<R: Rng + ?Sized>(&self, table: &FundTable, rng: &mut R) -> LinkReport {
        let funds = &table.funds;
        let mut assignments = self.assign_initial(funds, rng);

        let (repairs, unrepaired) = if self.ensure_one_inbound {
            repair_orphans(funds, self.group_by, &mut assignments, NB_LINKS)
        } else {
            (Vec::new(), Vec::new())
        };

        let report = LinkReport::from_assignments(funds, &assignments, repairs, unrepaired);
        info!(
            funds = funds.len(),
            links = report.assigned_links(),
            repairs = report.repairs.len(),
            forced = report.forced_repairs(),
            "links built"
        );
        report
    }

    fn assign_initial<R: Rng + ?Sized>(&self, funds: &[FundRecord], rng: &mut R) -> Vec<Vec<Slot>> {
        let groups = index_by(funds, |fund| fund.group_key(self.group_by));
        let types = index_by(funds, FundRecord::type_key);
        let mut usage: HashMap<&str, usize> = HashMap::new();
        let mut assignments = Vec::with_capacity(funds.len());

        for (row, fund) in funds.iter().enumerate() {
            let mut picker = Picker::new(funds, row);

            // Same group: the next members in table order, wrapping around
            if let Some(members) = fund.group_key(self.group_by).and_then(|key| groups.get(key)) {
                if let Some(rank) = members.iter().position(|&member| member == row) {
                    let size = members.len();
                    for step in 1..size {
                        if picker.is_full() {
                            break;
                        }
                        picker.offer(members[(rank + step) % size], LinkSource::Group);
                    }
                }
            }

            if !picker.is_full() {
                if let Some(members) = fund.type_key().and_then(|key| types.get(key)) {
                    let mut pool: Vec<usize> = members
                        .iter()
                        .copied()
                        .filter(|&candidate| picker.accepts(candidate))
                        .collect();
                    self.order_pool(&mut pool, Pool::Type, funds, &usage, rng);
                    for candidate in pool {
                        picker.offer(candidate, LinkSource::Type);
                    }
                }
            }

            if !picker.is_full() {
                let mut pool: Vec<usize> = (0..funds.len())
                    .filter(|&candidate| picker.accepts(candidate))
                    .collect();
                self.order_pool(&mut pool, Pool::Random, funds, &usage, rng);
                for candidate in pool {
                    picker.offer(candidate, LinkSource::Random);
                }
            }

            for slot in &picker.slots {
                *usage.entry(funds[slot.target].name.as_str()).or_insert(0) += 1;
            }
            debug!(
                fund = %fund.name,
                links = picker.slots.len(),
                "initial links assigned"
            );
            assignments.push(picker.slots);
        }

        assignments
    }

    fn order_pool<R: Rng + ?Sized>(
        &self,
        pool: &mut [usize],
        kind: Pool,
        funds: &[FundRecord],
        usage: &HashMap<&str, usize>,
        rng: &mut R,
    ) {
        match (self.ordering, kind) {
            (LinkOrdering::Alphabetical, Pool::Type) => {
                pool.sort_by(|&a, &b| funds[a].name.cmp(&funds[b].name).then(a.cmp(&b)));
            }
            (LinkOrdering::Alphabetical, Pool::Random) => pool.shuffle(rng),
            (LinkOrdering::LeastUsed, _) => {
                pool.shuffle(rng);
                // Stable sort keeps the shuffle among equally used funds
                let cap = self.soft_cap;
                pool.sort_by_key(|&candidate| {
                    usage
                        .get(funds[candidate].name.as_str())
                        .copied()
                        .unwrap_or(0)
                        .min(cap)
                });
            }
        }
    }
}

/// Rows grouped by key, each group in table order
fn index_by<'a, F>(funds: &'a [FundRecord], key: F) -> HashMap<&'a str, Vec<usize>>
where
    F: Fn(&'a FundRecord) -> Option<&'a str>,
{
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row, fund) in funds.iter().enumerate() {
        if let Some(value) = key(fund) {
            index.entry(value).or_default().push(row);
        }
    }
    index
}

#[derive(Debug, Clone, Copy)]
enum DonorTier {
    SameGroup,
    SameType,
    Any,
}

const DONOR_TIERS: [DonorTier; 3] = [DonorTier::SameGroup, DonorTier::SameType, DonorTier::Any];

impl DonorTier {
    fn matches(self, orphan: &FundRecord, donor: &FundRecord, group_by: GroupBy) -> bool {
        match self {
            DonorTier::SameGroup => {
                orphan.group_key(group_by).is_some()
                    && orphan.group_key(group_by) == donor.group_key(group_by)
            }
            DonorTier::SameType => {
                orphan.type_key().is_some() && orphan.type_key() == donor.type_key()
            }
            DonorTier::Any => true,
        }
    }
}

/// Donors of `orphan` matching `tier`, in scan order
fn donors_in<'a>(
    tier: DonorTier,
    donors: &'a [usize],
    funds: &'a [FundRecord],
    orphan: usize,
    group_by: GroupBy,
) -> impl Iterator<Item = usize> + 'a {
    donors
        .iter()
        .copied()
        .filter(move |&donor| tier.matches(&funds[orphan], &funds[donor], group_by))
}

/// Gives every fund without inbound links one inbound link.
///
/// Donors are tried with a blank slot first, then by replacing a link whose
/// target keeps another inbound link, and only then by overwriting the last
/// slot of the next fund. Returns the repairs made and the rows left as
/// orphans.
fn repair_orphans(
    funds: &[FundRecord],
    group_by: GroupBy,
    assignments: &mut [Vec<Slot>],
    capacity: usize,
) -> (Vec<Repair>, Vec<usize>) {
    let mut repairs = Vec::new();
    let mut unrepaired = Vec::new();
    // With fewer than two names nobody can link to anybody
    let names: HashSet<&str> = funds
        .iter()
        .map(|fund| fund.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    if capacity == 0 || names.len() < 2 {
        return (repairs, unrepaired);
    }

    let mut inbound: HashMap<&str, usize> = HashMap::new();
    for slot in assignments.iter().flatten() {
        *inbound.entry(funds[slot.target].name.as_str()).or_insert(0) += 1;
    }

    let total = funds.len();
    for orphan in 0..total {
        let name = funds[orphan].name.as_str();
        if name.is_empty() || inbound.get(name).copied().unwrap_or(0) > 0 {
            continue;
        }

        let donors: Vec<usize> = (orphan + 1..total)
            .chain(0..orphan)
            .filter(|&donor| funds[donor].name != name)
            .collect();
        if donors.is_empty() {
            warn!(fund = name, "no other fund can link to this orphan");
            unrepaired.push(orphan);
            continue;
        }

        let free_slot = DONOR_TIERS.iter().find_map(|&tier| {
            donors_in(tier, &donors, funds, orphan, group_by).find(|&donor| assignments[donor].len() < capacity)
        });
        if let Some(donor) = free_slot {
            let slot = assignments[donor].len();
            assignments[donor].push(Slot {
                target: orphan,
                source: LinkSource::Repair,
            });
            *inbound.entry(name).or_insert(0) += 1;
            debug!(orphan = name, donor = %funds[donor].name, "orphan linked from free slot");
            repairs.push(Repair {
                orphan,
                donor,
                slot,
                displaced: None,
                kind: RepairKind::FreeSlot,
            });
            continue;
        }

        let redundant = DONOR_TIERS.iter().find_map(|&tier| {
            donors_in(tier, &donors, funds, orphan, group_by).find_map(|donor| {
                assignments[donor]
                    .iter()
                    .rposition(|slot| {
                        inbound
                            .get(funds[slot.target].name.as_str())
                            .copied()
                            .unwrap_or(0)
                            >= 2
                    })
                    .map(|slot| (donor, slot))
            })
        });

        let (donor, slot, kind) = match redundant {
            Some((donor, slot)) => (donor, slot, RepairKind::RedundantLink),
            None => {
                let donor = donors[0];
                (donor, assignments[donor].len() - 1, RepairKind::Forced)
            }
        };

        let displaced = funds[assignments[donor][slot].target].name.as_str();
        assignments[donor][slot] = Slot {
            target: orphan,
            source: LinkSource::Repair,
        };
        if let Some(count) = inbound.get_mut(displaced) {
            *count = count.saturating_sub(1);
        }
        *inbound.entry(name).or_insert(0) += 1;

        if kind == RepairKind::Forced {
            let remaining = inbound.get(displaced).copied().unwrap_or(0);
            warn!(
                orphan = name,
                donor = %funds[donor].name,
                displaced,
                remaining,
                "forced overwrite to link orphan"
            );
        } else {
            debug!(orphan = name, donor = %funds[donor].name, displaced, "orphan linked in place of a redundant link");
        }

        repairs.push(Repair {
            orphan,
            donor,
            slot,
            displaced: Some(displaced.to_string()),
            kind,
        });
    }

    (repairs, unrepaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::root_name;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fund(name: &str, fund_type: &str, sub_type: Option<&str>) -> FundRecord {
        FundRecord {
            name: name.to_string(),
            isin: String::new(),
            fund_type: fund_type.to_string(),
            sub_type: sub_type.map(str::to_string),
            root_name: root_name(name),
        }
    }

    fn table(funds: Vec<FundRecord>) -> FundTable {
        FundTable::from_funds(funds)
    }

    fn slots(targets: &[usize]) -> Vec<Slot> {
        targets
            .iter()
            .map(|&target| Slot {
                target,
                source: LinkSource::Random,
            })
            .collect()
    }

    #[test]
    fn empty_table_has_no_links() {
        let report = LinkBuilder::new(GroupBy::RootName).build(&table(vec![]), &mut StdRng::seed_from_u64(1));
        assert!(report.links.is_empty());
        assert!(report.repairs.is_empty());
    }

    #[test]
    fn single_fund_gets_blank_links() {
        let t = table(vec![fund("Solo", "Actions", None)]);
        let report = LinkBuilder::new(GroupBy::RootName).build(&t, &mut StdRng::seed_from_u64(1));

        assert_eq!(report.links, vec![[String::new(), String::new(), String::new()]]);
        assert_eq!(report.blank_slots(), 3);
        assert!(report.repairs.is_empty());
        assert!(report.unrepaired.is_empty());
    }

    #[test]
    fn group_members_link_to_the_next_members() {
        let t = table(vec![
            fund("Alpha Fund - A", "Actions", None),
            fund("Alpha Fund - B", "Actions", None),
            fund("Alpha Fund - C", "Actions", None),
            fund("Alpha Fund - D", "Actions", None),
            fund("Alpha Fund - E", "Actions", None),
        ]);
        let report = LinkBuilder::new(GroupBy::RootName).build(&t, &mut StdRng::seed_from_u64(3));

        assert_eq!(report.links[0], ["Alpha Fund - B", "Alpha Fund - C", "Alpha Fund - D"].map(String::from));
        assert_eq!(report.links[3], ["Alpha Fund - E", "Alpha Fund - A", "Alpha Fund - B"].map(String::from));
        assert_eq!(report.links[4], ["Alpha Fund - A", "Alpha Fund - B", "Alpha Fund - C"].map(String::from));
        assert!(report.sources.iter().flatten().all(|s| *s == Some(LinkSource::Group)));
        assert!(report.repairs.is_empty());
    }

    #[test]
    fn shared_sub_type_links_both_ways_first() {
        let t = table(vec![
            fund("One", "Actions", Some("Europe")),
            fund("Two", "Obligations", Some("Asie")),
            fund("Three", "Actions", Some("Europe")),
            fund("Four", "Monétaire", Some("Monde")),
            fund("Five", "Obligations", Some("Emergents")),
        ]);
        let report = LinkBuilder::new(GroupBy::SubType)
            .ensure_one_inbound(false)
            .build(&t, &mut StdRng::seed_from_u64(9));

        assert_eq!(report.links[0][0], "Three");
        assert_eq!(report.links[2][0], "One");
        assert_eq!(report.sources[0][0], Some(LinkSource::Group));
        assert_eq!(report.sources[2][0], Some(LinkSource::Group));
    }

    #[test]
    fn shared_type_fills_links_before_random() {
        let names = ["Aurore", "Boreal", "Cobalt", "Dune", "Eclat", "Fjord"];
        let t = table(names.iter().map(|n| fund(n, "Actions", None)).collect());
        let report = LinkBuilder::new(GroupBy::RootName)
            .ensure_one_inbound(false)
            .build(&t, &mut StdRng::seed_from_u64(5));

        for origin in &report.sources {
            assert!(origin.iter().all(|s| *s == Some(LinkSource::Type)));
        }
    }

    #[test]
    fn alphabetical_ordering_prefers_first_names() {
        let t = table(vec![
            fund("Zephyr", "Actions", None),
            fund("Delta", "Actions", None),
            fund("Alpha", "Actions", None),
            fund("Charlie", "Actions", None),
            fund("Bravo", "Actions", None),
        ]);
        let report = LinkBuilder::new(GroupBy::RootName)
            .ordering(LinkOrdering::Alphabetical)
            .ensure_one_inbound(false)
            .build(&t, &mut StdRng::seed_from_u64(0));

        assert_eq!(report.links[0], ["Alpha", "Bravo", "Charlie"].map(String::from));
        assert_eq!(report.links[2], ["Bravo", "Charlie", "Delta"].map(String::from));
    }

    #[test]
    fn least_used_spreads_links() {
        let funds: Vec<FundRecord> = (0..10)
            .map(|k| fund(&format!("Portefeuille {:02}", k), "Actions", None))
            .collect();
        let t = table(funds);

        let balanced = LinkBuilder::new(GroupBy::RootName)
            .ensure_one_inbound(false)
            .build(&t, &mut StdRng::seed_from_u64(11));
        let alphabetical = LinkBuilder::new(GroupBy::RootName)
            .ordering(LinkOrdering::Alphabetical)
            .ensure_one_inbound(false)
            .build(&t, &mut StdRng::seed_from_u64(11));

        let max_balanced = balanced.inbound_counts().values().copied().max().unwrap();
        let max_alphabetical = alphabetical.inbound_counts().values().copied().max().unwrap();
        assert!(max_balanced <= 6, "max inbound {}", max_balanced);
        assert_eq!(max_alphabetical, 9);
    }

    #[test]
    fn duplicate_names_are_never_self_links() {
        let t = table(vec![
            fund("Twin", "Actions", None),
            fund("Twin", "Actions", None),
            fund("Other", "Actions", None),
        ]);
        let report = LinkBuilder::new(GroupBy::RootName).build(&t, &mut StdRng::seed_from_u64(2));

        assert_eq!(report.links[0], ["Other".to_string(), String::new(), String::new()]);
        assert_eq!(report.links[1], ["Other".to_string(), String::new(), String::new()]);
        assert_eq!(report.links[2][0], "Twin");
        assert!(report.orphans(&t).is_empty());
    }

    #[test]
    fn redundant_link_is_replaced_before_forcing() {
        let funds = vec![
            fund("Alpha", "Actions", None),
            fund("Bravo", "Actions", None),
            fund("Charlie", "Actions", None),
            fund("Orphan", "Actions", None),
        ];
        // Alpha is linked twice; Charlie and Orphan never
        let mut assignments = vec![slots(&[1]), slots(&[0]), slots(&[0]), slots(&[])];

        let (repairs, unrepaired) = repair_orphans(&funds, GroupBy::RootName, &mut assignments, 1);

        assert!(unrepaired.is_empty());
        assert_eq!(repairs.len(), 2);
        assert_eq!(repairs[0].kind, RepairKind::FreeSlot);
        assert_eq!(repairs[0].orphan, 2);
        assert_eq!(repairs[0].donor, 3);
        assert_eq!(repairs[1].kind, RepairKind::RedundantLink);
        assert_eq!(repairs[1].orphan, 3);
        assert_eq!(repairs[1].donor, 1);
        assert_eq!(repairs[1].displaced.as_deref(), Some("Alpha"));
    }

    #[test]
    fn forced_overwrite_is_reported() {
        let funds = vec![
            fund("Alpha", "Actions", None),
            fund("Bravo", "Actions", None),
            fund("Orphan", "Actions", None),
        ];
        let mut assignments = vec![slots(&[1]), slots(&[0]), slots(&[])];

        let (repairs, unrepaired) = repair_orphans(&funds, GroupBy::RootName, &mut assignments, 1);

        assert!(unrepaired.is_empty());
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].kind, RepairKind::Forced);
        assert_eq!(repairs[0].donor, 0);
        assert_eq!(repairs[0].displaced.as_deref(), Some("Bravo"));
        assert_eq!(assignments[0][0].target, 2);
    }

    #[test]
    fn free_slot_prefers_same_type_donor() {
        let funds = vec![
            fund("Alpha", "Obligations", None),
            fund("Bravo", "Actions", None),
            fund("Orphan", "Actions", None),
        ];
        let mut assignments = vec![slots(&[1]), slots(&[]), slots(&[0, 1])];

        let (repairs, _) = repair_orphans(&funds, GroupBy::RootName, &mut assignments, NB_LINKS);

        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].orphan, 2);
        assert_eq!(repairs[0].donor, 1);
        assert_eq!(repairs[0].kind, RepairKind::FreeSlot);
    }

    #[test]
    fn lone_name_needs_no_repair() {
        let funds = vec![fund("Same", "Actions", None), fund("Same", "Actions", None)];
        let mut assignments = vec![slots(&[]), slots(&[])];

        let (repairs, unrepaired) = repair_orphans(&funds, GroupBy::RootName, &mut assignments, NB_LINKS);

        assert!(repairs.is_empty());
        assert!(unrepaired.is_empty());
    }

    #[test]
    fn free_slot_prefers_same_group_donor() {
        let funds = vec![
            fund("Alpha Fund - O", "Actions", None),
            fund("Bravo", "Actions", None),
            fund("Alpha Fund - B", "Obligations", None),
        ];
        let mut assignments = vec![slots(&[1, 2]), slots(&[2]), slots(&[1])];

        let (repairs, _) = repair_orphans(&funds, GroupBy::RootName, &mut assignments, NB_LINKS);

        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].orphan, 0);
        // Bravo shares the type and comes first in scan order, the group wins
        assert_eq!(repairs[0].donor, 2);
        assert_eq!(repairs[0].kind, RepairKind::FreeSlot);
    }

    #[test]
    fn redundant_link_prefers_same_group_donor() {
        let funds = vec![
            fund("Alpha Fund - O", "Actions", None),
            fund("Bravo", "Actions", None),
            fund("Alpha Fund - B", "Obligations", None),
            fund("Charlie", "Obligations", None),
            fund("Delta", "Obligations", None),
        ];
        // Charlie is linked three times
        let mut assignments = vec![slots(&[3]), slots(&[3]), slots(&[3]), slots(&[4]), slots(&[1])];

        let (repairs, unrepaired) = repair_orphans(&funds, GroupBy::RootName, &mut assignments, 1);

        assert!(unrepaired.is_empty());
        assert_eq!(repairs[0].orphan, 0);
        assert_eq!(repairs[0].kind, RepairKind::RedundantLink);
        assert_eq!(repairs[0].donor, 2);
        assert_eq!(repairs[0].displaced.as_deref(), Some("Charlie"));
    }

    #[test]
    fn funds_at_soft_cap_keep_shuffled_order() {
        let funds: Vec<FundRecord> = ["Un", "Deux", "Trois", "Quatre", "Cinq", "Six"]
            .iter()
            .map(|name| fund(name, "Actions", None))
            .collect();
        let usage: HashMap<&str, usize> = [("Un", 5), ("Deux", 1), ("Trois", 3)].into_iter().collect();
        let used = |row: &usize| usage.contains_key(funds[*row].name.as_str());

        let mut shuffled: Vec<usize> = (0..funds.len()).collect();
        shuffled.shuffle(&mut StdRng::seed_from_u64(4));
        let expected: Vec<usize> = shuffled
            .iter()
            .filter(|&row| !used(row))
            .chain(shuffled.iter().filter(|&row| used(row)))
            .copied()
            .collect();

        let capped = LinkBuilder::new(GroupBy::RootName).soft_cap(1);
        let mut pool: Vec<usize> = (0..funds.len()).collect();
        capped.order_pool(&mut pool, Pool::Random, &funds, &usage, &mut StdRng::seed_from_u64(4));
        assert_eq!(pool, expected);

        // Below the cap usage decides
        let uncapped = LinkBuilder::new(GroupBy::RootName).soft_cap(10);
        let mut pool: Vec<usize> = (0..funds.len()).collect();
        uncapped.order_pool(&mut pool, Pool::Random, &funds, &usage, &mut StdRng::seed_from_u64(4));
        assert_eq!(&pool[3..], &[1, 2, 0]);
    }

    #[test]
    fn same_seed_same_links() {
        let funds: Vec<FundRecord> = (0..30)
            .map(|k| fund(&format!("Fonds {} - {}", k % 7, k), ["Actions", "Obligations"][k % 2], None))
            .collect();
        let t = table(funds);
        let builder = LinkBuilder::new(GroupBy::RootName);

        let first = builder.build(&t, &mut StdRng::seed_from_u64(42));
        let second = builder.build(&t, &mut StdRng::seed_from_u64(42));
        assert_eq!(first.links, second.links);
    }
}
