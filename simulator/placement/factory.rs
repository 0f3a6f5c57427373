// Dataset and member construction for simulations

use super::config::NamingMode;
use replica_placement::{
    Dataset, Frequency, Member, NameGenerator, SequentialNames, TimeRange, Timestamp, WordNames,
};

/// Dataset over `[start, end]` with one column per name. `empty` gives a
/// zero-valued grid (nothing observed yet), otherwise every point is observed once.
pub fn create_dataset<S: AsRef<str>>(
    columns: &[S],
    start: Timestamp,
    end: Timestamp,
    frequency: Frequency,
    empty: bool,
) -> Dataset {
    let range = TimeRange::closed(start, end);
    if empty {
        Dataset::zeros(frequency, range, columns)
    } else {
        Dataset::observed(frequency, range, columns)
    }
}

pub fn name_generator(mode: &NamingMode, seed: [u8; 32]) -> Box<dyn NameGenerator> {
    match mode {
        NamingMode::Sequential { prefix } => Box::new(SequentialNames::new(prefix.clone())),
        NamingMode::Words => Box::new(WordNames::new(seed)),
    }
}

/// Creates `count` members, each owning `columns_per_member` observed
/// datasets `<name>-1 .. <name>-k` over `[start, end]`.
pub fn create_members(
    names: &mut dyn NameGenerator,
    count: usize,
    columns_per_member: usize,
    start: Timestamp,
    end: Timestamp,
    frequency: Frequency,
) -> Vec<Member> {
    (0..count)
        .map(|_| {
            let name = names.next_name();
            if columns_per_member == 0 {
                return Member::new(name);
            }
            let columns: Vec<String> = (1..=columns_per_member)
                .map(|k| format!("{}-{}", name, k))
                .collect();
            let data = create_dataset(&columns, start, end, frequency, false);
            Member::with_data(name, data)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_placement::rp_interface::parse_timestamp;

    #[test]
    fn test_create_dataset() {
        let start = parse_timestamp("2000-01-01").unwrap();
        let end = parse_timestamp("2000-01-02").unwrap();

        let observed = create_dataset(&["comfy"], start, end, Frequency::hours(1), false);
        assert_eq!(observed.len(), 25);
        assert_eq!(observed.nonzero_count("comfy"), 25);

        let empty = create_dataset(&["comfy"], start, end, Frequency::hours(1), true);
        assert_eq!(empty.len(), 25);
        assert_eq!(empty.nonzero_count("comfy"), 0);
    }

    #[test]
    fn test_create_members() {
        let start = parse_timestamp("2000-01-01").unwrap();
        let end = parse_timestamp("2000-01-01 03:00").unwrap();
        let mut names = name_generator(&NamingMode::default(), [0u8; 32]);

        let members = create_members(names.as_mut(), 2, 2, start, end, Frequency::hours(1));
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name(), "node-1");
        assert_eq!(members[0].datasets(), vec!["node-1-1", "node-1-2"]);
        assert_eq!(members[1].own_data().unwrap().len(), 4);

        let idle = create_members(names.as_mut(), 1, 0, start, end, Frequency::hours(1));
        assert_eq!(idle[0].name(), "node-3");
        assert!(idle[0].own_data().is_none());
    }
}
