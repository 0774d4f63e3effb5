//! Test utilities: build DAGs from a compact text scheme.
//!
//! Each non-empty line either lists parentless events separated by
//! whitespace, or declares one event with its parents:
//!
//! ```text
//! a1 b1 c1 d1
//! a2 <- a1 b1 c1
//! ```
//!
//! The first letter of a name is its creator (`a` → `ValidatorId(1)`,
//! `b` → `ValidatorId(2)`, ...). A parent with the same creator becomes the
//! self-parent and is moved first; listing the same self-parent twice across
//! events produces a fork. `#` starts a comment.

use crate::{Epoch, Event, MutableEvent, ValidatorId, Validators};
use std::collections::BTreeMap;

/// One event of a parsed scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeEvent {
    pub name: String,
    pub creator: ValidatorId,
    pub parents: Vec<String>,
}

/// Creator of a scheme event name.
///
/// # Panics
///
/// Panics if the name doesn't start with a lowercase ASCII letter.
pub fn creator_of(name: &str) -> ValidatorId {
    let first = name.as_bytes().first().copied().unwrap_or(b'?');
    assert!(
        first.is_ascii_lowercase(),
        "event name {name:?} must start with a lowercase letter"
    );
    ValidatorId((first - b'a' + 1) as u32)
}

/// Parse a scheme into events, in declaration order.
pub fn parse_scheme(scheme: &str) -> Vec<SchemeEvent> {
    let mut events = Vec::new();
    for line in scheme.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once("<-") {
            Some((name, parents)) => {
                let name = name.trim().to_string();
                events.push(SchemeEvent {
                    creator: creator_of(&name),
                    parents: parents.split_whitespace().map(str::to_string).collect(),
                    name,
                });
            }
            None => {
                for name in line.split_whitespace() {
                    events.push(SchemeEvent {
                        name: name.to_string(),
                        creator: creator_of(name),
                        parents: Vec::new(),
                    });
                }
            }
        }
    }
    events
}

/// Equal-weight validator set made of every creator in the scheme.
pub fn scheme_validators(scheme: &str) -> Validators {
    let mut ids: Vec<ValidatorId> = parse_scheme(scheme).iter().map(|e| e.creator).collect();
    ids.sort();
    ids.dedup();
    Validators::equal(ids)
}

/// Build every event of a scheme in order.
///
/// `build` may adjust the draft (e.g. assign frame) before it's frozen;
/// `process` receives the frozen event. Returns all events by name.
///
/// # Panics
///
/// Panics on unknown parents or duplicate names.
pub fn for_each_scheme_event<B, P>(
    scheme: &str,
    epoch: Epoch,
    mut build: B,
    mut process: P,
) -> BTreeMap<String, Event>
where
    B: FnMut(&mut MutableEvent, &str),
    P: FnMut(&Event, &str),
{
    let mut named: BTreeMap<String, Event> = BTreeMap::new();
    for scheme_event in parse_scheme(scheme) {
        assert!(
            !named.contains_key(&scheme_event.name),
            "duplicate event name {}",
            scheme_event.name
        );
        let mut parents: Vec<&Event> = scheme_event
            .parents
            .iter()
            .map(|p| {
                named
                    .get(p)
                    .unwrap_or_else(|| panic!("unknown parent {p} of {}", scheme_event.name))
            })
            .collect();

        let self_parent_pos = parents
            .iter()
            .position(|p| p.creator() == scheme_event.creator);
        let seq = match self_parent_pos {
            Some(pos) => {
                let self_parent = parents.remove(pos);
                parents.insert(0, self_parent);
                self_parent.seq() + 1
            }
            None => 1,
        };
        let lamport = parents.iter().map(|p| p.lamport()).max().unwrap_or(0) + 1;

        let mut draft = MutableEvent {
            epoch,
            seq,
            creator: scheme_event.creator,
            lamport,
            parents: parents.iter().map(|p| p.id()).collect(),
            creation_time: lamport as u64 * 1_000,
            extra: scheme_event.name.as_bytes().to_vec(),
            ..Default::default()
        };
        build(&mut draft, &scheme_event.name);
        let event = draft.build();
        process(&event, &scheme_event.name);
        named.insert(scheme_event.name, event);
    }
    named
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scheme() {
        let events = parse_scheme(
            "
            a1 b1   # genesis
            a2 <- b1 a1
            ",
        );
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].creator, ValidatorId(1));
        assert_eq!(events[2].parents, vec!["b1".to_string(), "a1".to_string()]);
    }

    #[test]
    fn test_self_parent_moved_first() {
        let named = for_each_scheme_event(
            "
            a1 b1
            a2 <- b1 a1
            ",
            Epoch(1),
            |_, _| {},
            |_, _| {},
        );
        let a2 = &named["a2"];
        assert_eq!(a2.seq(), 2);
        assert_eq!(a2.self_parent(), Some(named["a1"].id()));
        assert_eq!(a2.lamport(), 2);
    }

    #[test]
    fn test_forks_get_distinct_ids() {
        let named = for_each_scheme_event(
            "
            a1
            a2 <- a1
            ax <- a1
            ",
            Epoch(1),
            |_, _| {},
            |_, _| {},
        );
        assert_eq!(named["a2"].seq(), named["ax"].seq());
        assert_ne!(named["a2"].id(), named["ax"].id());
    }
}
