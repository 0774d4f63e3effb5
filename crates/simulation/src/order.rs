//! Random delivery orders that respect causality.

use atropos_types::{Event, EventId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};

/// Shuffle `events` into a random topological order.
///
/// Epochs are delivered in ascending order; inside an epoch any event whose
/// parents were all delivered may come next. Parents missing from `events`
/// are treated as delivered.
pub fn random_topological_order(events: &[Event], rng: &mut ChaCha8Rng) -> Vec<Event> {
    let mut by_epoch: BTreeMap<_, Vec<&Event>> = BTreeMap::new();
    for event in events {
        by_epoch.entry(event.epoch()).or_default().push(event);
    }

    let mut ordered = Vec::with_capacity(events.len());
    for epoch_events in by_epoch.into_values() {
        shuffle_epoch(&epoch_events, rng, &mut ordered);
    }
    ordered
}

/// Kahn's algorithm with a random pick among the ready events.
fn shuffle_epoch(events: &[&Event], rng: &mut ChaCha8Rng, out: &mut Vec<Event>) {
    let index: HashMap<EventId, usize> = events
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id(), i))
        .collect();

    let mut pending = vec![0usize; events.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); events.len()];
    for (i, event) in events.iter().enumerate() {
        for parent in event.parents() {
            if let Some(&p) = index.get(parent) {
                pending[i] += 1;
                children[p].push(i);
            }
        }
    }

    let mut ready: Vec<usize> = (0..events.len()).filter(|&i| pending[i] == 0).collect();
    while !ready.is_empty() {
        let next = ready.swap_remove(rng.gen_range(0..ready.len()));
        out.push(events[next].clone());
        for &child in &children[next] {
            pending[child] -= 1;
            if pending[child] == 0 {
                ready.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atropos_types::test_utils::for_each_scheme_event;
    use atropos_types::Epoch;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const SCHEME: &str = "
a1 b1 c1
a2 <- a1 b1 c1
b2 <- b1 a2
c2 <- c1 b2
a3 <- a2 c2
b3 <- b2 a3 c2
";

    fn scheme_events() -> Vec<Event> {
        let mut events = Vec::new();
        for_each_scheme_event(SCHEME, Epoch::FIRST, |_, _| {}, |event, _| {
            events.push(event.clone())
        });
        events
    }

    #[test]
    fn test_order_keeps_parents_first() {
        let events = scheme_events();
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let ordered = random_topological_order(&events, &mut rng);
            assert_eq!(ordered.len(), events.len());

            let mut seen = HashSet::new();
            for event in &ordered {
                assert!(event.parents().iter().all(|p| seen.contains(p)));
                seen.insert(event.id());
            }
        }
    }

    #[test]
    fn test_orders_differ_across_seeds() {
        let events = scheme_events();
        let orders: HashSet<Vec<EventId>> = (0..20)
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                random_topological_order(&events, &mut rng)
                    .iter()
                    .map(Event::id)
                    .collect()
            })
            .collect();
        assert!(orders.len() > 1);
    }
}
