//! Weighted median of observed creation times.

use crate::{HighestBeforeVector, TimedScheme, VecClockError, VectorEngine};
use atropos_types::{EventId, Timestamp, Weight};

impl VectorEngine<TimedScheme> {
    /// Weighted median of the latest creation times `id` observes from
    /// each validator.
    ///
    /// Cheaters carry no weight. Validators `id` hasn't observed contribute
    /// `default_time`. Returns 0 if every validator is a cheater.
    pub fn median_time(
        &self,
        id: &EventId,
        default_time: Timestamp,
    ) -> Result<Timestamp, VecClockError> {
        let before = self.merged_highest_before(id)?;
        let validators = self.validators();

        let mut honest_weight: Weight = 0;
        let mut highests: Vec<(Timestamp, Weight)> = (0..validators.len())
            .map(|idx| {
                let entry = before.get(idx);
                let (time, weight) = if entry.is_fork_detected() {
                    (before.time.get(idx), 0)
                } else if entry.seq == 0 {
                    (default_time, validators.weight_at(idx))
                } else {
                    (before.time.get(idx), validators.weight_at(idx))
                };
                honest_weight += weight;
                (time, weight)
            })
            .collect();

        highests.sort_by_key(|(time, _)| *time);

        let half = honest_weight / 2;
        let mut accumulated: Weight = 0;
        for (time, weight) in highests {
            accumulated += weight;
            if accumulated >= half {
                return Ok(time);
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{TimedScheme, VectorEngine};
    use atropos_kvdb::MemoryDb;
    use atropos_types::test_utils::{for_each_scheme_event, scheme_validators};
    use atropos_types::{Epoch, EventStore, ValidatorId, Validators};
    use std::sync::Arc;

    fn timed(
        scheme: &str,
        validators: &Validators,
    ) -> (VectorEngine<TimedScheme>, std::collections::BTreeMap<String, atropos_types::Event>) {
        let store = EventStore::new();
        let mut engine = VectorEngine::<TimedScheme>::new(
            Arc::new(store.clone()),
            Default::default(),
        );
        engine
            .reset(validators, Arc::new(MemoryDb::new("v")))
            .unwrap();
        let events = for_each_scheme_event(
            scheme,
            Epoch(1),
            // Creation time: 10 × the number in the name
            |draft, name| draft.creation_time = name[1..].parse::<u64>().unwrap_or(0) * 10,
            |event, _| {
                store.insert(event.clone());
                engine.add(event).unwrap();
                engine.flush().unwrap();
            },
        );
        (engine, events)
    }

    #[test]
    fn test_median_of_equal_weights() {
        let scheme = "
            a1 b2 c3 d4
            a5 <- a1 b2 c3 d4
        ";
        let (engine, events) = timed(scheme, &scheme_validators(scheme));
        // times 50, 20, 30, 40 sorted: 20 30 40 50, half weight 2 -> 30
        assert_eq!(engine.median_time(&events["a5"].id(), 0).unwrap(), 30);
    }

    #[test]
    fn test_unobserved_use_default_time() {
        let scheme = "
            a1 b2 c3 d4
            a5 <- a1 b2
        ";
        let (engine, events) = timed(scheme, &scheme_validators(scheme));
        // 50, 20, default 1, default 1 -> sorted 1 1 20 50 -> 1
        assert_eq!(engine.median_time(&events["a5"].id(), 1).unwrap(), 1);
        // default above the observed times
        assert_eq!(engine.median_time(&events["a5"].id(), 100).unwrap(), 50);
    }

    #[test]
    fn test_weights_shift_median() {
        let scheme = "
            a1 b2 c3
            a4 <- a1 b2 c3
        ";
        let validators = Validators::new([
            (ValidatorId(1), 1),
            (ValidatorId(2), 1),
            (ValidatorId(3), 10),
        ]);
        let (engine, events) = timed(scheme, &validators);
        assert_eq!(engine.median_time(&events["a4"].id(), 0).unwrap(), 30);
    }

    #[test]
    fn test_cheaters_carry_no_weight() {
        let scheme = "
            a1 b2 c3 d4
            a5 <- a1
            a6 <- a1
            b7 <- b2 a5 c3
            d8 <- d4 a6 b7
        ";
        let (engine, events) = timed(scheme, &scheme_validators(scheme));
        assert_eq!(
            engine.cheaters(&events["d8"].id()).unwrap(),
            vec![ValidatorId(1)]
        );
        // honest: b 70, c 30, d 80; half of 3 is 1 -> lowest time 30
        assert_eq!(engine.median_time(&events["d8"].id(), 0).unwrap(), 30);
    }
}
