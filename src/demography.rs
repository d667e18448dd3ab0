//! Demographic model driving the simulator: per-population size and
//! exponential growth, a migration matrix, and a time-ordered queue of
//! parameter-change events.
//!
//! Grounded in `original_source/tests/test_demography.py` and
//! `original_source/msprime/trees.py`, which specify the three
//! demographic event kinds used here (`PopulationParametersChange`,
//! `MigrationRateChange`, `MassMigration`) and the exponential-growth
//! convention `size(t) = initial_size * exp(-growth_rate * t)`
//! (`test_demography.py::test_single_growth_rate`). Not present in
//! `forrustts`, whose scope stops at simplification; styled after its
//! `thiserror`/struct conventions regardless.

use crate::tsdef::{Time, TsInt};

/// The state of a single population at a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationParameters {
    pub initial_size: f64,
    pub growth_rate: f64,
}

impl PopulationParameters {
    /// Population size at `elapsed` time units after the point this
    /// parameter set took effect.
    pub fn size_at(&self, elapsed: Time) -> f64 {
        self.initial_size * (-self.growth_rate * elapsed as f64).exp()
    }
}

/// A scheduled change to the demographic model, applied at a given time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DemographicEvent {
    /// Change the size and/or growth rate of one population.
    PopulationParametersChange {
        population: TsInt,
        initial_size: Option<f64>,
        growth_rate: Option<f64>,
    },
    /// Change the per-generation migration rate from `source` to `dest`.
    MigrationRateChange {
        source: TsInt,
        dest: TsInt,
        rate: f64,
    },
    /// Move every lineage in `source` into `dest` with probability
    /// `proportion`, looking backwards in time.
    MassMigration {
        source: TsInt,
        dest: TsInt,
        proportion: f64,
    },
}

/// Per-population state, a migration matrix, and a time-ordered event
/// queue (spec §2's `DemographicModel`, new relative to `forrustts`).
#[derive(Clone, Debug)]
pub struct DemographicModel {
    populations: Vec<PopulationParameters>,
    /// `migration_matrix[i][j]` is the rate of migration from `i` to `j`.
    migration_matrix: Vec<Vec<f64>>,
    /// `(time, event)` pairs, kept sorted ascending by time.
    events: Vec<(Time, DemographicEvent)>,
    /// Time each population's current parameters took effect, needed
    /// to evaluate exponential growth relative to the right origin.
    epoch_start: Vec<Time>,
}

impl DemographicModel {
    /// A model with `num_populations` demes, each of constant size
    /// `initial_size` and zero migration between them.
    pub fn new(num_populations: usize, initial_size: f64) -> Self {
        DemographicModel {
            populations: vec![
                PopulationParameters {
                    initial_size,
                    growth_rate: 0.0,
                };
                num_populations
            ],
            migration_matrix: vec![vec![0.0; num_populations]; num_populations],
            events: Vec::new(),
            epoch_start: vec![0; num_populations],
        }
    }

    pub fn num_populations(&self) -> usize {
        self.populations.len()
    }

    pub fn set_migration_rate(&mut self, source: TsInt, dest: TsInt, rate: f64) {
        self.migration_matrix[source as usize][dest as usize] = rate;
    }

    pub fn migration_rate(&self, source: TsInt, dest: TsInt) -> f64 {
        self.migration_matrix[source as usize][dest as usize]
    }

    /// Schedule `event` to apply at `time`. Events are re-sorted by
    /// time on every call; models carry few enough events that this is
    /// not worth optimizing.
    pub fn add_event(&mut self, time: Time, event: DemographicEvent) {
        self.events.push((time, event));
        self.events.sort_by_key(|(t, _)| *t);
    }

    /// Population size of `population` at `time`, accounting for
    /// exponential growth since the start of its current epoch.
    pub fn population_size(&self, population: TsInt, time: Time) -> f64 {
        let p = self.populations[population as usize];
        p.size_at(time - self.epoch_start[population as usize])
    }

    /// The time of the next scheduled event strictly after `after`, if any.
    pub fn next_event_time(&self, after: Time) -> Option<Time> {
        self.events.iter().map(|(t, _)| *t).find(|&t| t > after)
    }

    /// Apply every event scheduled at exactly `time`. Returns the
    /// lineages that must migrate as `(source, dest, proportion)`
    /// triples for `MassMigration` events; the caller draws which
    /// individual lineages move.
    pub fn apply_events_at(&mut self, time: Time) -> Vec<(TsInt, TsInt, f64)> {
        let mut mass_migrations = Vec::new();
        for &(t, event) in &self.events {
            if t != time {
                continue;
            }
            match event {
                DemographicEvent::PopulationParametersChange {
                    population,
                    initial_size,
                    growth_rate,
                } => {
                    let idx = population as usize;
                    let current_size = self.population_size(population, time);
                    self.populations[idx].initial_size = initial_size.unwrap_or(current_size);
                    if let Some(g) = growth_rate {
                        self.populations[idx].growth_rate = g;
                    }
                    self.epoch_start[idx] = time;
                }
                DemographicEvent::MigrationRateChange { source, dest, rate } => {
                    self.set_migration_rate(source, dest, rate);
                }
                DemographicEvent::MassMigration {
                    source,
                    dest,
                    proportion,
                } => {
                    mass_migrations.push((source, dest, proportion));
                }
            }
        }
        mass_migrations
    }
}

#[cfg(test)]
mod test_demography {
    use super::*;

    #[test]
    fn test_constant_size_has_no_growth() {
        let d = DemographicModel::new(1, 100.0);
        assert_eq!(d.population_size(0, 50), 100.0);
    }

    #[test]
    fn test_growth_rate_matches_exponential_formula() {
        let ne = 1000.0;
        let growth_rate = -0.01;
        let end_time = 20;
        let mut d = DemographicModel::new(1, ne);
        d.populations[0].growth_rate = growth_rate;
        let expected = ne * (-growth_rate * end_time as f64).exp();
        assert!((d.population_size(0, end_time) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_population_parameters_change_resets_epoch() {
        let mut d = DemographicModel::new(1, 100.0);
        d.populations[0].growth_rate = -0.01;
        let mass = d.apply_events_at(10);
        assert!(mass.is_empty());
        let _ = d.population_size(0, 10);
        d.add_event(
            20,
            DemographicEvent::PopulationParametersChange {
                population: 0,
                initial_size: Some(500.0),
                growth_rate: Some(0.0),
            },
        );
        d.apply_events_at(20);
        assert_eq!(d.population_size(0, 25), 500.0);
    }

    #[test]
    fn test_mass_migration_is_reported_not_applied() {
        let mut d = DemographicModel::new(2, 100.0);
        d.add_event(
            5,
            DemographicEvent::MassMigration {
                source: 0,
                dest: 1,
                proportion: 1.0,
            },
        );
        let moves = d.apply_events_at(5);
        assert_eq!(moves, vec![(0, 1, 1.0)]);
    }
}
