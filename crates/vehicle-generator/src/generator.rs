//! Seeded generator for synthetic vehicle records.

use crate::pools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use vehicle_model::{Region, VehicleRecord};

pub const PRODUCTION_YEARS: RangeInclusive<i32> = 2000..=2020;
pub const SEAT_COUNTS: RangeInclusive<u32> = 2..=7;
pub const ENGINE_CAPACITY_LITERS: RangeInclusive<f64> = 1.0..=4.0;
pub const MILEAGE_KM: RangeInclusive<u32> = 100..=450_000;

/// Engine type that has no displacement.
pub const ELECTRIC: &str = "Electric";

/// Produces vehicle records from a single seeded RNG.
///
/// The same seed always yields the same sequence of records.
pub struct VehicleGenerator {
    seed: u64,
    rng: StdRng,
    index: u64,
}

impl VehicleGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            index: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index the next record will get as its sequence id.
    pub fn current_index(&self) -> u64 {
        self.index
    }

    fn pick(&mut self, pool: &[&'static str]) -> String {
        pool[self.rng.gen_range(0..pool.len())].to_string()
    }

    /// Generate the record for the current index and advance.
    pub fn next_record(&mut self) -> VehicleRecord {
        let index = self.index;
        let region = Region::ALL[self.rng.gen_range(0..Region::ALL.len())];
        let city = self.pick(pools::CITIES);
        let brand = self.pick(pools::MANUFACTURERS);
        let model = self.pick(pools::MODELS);
        let production_year = self.rng.gen_range(PRODUCTION_YEARS);
        let body_type = self.pick(pools::BODY_TYPES);
        let seat_count = self.rng.gen_range(SEAT_COUNTS);
        let engine_type = self.pick(pools::ENGINE_TYPES);
        let engine_capacity_liters = if engine_type == ELECTRIC {
            0.0
        } else {
            round_to_tenth(self.rng.gen_range(ENGINE_CAPACITY_LITERS))
        };
        let mileage_km = self.rng.gen_range(MILEAGE_KM);

        self.index += 1;

        VehicleRecord {
            region,
            sequence_id: index.to_string(),
            city,
            brand,
            model,
            production_year,
            body_type,
            seat_count,
            engine_capacity_liters,
            engine_type,
            mileage_km,
        }
    }

    /// Lazily generate the next `count` records.
    pub fn records(&mut self, count: u64) -> RecordIterator<'_> {
        RecordIterator {
            generator: self,
            remaining: count,
        }
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Iterator returned by [`VehicleGenerator::records`].
pub struct RecordIterator<'a> {
    generator: &'a mut VehicleGenerator,
    remaining: u64,
}

impl Iterator for RecordIterator<'_> {
    type Item = VehicleRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.generator.next_record())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RecordIterator<'_> {}
