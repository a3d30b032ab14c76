//! Builds the magic tables the rest of the engine consumes.

use super::precompute::{MagicTableSeed, generate_magic_tables};
use super::structs::MagicTables;

/// Fixed seed for magic-number search. The search always succeeds for some
/// seed; fixing it means the generated tables (and therefore move generation)
/// are identical across runs of the same binary.
const MAGIC_SEED: u64 = 0x5EED_C0FF_EE15_F00D;

pub fn load_magic_tables() -> MagicTables {
    generate_magic_tables(MagicTableSeed::Fixed(MAGIC_SEED))
        .expect("magic number search failed for fixed seed")
}
