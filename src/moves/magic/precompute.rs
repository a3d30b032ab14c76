//! Magic-number search: builds the per-square rook/bishop attack tables used
//! by `MagicTables`. Run once at startup; a few milliseconds for all 128 squares.

use super::attacks::{bishop_attacks_per_square, rook_attacks_per_square};
use super::search::find_magic_number_for_square;
use super::structs::{BishopMagicTables, MagicEntry, MagicTables, RookMagicTables};
use rand::{SeedableRng, rngs::StdRng};

pub enum MagicTableSeed {
    Fixed(u64),
    Random,
}

fn rng_from_seed(seed: MagicTableSeed) -> StdRng {
    match seed {
        MagicTableSeed::Fixed(s) => StdRng::seed_from_u64(s),
        MagicTableSeed::Random => {
            use std::time::{SystemTime, UNIX_EPOCH};
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64;
            StdRng::seed_from_u64(nanos)
        }
    }
}

/// Relevant-occupancy mask for a rook on `square`: every square along its four
/// rays excluding the ray's own edge square (edge occupancy never changes the
/// attack set, since the ray already terminates there).
fn rook_relevant_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;
    for r in (rank + 1)..7 {
        mask |= 1 << (r * 8 + file);
    }
    for r in 1..rank {
        mask |= 1 << (r * 8 + file);
    }
    for f in (file + 1)..7 {
        mask |= 1 << (rank * 8 + f);
    }
    for f in 1..file {
        mask |= 1 << (rank * 8 + f);
    }
    mask
}

/// Relevant-occupancy mask for a bishop on `square`, excluding board edges.
fn bishop_relevant_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;
    for (dr, df) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let mut r = rank + dr;
        let mut f = file + df;
        while (1..=6).contains(&r) && (1..=6).contains(&f) {
            mask |= 1 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

/// Enumerates every subset of `mask` via the Carry-Rippler trick.
fn subsets_of(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1usize << mask.count_ones());
    let mut subset = 0u64;
    loop {
        subsets.push(subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
    subsets
}

fn build_entry(
    square: usize,
    mask: u64,
    scan: impl Fn(usize, u64) -> u64,
    rng: &mut StdRng,
) -> Result<MagicEntry, String> {
    let bits = mask.count_ones();
    let shift = 64 - bits;
    let blockers = subsets_of(mask);
    let attacks: Vec<u64> = blockers.iter().map(|&b| scan(square, b)).collect();
    let magic = find_magic_number_for_square(&blockers, &attacks, shift, rng)?;

    let mut table = vec![0u64; 1usize << bits];
    for (b, a) in blockers.iter().zip(attacks.iter()) {
        let index = ((b.wrapping_mul(magic)) >> shift) as usize;
        table[index] = *a;
    }

    Ok(MagicEntry {
        magic,
        shift,
        mask,
        table: table.into_boxed_slice(),
    })
}

pub fn generate_magic_tables(seed: MagicTableSeed) -> Result<MagicTables, String> {
    let mut rng = rng_from_seed(seed);

    let mut rook_entries = Vec::with_capacity(64);
    let mut bishop_entries = Vec::with_capacity(64);

    for square in 0..64 {
        rook_entries.push(build_entry(
            square,
            rook_relevant_mask(square),
            rook_attacks_per_square,
            &mut rng,
        )?);
        bishop_entries.push(build_entry(
            square,
            bishop_relevant_mask(square),
            bishop_attacks_per_square,
            &mut rng,
        )?);
    }

    Ok(MagicTables {
        rook: RookMagicTables {
            entries: rook_entries,
        },
        bishop: BishopMagicTables {
            entries: bishop_entries,
        },
    })
}
