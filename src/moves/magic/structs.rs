use serde::{Deserialize, Serialize};

/// A single magic bitboard entry used to compute sliding piece attacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicEntry {
    /// The magic number used to hash blocker bitboards into attack indices.
    pub magic: u64,

    /// The number of bits to shift after multiplication to get the table index.
    pub shift: u32,

    /// The precomputed vision mask for this square.
    pub mask: u64,

    /// The precomputed attack table indexed by (blockers * magic) >> shift.
    pub table: Box<[u64]>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RookMagicTables {
    pub entries: Vec<MagicEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BishopMagicTables {
    pub entries: Vec<MagicEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MagicTables {
    pub rook: RookMagicTables,
    pub bishop: BishopMagicTables,
}

impl RookMagicTables {
    /// Returns the rook attack bitboard for a given square and blockers.
    #[inline(always)]
    pub fn get_attacks(&self, square: usize, blockers: u64) -> u64 {
        let entry = &self.entries[square];
        let masked = blockers & entry.mask;
        let index = ((masked.wrapping_mul(entry.magic)) >> entry.shift) as usize;
        entry.table[index]
    }

    /// Legacy interface: Returns the rook attack bitboard with explicit mask parameter.
    /// The mask parameter is ignored since mask is now stored in the entry.
    #[inline(always)]
    #[deprecated(note = "Use get_attacks(square, blockers) instead")]
    pub fn get_attacks_with_mask(&self, square: usize, blockers: u64, _mask: u64) -> u64 {
        self.get_attacks(square, blockers)
    }
}

impl BishopMagicTables {
    /// Returns the bishop attack bitboard for a given square and blockers.
    #[inline(always)]
    pub fn get_attacks(&self, square: usize, blockers: u64) -> u64 {
        let entry = &self.entries[square];
        let masked = blockers & entry.mask;
        let index = ((masked.wrapping_mul(entry.magic)) >> entry.shift) as usize;
        entry.table[index]
    }

    /// Legacy interface: Returns the bishop attack bitboard with explicit mask parameter.
    /// The mask parameter is ignored since mask is now stored in the entry.
    #[inline(always)]
    #[deprecated(note = "Use get_attacks(square, blockers) instead")]
    pub fn get_attacks_with_mask(&self, square: usize, blockers: u64, _mask: u64) -> u64 {
        self.get_attacks(square, blockers)
    }
}

impl MagicTables {
    /// Returns queen attacks by combining rook and bishop magic lookups.
    #[inline(always)]
    pub fn queen_attacks(&self, square: usize, blockers: u64) -> u64 {
        let rook = self.rook.get_attacks(square, blockers);
        let bishop = self.bishop.get_attacks(square, blockers);
        rook | bishop
    }
}
