//! Merkle tree construction over transaction ids
//!
//! Iterated pairwise SHA-256; an odd layer duplicates its last element
//! before pairing.

use super::hash::sha256;

/// Calculate the merkle root from a list of hex-encoded transaction ids.
///
/// An empty list hashes to `sha256("")`. A single id is its own root.
pub fn merkle_root_hex(ids: &[String]) -> String {
    let hashes: Vec<Vec<u8>> = ids
        .iter()
        .filter_map(|id| hex::decode(id).ok())
        .collect();
    hex::encode(merkle_root(&hashes))
}

/// Calculate the merkle root from raw 32-byte hashes
pub fn merkle_root(hashes: &[Vec<u8>]) -> Vec<u8> {
    if hashes.is_empty() {
        return sha256(b"");
    }

    let mut level: Vec<Vec<u8>> = hashes.to_vec();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));

        for pair in level.chunks(2) {
            let mut data = pair[0].clone();
            // Odd layer: last element pairs with itself
            data.extend_from_slice(if pair.len() == 2 { &pair[1] } else { &pair[0] });
            next.push(sha256(&data));
        }

        level = next;
    }

    level.remove(0)
}
