//! Maven version comparison and pre-release detection.
//!
//! Versions split on `.` and `-` into atoms. Numeric atoms compare as
//! integers and outrank string atoms in the same slot; string atoms
//! compare by qualifier rank (`alpha < beta < milestone < rc < snapshot <
//! ga < sp`), with unknown qualifiers ranking as ga and equal ranks
//! falling back to lexical order. The result is a total order.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    Num(u64),
    Str(String),
}

/// Detects if a Maven version string is a pre-release.
///
/// Maven pre-release qualifiers: SNAPSHOT, alpha, beta, rc/cr, M (milestone).
pub fn is_prerelease(version: &str) -> bool {
    split_version(version).iter().any(|atom| match atom {
        Atom::Str(s) => qualifier_rank(s) < RANK_GA,
        Atom::Num(_) => false,
    })
}

pub fn is_snapshot(version: &str) -> bool {
    version.to_uppercase().ends_with("-SNAPSHOT")
}

/// Compares two Maven version strings. Total order; ties are `Equal`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_atoms = split_version(a);
    let b_atoms = split_version(b);

    let max_len = a_atoms.len().max(b_atoms.len());
    for i in 0..max_len {
        let ord = match (a_atoms.get(i), b_atoms.get(i)) {
            (Some(ap), Some(bp)) => compare_atoms(ap, bp),
            // A missing slot counts as zero against numbers and as a
            // ga/release qualifier against strings, so 1.2 == 1.2.0 and
            // 1.2 > 1.2-rc1.
            (Some(Atom::Num(n)), None) => n.cmp(&0),
            (None, Some(Atom::Num(n))) => 0.cmp(n),
            (Some(Atom::Str(s)), None) => compare_qualifiers(s, ""),
            (None, Some(Atom::Str(s))) => compare_qualifiers("", s),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn split_version(v: &str) -> Vec<Atom> {
    v.split(['.', '-'])
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u64>() {
            Ok(n) => Atom::Num(n),
            Err(_) => Atom::Str(s.to_string()),
        })
        .collect()
}

fn compare_atoms(a: &Atom, b: &Atom) -> Ordering {
    match (a, b) {
        (Atom::Num(an), Atom::Num(bn)) => an.cmp(bn),
        // A number in a slot always beats a qualifier string.
        (Atom::Num(_), Atom::Str(_)) => Ordering::Greater,
        (Atom::Str(_), Atom::Num(_)) => Ordering::Less,
        (Atom::Str(astr), Atom::Str(bstr)) => compare_qualifiers(astr, bstr),
    }
}

const RANK_GA: u8 = 6;

fn qualifier_rank(s: &str) -> u8 {
    match s.to_lowercase().as_str() {
        "alpha" => 1,
        "beta" => 2,
        "milestone" | "m" => 3,
        "rc" | "cr" => 4,
        "snapshot" => 5,
        "" | "ga" | "final" | "release" => RANK_GA,
        "sp" => 7,
        _ => {
            // Mixed qualifiers like "rc1" or "m2" carry their rank prefix.
            if let Some(rank) = embedded_rank(s) {
                rank
            } else {
                RANK_GA
            }
        }
    }
}

fn embedded_rank(s: &str) -> Option<u8> {
    let lower = s.to_lowercase();
    let trimmed = lower.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == lower.len() || trimmed.is_empty() {
        return None;
    }
    match trimmed {
        "alpha" | "a" => Some(1),
        "beta" | "b" => Some(2),
        "milestone" | "m" => Some(3),
        "rc" | "cr" => Some(4),
        _ => None,
    }
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    let (ar, br) = (qualifier_rank(a), qualifier_rank(b));
    ar.cmp(&br)
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}
