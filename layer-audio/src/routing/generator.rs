//! Routing table generation
//!
//! Builds a pool of candidate pan expressions, then assembles the per-bus
//! routing configuration string. Generation is pure: it validates nothing
//! against the real channel count (that is the parser's job) and draws
//! channel indices with an inclusive upper bound, so a candidate can name
//! the channel one past the pool; the parser drops such taps.

use super::SurroundLayout;
use crate::rng::RandomSource;

/// Candidate expressions generated per unit of pool size
const CANDIDATES_PER_UNIT: usize = 64;
/// Bus assignment draws only from this leading slice of the table
const PICK_WINDOW_PER_UNIT: usize = 4;

/// Generate a routing configuration string
///
/// `pool_size` controls table density, `complexity` caps the number of
/// terms per expression, `total_inputs` is the channel pool size the
/// expressions refer to.
pub fn generate_routing(
    layout: SurroundLayout,
    pool_size: usize,
    complexity: usize,
    total_inputs: usize,
    rng: &mut dyn RandomSource,
) -> String {
    let count = pool_size * CANDIDATES_PER_UNIT;
    let candidates: Vec<String> = (0..count)
        .map(|_| build_expression(complexity, total_inputs, rng))
        .collect();

    let window = (pool_size * PICK_WINDOW_PER_UNIT).max(1);
    let mut config = layout.tag().to_string();
    for bus in 0..layout.channel_count() {
        let pick = rng.rand_int(0, window as i64 - 1) as usize;
        let expr = candidates.get(pick).map_or("c0", String::as_str);
        config.push_str(&format!("|c{}={}", bus, expr));
    }
    config
}

/// Assemble one candidate pan expression
///
/// Accepted draws prepend a `c<idx><sign>` chunk, so the chronologically
/// first draw ends up right-most and is the only term without a sign
/// character. A draw matching any earlier draw of the same candidate is
/// skipped, whether that earlier draw was accepted or not.
fn build_expression(
    complexity: usize,
    total_inputs: usize,
    rng: &mut dyn RandomSource,
) -> String {
    let mut expr = String::new();
    let mut used: Vec<i64> = Vec::with_capacity(complexity);

    for term in 0..complexity {
        let sign = if term == 0 {
            ""
        } else if rng.rand_int(0, 1) == 1 {
            "+"
        } else {
            "-"
        };

        // Inclusive upper bound: drawing `total_inputs` itself is legal
        // here and gets discarded later by the parser.
        let index = rng.rand_int(0, total_inputs as i64);

        if !used.contains(&index) {
            expr = format!("c{}{}{}", index, sign, expr);
        }
        used.push(index);
    }

    if expr.is_empty() {
        expr.push_str("c0");
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::XorShift64;
    use crate::routing::parse_routing;

    #[test]
    fn test_same_seed_same_configuration() {
        let mut a = XorShift64::new(99);
        let mut b = XorShift64::new(99);
        let first = generate_routing(SurroundLayout::Stereo, 8, 3, 6, &mut a);
        let second = generate_routing(SurroundLayout::Stereo, 8, 3, 6, &mut b);
        assert_eq!(first, second);
    }

    #[test]
    fn test_configuration_shape() {
        let mut rng = XorShift64::new(5);
        let config = generate_routing(SurroundLayout::FiveOne, 4, 2, 10, &mut rng);

        let segments: Vec<&str> = config.split('|').collect();
        assert_eq!(segments[0], "5.1");
        assert_eq!(segments.len(), 7);
        for (bus, segment) in segments[1..].iter().enumerate() {
            let prefix = format!("c{}=", bus);
            assert!(
                segment.starts_with(&prefix),
                "segment {:?} does not start with {:?}",
                segment,
                prefix
            );
        }
    }

    #[test]
    fn test_zero_complexity_defaults_to_c0() {
        let mut rng = XorShift64::new(17);
        let config = generate_routing(SurroundLayout::Stereo, 2, 0, 4, &mut rng);
        for segment in config.split('|').skip(1) {
            let (_, expr) = segment.split_once('=').unwrap();
            assert_eq!(expr, "c0");
        }
    }

    #[test]
    fn test_rightmost_term_carries_no_sign() {
        let mut rng = XorShift64::new(2024);
        let config = generate_routing(SurroundLayout::Hexadecagonal, 16, 5, 12, &mut rng);

        for segment in config.split('|').skip(1) {
            let (_, expr) = segment.split_once('=').unwrap();
            // Signs only ever separate terms; expressions never start or
            // end with one.
            assert!(!expr.starts_with(['+', '-']));
            assert!(!expr.ends_with(['+', '-']));
            let last = expr.rsplit(['+', '-']).next().unwrap();
            assert!(last.starts_with('c'));
        }
    }

    #[test]
    fn test_terms_are_unique_within_expression() {
        let mut rng = XorShift64::new(31);
        let config = generate_routing(SurroundLayout::TwentyTwoTwo, 8, 6, 5, &mut rng);

        for segment in config.split('|').skip(1) {
            let (_, expr) = segment.split_once('=').unwrap();
            let mut indices: Vec<&str> = expr
                .split(['+', '-'])
                .map(|term| term.trim_start_matches('c'))
                .collect();
            let total = indices.len();
            indices.sort_unstable();
            indices.dedup();
            assert_eq!(indices.len(), total, "duplicate term in {:?}", expr);
        }
    }

    #[test]
    fn test_round_trip_never_yields_out_of_range_taps() {
        for seed in 0..20 {
            let mut rng = XorShift64::new(seed + 1);
            let total_inputs = 7;
            let layout = SurroundLayout::SevenOne;
            let config = generate_routing(layout, 6, 4, total_inputs, &mut rng);

            let matrix = parse_routing(&config, layout.channel_count(), total_inputs);
            for bus in 0..matrix.bus_count() {
                for tap in matrix.taps(bus) {
                    assert!(tap.channel < total_inputs);
                }
            }
        }
    }
}
