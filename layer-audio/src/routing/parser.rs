//! Routing configuration parsing
//!
//! Best-effort by design: malformed segments and out-of-range channel
//! references are dropped, never fatal. The parser has to stay robust
//! against configurations generated for a different pool size than the
//! one currently rendering, so its channel bound is exclusive where the
//! generator's draw bound is inclusive.

use tracing::debug;

use super::{GainMatrix, Tap};

/// Parse a routing configuration into a gain matrix
///
/// Every bus starts as a unity passthrough of input channel 0; only
/// segments that survive validation replace their row.
pub fn parse_routing(config: &str, output_channels: usize, total_inputs: usize) -> GainMatrix {
    let mut matrix = GainMatrix::passthrough(output_channels);

    // The first '|' segment is the surround-layout tag
    for segment in config.split('|').skip(1) {
        let Some((left, right)) = segment.split_once('=') else {
            debug!("skipping routing segment without '=': {:?}", segment);
            continue;
        };

        let Some(bus) = parse_bus(left) else {
            debug!("skipping routing segment with unparsable bus: {:?}", left);
            continue;
        };
        if bus >= output_channels {
            debug!("skipping routing segment for bus {} outside the layout", bus);
            continue;
        }

        let taps = parse_expression(right, total_inputs);
        if !taps.is_empty() {
            matrix.set_row(bus, taps);
        }
    }

    matrix
}

/// Parse the `c<digits>` left-hand side of a segment
fn parse_bus(left: &str) -> Option<usize> {
    left.strip_prefix('c')?.parse().ok()
}

/// Extract signed `[+-]?c<digits>` terms, dropping out-of-range channels
///
/// Scans like a global regex match: characters that fit no term are
/// skipped rather than failing the whole expression.
fn parse_expression(expr: &str, total_inputs: usize) -> Vec<Tap> {
    let bytes = expr.as_bytes();
    let mut taps = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let mut gain = 1.0f32;

        match bytes[i] {
            b'+' => i += 1,
            b'-' => {
                gain = -1.0;
                i += 1;
            }
            _ => {}
        }

        if i < bytes.len() && bytes[i] == b'c' {
            i += 1;
            let digits = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > digits {
                if let Ok(channel) = expr[digits..i].parse::<usize>() {
                    if channel < total_inputs {
                        taps.push(Tap { channel, gain });
                    } else {
                        debug!(
                            "dropping out-of-range term c{} (pool has {} channels)",
                            channel, total_inputs
                        );
                    }
                }
                continue;
            }
        }

        // No term started here; resync one character past where we began
        i = start + 1;
    }

    taps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap(channel: usize, gain: f32) -> Tap {
        Tap { channel, gain }
    }

    #[test]
    fn test_unmentioned_buses_keep_default_passthrough() {
        let matrix = parse_routing("stereo|c0=c0", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(0, 1.0)]);
        assert_eq!(matrix.taps(1), &[tap(0, 1.0)]);
    }

    #[test]
    fn test_signed_terms_in_token_order() {
        let matrix = parse_routing("stereo|c1=c3+c5-c2", 2, 8);
        assert_eq!(matrix.taps(1), &[tap(3, 1.0), tap(5, 1.0), tap(2, -1.0)]);
    }

    #[test]
    fn test_out_of_range_terms_are_dropped() {
        let matrix = parse_routing("stereo|c0=c1+c4", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(1, 1.0)]);
    }

    #[test]
    fn test_all_terms_dropped_keeps_default() {
        // c4 equals the pool size, the generator's legal off-by-one draw
        let matrix = parse_routing("stereo|c0=c4", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(0, 1.0)]);
    }

    #[test]
    fn test_malformed_segments_are_skipped() {
        let matrix = parse_routing("stereo|garbage|c0|x=c1|c0=c2", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(2, 1.0)]);
        assert_eq!(matrix.taps(1), &[tap(0, 1.0)]);
    }

    #[test]
    fn test_bus_outside_layout_is_skipped() {
        let matrix = parse_routing("mono|c3=c1", 1, 4);
        assert_eq!(matrix.bus_count(), 1);
        assert_eq!(matrix.taps(0), &[tap(0, 1.0)]);
    }

    #[test]
    fn test_stray_characters_do_not_kill_the_expression() {
        let matrix = parse_routing("stereo|c0=xc1 +c2", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(1, 1.0), tap(2, 1.0)]);
    }

    #[test]
    fn test_layout_tag_is_ignored() {
        // Even a tag that looks like a segment is discarded
        let matrix = parse_routing("c0=c3", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(0, 1.0)]);
    }

    #[test]
    fn test_empty_configuration_is_all_passthrough() {
        let matrix = parse_routing("stereo", 2, 4);
        assert_eq!(matrix.taps(0), &[tap(0, 1.0)]);
        assert_eq!(matrix.taps(1), &[tap(0, 1.0)]);
    }
}
