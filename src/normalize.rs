use tracing::trace;

/// Rescale a nullable sequence into `[out_min, out_max]` using the observed
/// minimum and maximum of its finite values. `None` entries pass through
/// untouched and non-finite entries become `None`. A sequence with no usable
/// values comes back all `None`.
pub fn normalize(series: &[Option<f64>], out_min: f64, out_max: f64) -> Vec<Option<f64>> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in series.iter().flatten() {
        if v.is_finite() {
            lo = lo.min(*v);
            hi = hi.max(*v);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        trace!("normalize saw no finite values, emitting all-null sequence");
        return vec![None; series.len()];
    }
    rescale(series, lo, hi, out_min, out_max)
}

/// Rescale against a fixed input domain rather than the observed extent.
/// Used for bounded indicators (RSI lives on 0..100 by construction) so a
/// constant series still lands where its absolute level says it should.
/// A degenerate input domain maps every value to the output midpoint.
pub fn rescale(
    series: &[Option<f64>],
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
) -> Vec<Option<f64>> {
    let span = in_max - in_min;
    series
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => {
                if span == 0.0 {
                    Some((out_min + out_max) / 2.0)
                } else {
                    Some((x - in_min) / span * (out_max - out_min) + out_min)
                }
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn normalize_maps_observed_extremes_to_output_bounds() {
        let out = normalize(&[Some(1.0), Some(2.0), Some(3.0)], -1.0, 1.0);
        assert!(close(out[0].unwrap(), -1.0));
        assert!(close(out[1].unwrap(), 0.0));
        assert!(close(out[2].unwrap(), 1.0));
    }

    #[test]
    fn normalize_preserves_nulls_in_place() {
        let out = normalize(&[None, Some(0.0), None, Some(10.0)], -1.0, 1.0);
        assert_eq!(out[0], None);
        assert_eq!(out[2], None);
        assert!(close(out[1].unwrap(), -1.0));
        assert!(close(out[3].unwrap(), 1.0));
    }

    #[test]
    fn degenerate_extent_collapses_to_midpoint() {
        let out = normalize(&[Some(5.0), Some(5.0)], -1.0, 1.0);
        assert!(close(out[0].unwrap(), 0.0));
        assert!(close(out[1].unwrap(), 0.0));
    }

    #[test]
    fn normalize_is_idempotent_once_scaled() {
        let first = normalize(&[Some(2.0), None, Some(4.0), Some(8.0)], -1.0, 1.0);
        let second = normalize(&first, -1.0, 1.0);
        for (a, b) in first.iter().zip(second.iter()) {
            match (a, b) {
                (Some(x), Some(y)) => assert!(close(*x, *y)),
                (None, None) => {}
                _ => panic!("null placement changed across passes"),
            }
        }
    }

    #[test]
    fn normalize_with_no_finite_values_yields_all_nulls() {
        let out = normalize(&[None, Some(f64::NAN), None], -1.0, 1.0);
        assert_eq!(out, vec![None, None, None]);
    }

    #[test]
    fn fixed_domain_rescale_keeps_absolute_position() {
        // A constant 100 on the 0..100 scale sits at the top of the output
        // band, not at the midpoint an observed-extent pass would give.
        let out = rescale(&[Some(100.0), Some(100.0)], 0.0, 100.0, -1.0, 1.0);
        assert!(close(out[0].unwrap(), 1.0));
        assert!(close(out[1].unwrap(), 1.0));

        let mid = rescale(&[Some(50.0)], 0.0, 100.0, -1.0, 1.0);
        assert!(close(mid[0].unwrap(), 0.0));
    }
}
