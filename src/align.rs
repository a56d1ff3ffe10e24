use crate::error::{AppError, Result};

/// Front-pad a computed sequence with `None` until it spans `target_len`
/// slots. Padding goes at the front because indicator warm-up consumes the
/// oldest part of the series; the surviving values keep their order and
/// stay aligned with the newest source points.
pub fn pad_front(values: Vec<f64>, target_len: usize) -> Result<Vec<Option<f64>>> {
    if values.len() > target_len {
        return Err(AppError::Alignment(format!(
            "cannot pad {} values into {} slots",
            values.len(),
            target_len
        )));
    }
    let mut out: Vec<Option<f64>> = vec![None; target_len - values.len()];
    out.extend(values.into_iter().map(Some));
    Ok(out)
}

/// Replace NaN and infinite entries with `None`. Runs on every sequence
/// before it is published so renderers never see a non-finite number.
pub fn scrub(series: Vec<Option<f64>>) -> Vec<Option<f64>> {
    series
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_front_prepends_nulls_and_preserves_order() {
        let padded = pad_front(vec![1.0, 2.0], 5).unwrap();
        assert_eq!(padded, vec![None, None, None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn pad_front_with_exact_length_is_identity() {
        let padded = pad_front(vec![3.0, 4.0], 2).unwrap();
        assert_eq!(padded, vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn pad_front_rejects_target_shorter_than_input() {
        let err = pad_front(vec![1.0, 2.0, 3.0], 2).unwrap_err();
        assert!(matches!(err, AppError::Alignment(_)));
    }

    #[test]
    fn pad_front_of_empty_input_is_all_nulls() {
        let padded = pad_front(Vec::new(), 3).unwrap();
        assert_eq!(padded, vec![None, None, None]);
    }

    #[test]
    fn scrub_nulls_out_non_finite_values() {
        let cleaned = scrub(vec![
            Some(1.0),
            Some(f64::NAN),
            None,
            Some(f64::INFINITY),
            Some(f64::NEG_INFINITY),
            Some(-2.5),
        ]);
        assert_eq!(cleaned, vec![Some(1.0), None, None, None, None, Some(-2.5)]);
    }
}
