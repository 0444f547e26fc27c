//! Properties of the default 16-bit collision curve

use crashrun_birthday::{
    collision_probability, saturation_point, write_curve, CollisionCurve, CurveParams, CurvePoint, OutputFormat,
    DEFAULT_SPACE_SIZE, TOLERANCE,
};

fn default_curve() -> Vec<CurvePoint>
{
    CollisionCurve::new(CurveParams::default()).collect()
}

#[test]
fn test_first_point_is_zero()
{
    let curve = default_curve();
    assert_eq!(curve[0].trials, 1);
    assert_eq!(curve[0].probability, 0.0);
}

#[test]
fn test_probability_is_monotonic()
{
    let curve = default_curve();
    for pair in curve.windows(2) {
        assert!(pair[1].probability >= pair[0].probability, "dropped at k={}", pair[1].trials);
    }
}

#[test]
fn test_trials_are_contiguous()
{
    let curve = default_curve();
    for (index, point) in curve.iter().enumerate() {
        assert_eq!(point.trials, index as u64 + 1);
    }
}

#[test]
fn test_stops_right_after_first_saturated_point()
{
    let curve = default_curve();
    let last = curve.last().unwrap();
    assert_eq!(last.trials, 1904);
    assert!(last.probability + TOLERANCE > 1.0);

    let before = &curve[curve.len() - 2];
    assert!(before.probability + TOLERANCE <= 1.0);
    assert!(curve[..curve.len() - 1].iter().all(|point| !point.is_saturated(TOLERANCE)));
}

#[test]
fn test_saturation_point_matches_curve_end()
{
    let point = saturation_point(CurveParams::default()).unwrap();
    assert_eq!(point, *default_curve().last().unwrap());
}

#[test]
fn test_unsaturated_curve_has_exactly_max_trials_points()
{
    let params = CurveParams::for_bits(40).unwrap();
    let curve: Vec<CurvePoint> = CollisionCurve::new(params).collect();
    assert_eq!(curve.len(), 9999);
    assert_eq!(curve.last().unwrap().trials, 9999);
    assert!(saturation_point(params).is_none());
}

#[test]
fn test_smaller_bound_truncates_curve()
{
    let params = CurveParams::default().with_max_trials(10).unwrap();
    assert_eq!(CollisionCurve::new(params).count(), 10);
}

#[test]
fn test_five_hundred_draws()
{
    let p = collision_probability(500, DEFAULT_SPACE_SIZE);
    assert!((p - 0.851).abs() < 1e-3, "got {p}");
    assert_eq!(p, 1.0 - (-0.5 * 500.0 * 499.0 / 65536.0_f64).exp());
}

#[test]
fn test_plain_report_of_default_curve()
{
    let mut out = Vec::new();
    let records = write_curve(&mut out, CollisionCurve::default(), OutputFormat::Plain).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(records, 1904);
    assert_eq!(text.lines().count(), 1904);
    assert_eq!(text.lines().next(), Some("1 0"));

    let last = text.lines().last().unwrap();
    let (k, p) = last.split_once(' ').unwrap();
    assert_eq!(k, "1904");
    assert!(p.parse::<f64>().unwrap() + TOLERANCE > 1.0);
}

#[test]
fn test_csv_report_has_header_and_comma_fields()
{
    let params = CurveParams::default().with_max_trials(3).unwrap();
    let mut out = Vec::new();
    write_curve(&mut out, CollisionCurve::new(params), OutputFormat::Csv).unwrap();
    let text = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "trials,probability");
    assert_eq!(lines[1], "1,0");
    assert!(lines[2].starts_with("2,"));
    assert_eq!(lines.len(), 4);
}
