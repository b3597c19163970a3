use crate::prelude::*;

fn engine(points: &[(&str, Real, Real)]) -> Engine
{
    Engine::new(points.iter().map(|&(name, x, y)| (name, x, y)))
}

fn pred(engine: &Engine, text: &str) -> Pred
{
    let parsed: ParsedPred = text.parse().unwrap();
    engine.resolve_parsed(&parsed).unwrap()
}

fn force(engine: &mut Engine, text: &str)
{
    let p = pred(engine, text);
    engine.force_pred(&p).unwrap();
}

fn check(engine: &Engine, text: &str) -> Verdict
{
    engine.check_pred(&pred(engine, text))
}

fn isosceles() -> Engine
{
    let mut engine = engine(&[
        ("A", 200., 50.),
        ("B", 100., 200.),
        ("C", 300., 200.),
        ("M", 200., 200.),
    ]);
    force(&mut engine, "cong A B A C");
    force(&mut engine, "coll B M C");
    force(&mut engine, "cong B M M C");
    engine
}

#[test]
fn isosceles_base_angles()
{
    let mut engine = isosceles();
    engine.deduction_closure(false, false);
    assert!(check(&engine, "eqangle A B B C A C C B").is_entailed());
}

#[test]
fn closure_is_idempotent()
{
    let mut engine = isosceles();
    assert!(engine.deduction_closure(false, false));
    assert!(!engine.deduction_closure(false, false));
    assert!(check(&engine, "eqangle A B B C A C C B").is_entailed());
}

#[test]
fn closure_is_order_independent()
{
    let mut one = isosceles();

    let mut other = engine(&[
        ("A", 200., 50.),
        ("B", 100., 200.),
        ("C", 300., 200.),
        ("M", 200., 200.),
    ]);
    force(&mut other, "cong B M M C");
    force(&mut other, "cong A B A C");
    force(&mut other, "coll B M C");

    one.deduction_closure(false, false);
    other.deduction_closure(false, false);

    for query in [
        "eqangle A B B C A C C B",
        "cong A B A C",
        "coll B M C",
        "para A B B C",
    ] {
        assert_eq!(check(&one, query), check(&other, query), "{query}");
    }
}

#[test]
fn alternate_angles_give_parallels()
{
    let mut engine = engine(&[
        ("A", 0., 0.),
        ("B", 10., 0.),
        ("C", 2., 5.),
        ("D", 12., 5.),
    ]);
    assert_eq!(check(&engine, "para A B C D"), Verdict::Unknown);
    force(&mut engine, "eqangle A B B D B D D C");
    engine.deduction_closure(false, false);
    assert!(check(&engine, "para A B C D").is_entailed());
}

#[test]
fn inscribed_angles()
{
    let mut engine = engine(&[
        ("A", 0., 1.),
        ("B", 1., 0.),
        ("C", 0., -1.),
        ("D", -1., 0.),
        ("O", 0., 0.),
    ]);
    force(&mut engine, "cyclic A B C D");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "eqangle A B B C A D D C").is_entailed());
    assert_eq!(check(&engine, "cong O A O B"), Verdict::Unknown);

    force(&mut engine, "cyclic_with_centers 1 O A B C D");
    engine.deduction_closure(false, false);
    assert!(check(&engine, "cong O A O B").is_entailed());
    // Nothing previously derivable was lost.
    assert!(check(&engine, "eqangle A B B C A D D C").is_entailed());
}

#[test]
fn overlap_merges_points()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 1., 0.), ("B2", 1., 0.)]);
    force(&mut engine, "overlap B B2");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "cong A B A B2").is_entailed());
    assert!(check(&engine, "coll A B B2").is_entailed());
    assert!(check(&engine, "overlap B B2").is_entailed());
    assert_eq!(engine.live_points().len(), 2);
}

#[test]
fn merged_points_are_transparent_to_queries()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 1., 0.), ("B2", 1., 0.), ("C", 0., 1.)]);
    force(&mut engine, "overlap B B2");
    force(&mut engine, "cong A B2 A C");
    // The same fact through either name.
    assert!(check(&engine, "cong A B A C").is_entailed());
    assert!(check(&engine, "cong A B2 A C").is_entailed());
}

#[test]
fn constant_angle_is_computed()
{
    let mut engine = engine(&[
        ("A", 0., 0.),
        ("B", 8.660_254_037_844_387, 5.),
        ("C", 0., 5.),
        ("D", 10., 5.),
    ]);
    assert_eq!(check(&engine, "acompute A B C D"), Verdict::Unknown);
    force(&mut engine, "aconst A B C D 30");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "aconst A B C D 30").is_entailed());
    assert_eq!(
        check(&engine, "acompute A B C D"),
        Verdict::Angle(Rational::new(1, 6))
    );
}

#[test]
fn similar_triangles_transfer_ratios()
{
    let mut engine = engine(&[
        ("A", 0., 0.),
        ("B", 4., 0.),
        ("C", 1., 3.),
        ("X", 10., 0.),
        ("Y", 18., 0.),
        ("Z", 12., 6.),
    ]);
    force(&mut engine, "eqratio A B A C X Y X Z");
    force(&mut engine, "eqangle A B A C X Y X Z");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "eqratio B C Y Z A B X Y").is_entailed());
    assert!(check(&engine, "eqratio C B C A Z Y Z X").is_entailed());
    assert!(check(&engine, "eqangle B C B A Y Z Y X").is_entailed());
}

#[test]
fn perpendicular_is_directed_both_ways()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 1., 0.), ("C", 3., 1.), ("D", 3., 5.)]);
    force(&mut engine, "perp A B C D");
    assert!(check(&engine, "perp A B C D").is_entailed());
    assert!(check(&engine, "perp C D A B").is_entailed());
    assert_eq!(check(&engine, "para A B C D"), Verdict::Unknown);
}

#[test]
fn collinear_points_share_one_line()
{
    let mut engine = engine(&[
        ("A", 0., 0.),
        ("B", 1., 0.),
        ("C", 2., 0.),
        ("D", 3., 0.),
        ("E", 0., 5.),
    ]);
    force(&mut engine, "coll A B C");
    force(&mut engine, "coll B C D");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "coll A B D").is_entailed());
    assert!(check(&engine, "coll A C D").is_entailed());

    let ids: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|name| engine.point_named(name).unwrap())
        .collect();
    let mut line_ids = std::collections::BTreeSet::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            line_ids.insert(engine.pair_to_line[&crate::engine::pair_key(a, b)]);
            line_ids.insert(engine.pair_to_line[&crate::engine::pair_key(b, a)]);
        }
    }
    assert_eq!(line_ids.len(), 1);

    // Lengths along the line compose additively.
    force(&mut engine, "distseq 1 1 -1 0 A B B C A C");
    assert!(check(&engine, "distseq 1 1 -1 0 A B B C A C").is_entailed());
}

#[test]
fn crossing_lines_stay_separate()
{
    let mut engine = engine(&[
        ("A", 0., 0.),
        ("B", 2., 0.),
        ("C", 4., 0.),
        ("D", 2., 2.),
        ("E", 2., 4.),
    ]);
    force(&mut engine, "coll A B C");
    // A second line through B alone: a crossing, not the same line.
    force(&mut engine, "coll B D E");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "coll A B C").is_entailed());
    assert!(check(&engine, "coll B D E").is_entailed());
    assert_eq!(check(&engine, "coll A B D"), Verdict::Unknown);
    assert_eq!(check(&engine, "coll C B E"), Verdict::Unknown);

    let a = engine.point_named("A").unwrap();
    let b = engine.point_named("B").unwrap();
    let d = engine.point_named("D").unwrap();
    assert_ne!(
        engine.pair_to_line[&crate::engine::pair_key(a, b)],
        engine.pair_to_line[&crate::engine::pair_key(b, d)]
    );
}

#[test]
fn collinearity_learns_length_sums()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 1., 0.), ("C", 3., 0.)]);
    force(&mut engine, "coll A B C");
    assert!(check(&engine, "distseq 1 1 -1 0 A B B C A C").is_entailed());
    assert_eq!(
        check(&engine, "distseq 1 -1 0 A B B C"),
        Verdict::Unknown
    );
}

#[test]
fn equidistance_forms_a_circle()
{
    let mut engine = engine(&[
        ("O", 0., 0.),
        ("P", 5., 0.),
        ("Q", 0., 5.),
        ("R", -5., 0.),
        ("S", 3., 4.),
    ]);
    force(&mut engine, "cong O P O Q");
    force(&mut engine, "cong O P O R");
    force(&mut engine, "cong O P O S");
    engine.deduction_closure(false, false);

    assert!(check(&engine, "cyclic P Q R S").is_entailed());
    assert!(check(&engine, "cyclic_with_centers 1 O P Q R S").is_entailed());
}

#[test]
fn rconst_bridges_to_lengths()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 6., 0.), ("C", 0., 2.), ("D", 3., 2.)]);
    force(&mut engine, "rconst A B C D 2");
    assert!(check(&engine, "rconst A B C D 2").is_entailed());
    assert!(check(&engine, "distmeq 1 -1 2 A B C D").is_entailed());
    engine.deduction_closure(false, false);
    // |AB| = 2 |CD| is now an additive fact as well.
    assert!(check(&engine, "distseq 1 -2 0 A B C D").is_entailed());
}

#[test]
fn false_assumptions_are_rejected()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 1., 0.), ("C", 0., 1.), ("D", 5., 3.)]);

    let cong = pred(&engine, "cong A B C D");
    assert!(matches!(
        engine.force_pred(&cong),
        Err(EngineError::NumericInconsistency(_))
    ));

    let coll = pred(&engine, "coll A B C");
    assert!(matches!(
        engine.force_pred(&coll),
        Err(EngineError::GeometricInconsistency(_))
    ));

    let overlap = pred(&engine, "overlap A B");
    assert!(matches!(
        engine.force_pred(&overlap),
        Err(EngineError::NumericInconsistency(_))
    ));

    let degenerate = pred(&engine, "coll A A");
    assert!(matches!(
        engine.force_pred(&degenerate),
        Err(EngineError::DegenerateInput(_))
    ));
}

#[test]
fn forcing_acompute_is_a_noop()
{
    let mut engine = engine(&[("A", 0., 0.), ("B", 1., 0.), ("C", 0., 1.), ("D", 1., 1.)]);
    let p = pred(&engine, "acompute A B C D");
    assert_eq!(engine.force_pred(&p), Ok(false));
}

#[test]
fn checks_are_monotone()
{
    let mut engine = isosceles();
    engine.deduction_closure(false, false);
    assert!(check(&engine, "eqangle A B B C A C C B").is_entailed());

    // More facts never revoke earlier ones.
    force(&mut engine, "perp A M B C");
    engine.deduction_closure(false, false);
    assert!(check(&engine, "eqangle A B B C A C C B").is_entailed());
    assert!(check(&engine, "perp A M B C").is_entailed());
}

#[test]
fn problem_end_to_end()
{
    let text = "A@200_50 B@100_200 C@300_200 M@200_200 = cong A B A C, coll B M C, cong B M M C \
                ? eqangle A B B C A C C B";
    let problem: Problem = text.parse().unwrap();
    let mut engine = Engine::new(problem.points.clone());
    for given in &problem.givens {
        let p = engine.resolve_parsed(given).unwrap();
        engine.force_pred(&p).unwrap();
    }
    engine.deduction_closure(false, false);
    let goal = engine.resolve_parsed(problem.goal.as_ref().unwrap()).unwrap();
    assert!(engine.check_pred(&goal).is_entailed());
}
