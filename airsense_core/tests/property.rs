use airsense_core::{
    AirQualityStatus, CalibrationState, Classifier, Concentrations, DisplayPresenter, GasCurve,
    GasTable, LineSpec, PageLayout, PageState, Reading, ResistanceModel, ScoreRule, estimate,
};
use chrono::Utc;
use proptest::prelude::*;

const GASES: [&str; 4] = ["CO2", "CO", "NH3", "Alcohol"];

fn classifier(scores: [u32; 4], thresholds: [f64; 4], alert: u32, danger: u32) -> Classifier {
    let rules = GASES
        .iter()
        .zip(scores)
        .zip(thresholds)
        .map(|((g, score), threshold_ppm)| ScoreRule {
            gas: (*g).to_string(),
            threshold_ppm,
            score,
        })
        .collect();
    Classifier::unchecked(rules, alert, alert.saturating_add(danger))
}

fn levels(ppm: [f64; 4]) -> Concentrations {
    GASES.iter().copied().zip(ppm).collect()
}

proptest! {
    #[test]
    fn resistance_never_negative(
        adc in 0u16..=4095,
        vs in 0.5f64..12.0,
        rl in 0.1f64..100.0,
    ) {
        let m = ResistanceModel { supply_voltage: vs, load_resistance: rl, ..ResistanceModel::default() };
        let r = m.resistance(adc);
        prop_assert!(r >= 0.0 && r.is_finite());
    }

    #[test]
    fn estimate_is_non_negative_and_pure(
        rs in -10.0f64..1000.0,
        ro in 0.01f64..100.0,
        a in 0.1f64..1000.0,
        b in -5.0f64..0.0,
    ) {
        let cal = CalibrationState::from_baseline(ro).unwrap();
        let curve = GasCurve::new("X", a, b);
        let v = estimate(rs, &curve, &cal);
        prop_assert!(v >= 0.0);
        if rs <= 0.0 {
            prop_assert_eq!(v, 0.0);
        }
        prop_assert_eq!(v.to_bits(), estimate(rs, &curve, &cal).to_bits());
    }

    #[test]
    fn classifier_is_monotone_per_gas(
        scores in prop::array::uniform4(0u32..60),
        thresholds in prop::array::uniform4(0.0f64..2000.0),
        base in prop::array::uniform4(0.0f64..3000.0),
        gas in 0usize..4,
        bump in 0.0f64..3000.0,
        alert in 0u32..100,
        danger in 0u32..100,
    ) {
        let c = classifier(scores, thresholds, alert, danger);
        let mut raised = base;
        raised[gas] += bump;
        prop_assert!(c.classify(&levels(raised)) >= c.classify(&levels(base)));
    }

    #[test]
    fn rules_for_absent_gases_change_nothing(
        ppm in prop::array::uniform4(0.0f64..3000.0),
        extra_score in 0u32..100,
    ) {
        let base = classifier([30, 40, 40, 20], [1000.0, 10.0, 10.0, 100.0], 40, 40);
        let mut rules: Vec<ScoreRule> = GASES
            .iter()
            .zip([30u32, 40, 40, 20])
            .zip([1000.0, 10.0, 10.0, 100.0])
            .map(|((g, score), threshold_ppm)| ScoreRule { gas: (*g).to_string(), threshold_ppm, score })
            .collect();
        rules.push(ScoreRule { gas: "Radon".into(), threshold_ppm: 0.0, score: extra_score });
        let extended = Classifier::unchecked(rules, 40, 80);
        prop_assert_eq!(base.classify(&levels(ppm)), extended.classify(&levels(ppm)));
    }

    #[test]
    fn page_sequence_has_period_n(n in 1usize..6, start in 0usize..6) {
        let mut p = PageState::new(n);
        for _ in 0..start {
            p = p.next();
        }
        let first: Vec<usize> = (0..n).scan(p, |s, _| { let i = s.index(); *s = s.next(); Some(i) }).collect();
        let mut q = p;
        for _ in 0..n {
            q = q.next();
        }
        prop_assert_eq!(q, p);
        let second: Vec<usize> = (0..n).scan(q, |s, _| { let i = s.index(); *s = s.next(); Some(i) }).collect();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn presenter_cycles_through_every_page() {
    let gases = GasTable::new(vec![GasCurve::new("CO2", 110.47, -2.862)]).unwrap();
    let pages = (0..3)
        .map(|_| PageLayout {
            lines: vec![LineSpec::parse("P{page}/{pages}", 0, 0, &gases).unwrap()],
        })
        .collect();
    let pres = DisplayPresenter::new(pages, 16).unwrap();
    let reading = Reading {
        timestamp: Utc::now(),
        temperature_c: None,
        humidity_pct: None,
        adc: 0,
        resistance: 0.0,
        concentrations: Concentrations::default(),
        status: AirQualityStatus::Good,
    };
    let mut page = pres.initial_page();
    let mut seen = Vec::new();
    for _ in 0..6 {
        let (lines, next) = pres.render(&reading, page);
        seen.push(lines[0].text.clone());
        page = next;
    }
    assert_eq!(seen, ["P1/3", "P2/3", "P3/3", "P1/3", "P2/3", "P3/3"]);
}
