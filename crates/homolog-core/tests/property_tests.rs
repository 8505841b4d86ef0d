//! Property tests for scoring, ranking and label encoding.

use proptest::prelude::*;

use homolog_core::encoder::LabelMap;
use homolog_core::model::train;
use homolog_core::models::{MedicationRecord, RegistrationStatus};
use homolog_core::recommender::RecommendationService;
use homolog_core::scorer::{SimilarityScorer, SimilarityWeights};

const ATCS: &[&str] = &["N02BE01", "M01AE01", "J01CA04"];
const VIAS: &[&str] = &["Oral", "Topica"];
const PRINCIPIOS: &[&str] = &["Acetaminofen", "Ibuprofeno", "Acetaminofen Cafeina", "Amoxicilina"];
const FORMAS: &[&str] = &["Tableta", "Jarabe", "Capsula"];

fn medication() -> impl Strategy<Value = (usize, usize, usize, usize, Option<f64>, bool)> {
    (
        0..ATCS.len(),
        0..VIAS.len(),
        0..PRINCIPIOS.len(),
        0..FORMAS.len(),
        proptest::option::of(0.0f64..1000.0),
        any::<bool>(),
    )
}

fn table() -> impl Strategy<Value = Vec<MedicationRecord>> {
    prop::collection::vec(medication(), 1..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (atc, via, principio, forma, cantidad, valid))| {
                let status = if valid {
                    RegistrationStatus::vigente()
                } else {
                    RegistrationStatus::vencido()
                };
                let mut r = MedicationRecord::new(format!("{}-1", i), format!("Producto {}", i), status);
                r.atc = ATCS[atc].to_string();
                r.via_administracion = VIAS[via].to_string();
                r.principio_activo = PRINCIPIOS[principio].to_string();
                r.forma_farmaceutica = FORMAS[forma].to_string();
                r.cantidad = cantidad;
                r
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn score_stays_within_bounds(records in table()) {
        let scorer = SimilarityScorer::default();
        let max = scorer.weights().max_score();
        for a in &records {
            for b in &records {
                let (score, breakdown) = scorer.score(a, b);
                prop_assert!(score >= 0.0);
                prop_assert!(score <= max + 1e-9);
                prop_assert!((score - breakdown.total()).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn results_are_valid_ranked_and_exclude_origin(records in table(), pick in any::<prop::sample::Index>()) {
        let origin = pick.get(&records).cum.clone();
        let model = train(records, SimilarityWeights::default()).unwrap();
        let service = RecommendationService::new(&model);
        let origin_record = model.get(&origin).unwrap();

        let result = service.recommend(&origin, 100, 0.0);
        for m in &result.recomendaciones {
            prop_assert!(m.medication.cum != origin);
            prop_assert!(m.medication.is_valid());
            prop_assert_eq!(m.medication.combo(), origin_record.combo());
        }
        for pair in result.recomendaciones.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn raising_threshold_only_removes_matches(
        records in table(),
        pick in any::<prop::sample::Index>(),
        low in 0.0f64..1.15,
        delta in 0.0f64..0.5,
    ) {
        let origin = pick.get(&records).cum.clone();
        let model = train(records, SimilarityWeights::default()).unwrap();
        let service = RecommendationService::new(&model);

        let loose = service.recommend(&origin, 100, low);
        let strict = service.recommend(&origin, 100, low + delta);

        prop_assert!(strict.recomendaciones.len() <= loose.recomendaciones.len());
        prop_assert_eq!(
            &strict.recomendaciones[..],
            &loose.recomendaciones[..strict.recomendaciones.len()]
        );
    }

    #[test]
    fn smaller_n_is_a_prefix(records in table(), pick in any::<prop::sample::Index>(), n in 0usize..10) {
        let origin = pick.get(&records).cum.clone();
        let model = train(records, SimilarityWeights::default()).unwrap();
        let service = RecommendationService::new(&model);

        let all = service.recommend(&origin, 100, 0.0);
        let top = service.recommend(&origin, n, 0.0);

        prop_assert!(top.recomendaciones.len() <= n);
        prop_assert_eq!(&top.recomendaciones[..], &all.recomendaciones[..top.recomendaciones.len()]);
        prop_assert_eq!(top.candidates_evaluated, all.candidates_evaluated);
    }

    #[test]
    fn label_map_is_a_bijection(values in prop::collection::vec("[a-zA-Z ]{0,8}", 0..30)) {
        let map = LabelMap::fit(values.iter().map(String::as_str));

        for value in values.iter().filter(|v| !v.is_empty()) {
            let label = map.encode(value).unwrap();
            prop_assert_eq!(map.decode(label), Some(value.as_str()));
        }
        for label in 0..map.len() as u32 {
            let value = map.decode(label).unwrap();
            prop_assert_eq!(map.encode(value), Some(label));
        }
        prop_assert_eq!(map.encode(""), None);
    }
}
