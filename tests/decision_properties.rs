use battery_passport::decision::score;
use battery_passport::{
    Chemistry, DecisionCriteria, Disposition, MarketDemand, recommend, try_recommend,
};

const SOH_GRID: [f64; 11] = [0.0, 20.0, 39.9, 40.0, 59.99, 60.0, 70.0, 79.9, 80.0, 95.0, 100.0];
const AGE_GRID: [u32; 8] = [0, 12, 24, 25, 36, 48, 49, 120];
const DEFECT_GRID: [u32; 5] = [0, 1, 2, 3, 10];
const DEMAND_GRID: [MarketDemand; 3] = [MarketDemand::Low, MarketDemand::Normal, MarketDemand::High];

fn chemistries() -> Vec<Chemistry> {
    vec![
        Chemistry::Nmc,
        Chemistry::Nmc811,
        Chemistry::Lfp,
        Chemistry::Nca,
        Chemistry::Other("LMO".to_string()),
    ]
}

fn grid() -> Vec<DecisionCriteria> {
    let mut out = Vec::new();
    for soh in SOH_GRID {
        for age_months in AGE_GRID {
            for defects in DEFECT_GRID {
                for chemistry in chemistries() {
                    for market_demand in DEMAND_GRID {
                        out.push(DecisionCriteria {
                            avg_state_of_health: soh,
                            age_months,
                            defective_module_count: defects,
                            avg_resistance_ratio: 0.9,
                            chemistry: chemistry.clone(),
                            market_demand,
                        });
                    }
                }
            }
        }
    }
    out
}

#[test_log::test]
fn test_every_score_is_capped_at_100() {
    for c in grid() {
        let scores = score(&c);
        for (option, points) in scores.iter() {
            assert!(points <= 100, "{option} scored {points} for {c:?}");
        }
        let rec = recommend(&c);
        assert!(rec.confidence <= 100);
        assert_eq!(rec.confidence, rec.scores_by_option.get(rec.recommended_option));
    }
}

#[test_log::test]
fn test_winner_is_max_with_first_listed_tie_break() {
    for c in grid() {
        let rec = recommend(&c);
        let max = rec.scores_by_option.iter().map(|(_, s)| s).max().unwrap();
        assert_eq!(rec.confidence, max);
        let first_at_max = Disposition::ALL
            .into_iter()
            .find(|o| rec.scores_by_option.get(*o) == max)
            .unwrap();
        assert_eq!(rec.recommended_option, first_at_max, "{c:?}");
    }
}

#[test_log::test]
fn test_healthy_young_packs_stay_in_service() {
    for c in grid().into_iter().filter(|c| {
        c.avg_state_of_health >= 80.0 && c.defective_module_count == 0 && c.age_months <= 24
    }) {
        let rec = recommend(&c);
        assert!(
            matches!(
                rec.recommended_option,
                Disposition::Reuse | Disposition::Repurpose
            ),
            "{c:?} -> {:?}",
            rec.recommended_option
        );
        assert!(rec.confidence >= 40);
    }
}

#[test_log::test]
fn test_worn_out_defective_packs_are_recycled() {
    for c in grid()
        .into_iter()
        .filter(|c| c.avg_state_of_health < 40.0 && c.defective_module_count > 2)
    {
        assert_eq!(recommend(&c).recommended_option, Disposition::Recycle, "{c:?}");
    }
}

#[test_log::test]
fn test_resistance_ratio_does_not_affect_scores() {
    for mut c in grid().into_iter().step_by(7) {
        let before = recommend(&c);
        c.avg_resistance_ratio = 3.5;
        assert_eq!(recommend(&c), before);
    }
}

#[test_log::test]
fn test_validated_path_agrees_on_well_formed_input() {
    for c in grid().into_iter().step_by(13) {
        assert_eq!(try_recommend(&c).unwrap(), recommend(&c));
    }
}
