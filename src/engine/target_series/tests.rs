use super::*;
use crate::config::{SupportingData, SupportingDataFile};
use crate::domain::immunity::DiseaseImmunity;
use crate::domain::rules::{DoseRule, SeriesRules};
use crate::domain::season::Season;
use crate::domain::target_dose::{ReasonKind, TargetDose};
use crate::domain::time_period::TimePeriod;
use crate::domain::types::{
    DoseStatus, EvaluationReason, RecommendationReason, RecommendationStatus, RecommendationType,
};
use crate::engine::error::EngineError;
use crate::engine::schedule::Schedule;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// 测试辅助函数
// ==========================================

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn tp(value: &str) -> Option<TimePeriod> {
    Some(value.parse().unwrap())
}

fn hepb_three_dose() -> SeriesRules {
    let mut dose1 = DoseRule::new(1);
    dose1.absolute_minimum_age = tp("0d");
    dose1.minimum_age = tp("0d");
    dose1.earliest_recommended_age = tp("0d");
    dose1.latest_recommended_age = tp("3m");
    dose1.absolute_minimum_interval = tp("4w");
    dose1.minimum_interval = tp("4w");
    dose1.earliest_recommended_interval = tp("1m");
    dose1.latest_recommended_interval = tp("3m");
    dose1.preferable_vaccines = vec!["C_HEPB".to_string()];

    let mut dose2 = DoseRule::new(2);
    dose2.absolute_minimum_interval = tp("8w");
    dose2.minimum_interval = tp("8w");
    dose2.earliest_recommended_interval = tp("5m");
    dose2.latest_recommended_interval = tp("12m");
    dose2.preferable_vaccines = vec!["C_HEPB".to_string()];

    let mut dose3 = DoseRule::new(3);
    dose3.absolute_minimum_age = tp("24w");
    dose3.minimum_age = tp("24w");
    dose3.earliest_recommended_age = tp("6m");
    dose3.latest_recommended_age = tp("19m");
    dose3.preferable_vaccines = vec!["C_HEPB".to_string()];

    SeriesRules::new("HepB 3-dose", "HepB")
        .with_dose_rule(dose1)
        .with_dose_rule(dose2)
        .with_dose_rule(dose3)
}

fn hepb_two_dose_adult() -> SeriesRules {
    let mut dose1 = DoseRule::new(1);
    dose1.absolute_minimum_age = tp("11y");
    dose1.absolute_minimum_interval = tp("4m");
    dose1.minimum_interval = tp("4m");
    let mut dose2 = DoseRule::new(2);
    dose2.minimum_interval = tp("6m");
    SeriesRules::new("HepB 2-dose adult", "HepB")
        .with_dose_rule(dose1)
        .with_dose_rule(dose2)
}

fn mmr_two_dose() -> SeriesRules {
    let mut dose1 = DoseRule::new(1);
    dose1.absolute_minimum_age = tp("1y");
    dose1.minimum_age = tp("1y");
    dose1.earliest_recommended_age = tp("1y");
    dose1.latest_recommended_age = tp("16m");
    dose1.absolute_minimum_interval = tp("4w");
    dose1.minimum_interval = tp("4w");
    dose1.earliest_recommended_interval = tp("4w");
    dose1.preferable_vaccines = vec!["C_MMR".to_string()];
    dose1.allowable_vaccines = vec!["C_MEAS".to_string(), "C_MUMPS".to_string()];

    let mut dose2 = DoseRule::new(2);
    dose2.minimum_age = tp("13m");
    dose2.earliest_recommended_age = tp("4y");
    dose2.preferable_vaccines = vec!["C_MMR".to_string()];

    let mut rules = SeriesRules::new("MMR 2-dose", "MMR")
        .with_dose_rule(dose1)
        .with_dose_rule(dose2);
    rules.dose_number_calculated_by_diseases_targeted = true;
    rules
}

fn flu_season() -> Season {
    Season::fully_specified("2022-2023", d(2022, 8, 1), d(2023, 6, 30))
}

fn flu_seasonal() -> SeriesRules {
    let mut dose1 = DoseRule::new(1);
    dose1.absolute_minimum_age = tp("6m");
    dose1.minimum_age = tp("6m");
    dose1.earliest_recommended_age = tp("6m");
    SeriesRules::new("Flu 2022-2023", "Influenza")
        .with_dose_rule(dose1)
        .with_season(flu_season())
}

fn create_test_schedule() -> Arc<Schedule> {
    let mut file: SupportingDataFile = serde_json::from_value(json!({
        "diseases": [
            {"code": "D_HEPB", "name": "HepB"},
            {"code": "D_MEAS", "name": "Measles"},
            {"code": "D_MUMPS", "name": "Mumps"},
            {"code": "D_RUB", "name": "Rubella"},
            {"code": "D_FLU", "name": "Influenza"}
        ],
        "vaccine_groups": [
            {"code": "VG_HEPB", "name": "HepB", "priority": 1, "diseases": ["HepB"]},
            {"code": "VG_MMR", "name": "MMR", "priority": 2, "diseases": ["Measles", "Mumps", "Rubella"]},
            {"code": "VG_FLU", "name": "Influenza", "priority": 3, "diseases": ["Influenza"]}
        ],
        "vaccines": [
            {"cds_concept": "C_HEPB", "name": "HepB", "diseases_targeted": ["HepB"]},
            {"cds_concept": "C_MEAS", "name": "Measles", "live_virus": true, "diseases_targeted": ["Measles"]},
            {"cds_concept": "C_MUMPS", "name": "Mumps", "live_virus": true, "diseases_targeted": ["Mumps"]},
            {"cds_concept": "C_MMR", "name": "MMR", "live_virus": true, "diseases_targeted": ["Measles", "Mumps", "Rubella"]},
            {"cds_concept": "C_FLU", "name": "Flu", "diseases_targeted": ["Influenza"]}
        ]
    }))
    .unwrap();
    file.series = vec![hepb_three_dose(), hepb_two_dose_adult(), mmr_two_dose(), flu_seasonal()];

    let data = SupportingData::from_file(file).unwrap();
    Arc::new(Schedule::from_reader("test", &["v1".to_string()], Arc::new(data)).unwrap())
}

fn create_test_series(vaccine_group: &str, series_name: &str) -> TargetSeries {
    let schedule = create_test_schedule();
    let rules = schedule.series_by_name(vaccine_group, series_name).unwrap();
    TargetSeries::new(rules, schedule).unwrap()
}

fn create_test_dose(series: &TargetSeries, dose_id: &str, vaccine_code: &str, date: NaiveDate) -> TargetDose {
    let vaccine = series.schedule().vaccine_by_concept(vaccine_code).unwrap().clone();
    let component = vaccine
        .component_targeting(series.diseases_supported_by_series())
        .unwrap();
    TargetDose::new(dose_id, vaccine, component, date)
}

/// 添加剂次并返回其 unique_id
fn add_dose(series: &mut TargetSeries, dose_id: &str, vaccine_code: &str, date: NaiveDate) -> Uuid {
    let dose = create_test_dose(series, dose_id, vaccine_code, date);
    let unique_id = dose.unique_id();
    assert!(series.add_target_dose(dose).unwrap());
    unique_id
}

fn mark_valid(series: &mut TargetSeries, unique_id: Uuid) {
    series
        .target_dose_mut(unique_id)
        .unwrap()
        .set_status(DoseStatus::Valid);
}

// ==========================================
// 剂次排序与编号
// ==========================================

#[test]
fn test_administered_shot_numbers_follow_date_order() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let third = add_dose(&mut series, "c", "C_HEPB", d(2020, 7, 1));
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));

    let shot_numbers: Vec<u32> = series
        .target_doses()
        .iter()
        .map(|d| d.administered_shot_number())
        .collect();
    assert_eq!(shot_numbers, vec![1, 2, 3]);
    assert_eq!(series.target_dose(first).unwrap().administered_shot_number(), 1);
    assert_eq!(series.target_dose(second).unwrap().administered_shot_number(), 2);
    assert_eq!(series.target_dose(third).unwrap().administered_shot_number(), 3);
}

#[test]
fn test_same_day_doses_never_collapse() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    add_dose(&mut series, "b", "C_HEPB", d(2020, 1, 1));
    add_dose(&mut series, "c", "C_HEPB", d(2020, 1, 1));

    assert_eq!(series.number_of_shots(), 3);
    let ids: Vec<&str> = series.target_doses().iter().map(|d| d.dose_id()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_remove_and_readd_restores_order() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let middle = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));
    add_dose(&mut series, "c", "C_HEPB", d(2020, 7, 1));

    let removed = series.remove_target_dose_from_series(middle).unwrap();
    assert_eq!(removed.dose_id(), "b");
    let after_remove: Vec<(&str, u32)> = series
        .target_doses()
        .iter()
        .map(|d| (d.dose_id(), d.administered_shot_number()))
        .collect();
    assert_eq!(after_remove, vec![("a", 1), ("c", 2)]);

    add_dose(&mut series, "b2", "C_HEPB", d(2020, 3, 1));
    let after_readd: Vec<(&str, u32)> = series
        .target_doses()
        .iter()
        .map(|d| (d.dose_id(), d.administered_shot_number()))
        .collect();
    assert_eq!(after_readd, vec![("a", 1), ("b2", 2), ("c", 3)]);
}

#[test]
fn test_remove_unknown_dose_is_not_found() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let result = series.remove_target_dose_from_series(Uuid::new_v4());
    assert!(matches!(result, Err(EngineError::NotFound { .. })));
}

#[test]
fn test_duplicate_dose_is_rejected() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let dose = create_test_dose(&series, "a", "C_HEPB", d(2020, 1, 1));
    assert!(series.add_target_dose(dose.clone()).unwrap());
    assert!(!series.add_target_dose(dose).unwrap());
    assert_eq!(series.number_of_shots(), 1);
}

#[test]
fn test_remove_shifts_dose_numbers_down() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));
    let third = add_dose(&mut series, "c", "C_HEPB", d(2020, 7, 1));
    for id in [first, second, third] {
        assert_eq!(series.evaluate_target_dose(birth, id).unwrap(), DoseStatus::Valid);
    }
    assert_eq!(series.target_dose(third).unwrap().dose_number(), 3);

    series.remove_target_dose_from_series(second).unwrap();

    // 被移除剂次的编号成为下一剂的编号
    assert_eq!(series.target_dose(third).unwrap().dose_number(), 2);
    assert_eq!(series.target_dose(third).unwrap().administered_shot_number(), 2);
    assert_eq!(series.interim_validity_count("HepB"), Some(2));
}

// ==========================================
// 剂次编号计算
// ==========================================

#[test]
fn test_read_only_queries_do_not_touch_counters() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));
    series.evaluate_target_dose(birth, first).unwrap();

    let before = series.interim_validity_counts().clone();
    let _ = series.determine_dose_number_in_series();
    let _ = series.determine_dose_number_in_series_for(second).unwrap();
    let _ = series
        .determine_dose_number_in_series_for_diseases_targeted_by_dose(second)
        .unwrap();
    let _ = series.effective_number_of_doses_in_series_by_date(d(2020, 2, 1));
    assert_eq!(series.interim_validity_counts(), &before);
}

#[test]
fn test_update_mode_is_monotonic() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));

    series.evaluate_target_dose(birth, first).unwrap();
    let after_first = series.interim_validity_count("HepB").unwrap();
    series.evaluate_target_dose(birth, second).unwrap();
    let after_second = series.interim_validity_count("HepB").unwrap();

    assert_eq!(after_first, 1);
    assert_eq!(after_second, 2);
    assert_eq!(
        series
            .update_dose_validity_count_and_return_actual_dose_count(second)
            .unwrap(),
        2
    );
    assert_eq!(
        series
            .update_dose_validity_count_and_return_target_dose_number(second)
            .unwrap(),
        3
    );
    assert!(series.interim_validity_count("HepB").unwrap() >= after_second);
}

#[test]
fn test_skip_entry_numbers_next_valid_dose_three() {
    // 场景: 追赶程序, 首剂直接记为第 3 剂
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.add_skip_dose_entry_for_dose(1, 3).unwrap();
    assert_eq!(series.interim_validity_count("HepB"), Some(2));

    let dose = add_dose(&mut series, "a", "C_HEPB", d(2020, 8, 1));
    assert_eq!(series.target_dose(dose).unwrap().dose_number(), 3);

    let status = series.evaluate_target_dose(birth, dose).unwrap();
    assert_eq!(status, DoseStatus::Valid);
    assert_eq!(series.target_dose(dose).unwrap().dose_number(), 3);
    assert_eq!(series.effective_number_of_doses_in_series(), 3);
    assert!(series.is_series_complete());
}

#[test]
fn test_skip_entry_validation() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    // 起点必须等于当前待接种剂次
    assert!(matches!(
        series.add_skip_dose_entry_for_dose(2, 3),
        Err(EngineError::ImproperUsage(_))
    ));
    // 越界
    assert!(series.add_skip_dose_entry_for_dose(1, 4).is_err());
    assert!(series.add_skip_dose_entry_for_dose(0, 2).is_err());
    // 未知疾病
    assert!(series
        .add_skip_dose_entry_for_specified_disease("Measles", 1, 2)
        .is_err());
    // 起止相同: 忽略
    series.add_skip_dose_entry_for_dose(1, 1).unwrap();
    assert!(series.skip_dose_entries("HepB").unwrap().is_empty());
    assert_eq!(series.interim_validity_count("HepB"), Some(0));
}

#[test]
fn test_same_day_valid_doses_count_once_when_not_by_disease() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let a = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let b = add_dose(&mut series, "b", "C_HEPB", d(2020, 1, 1));
    mark_valid(&mut series, a);
    mark_valid(&mut series, b);
    assert_eq!(series.effective_number_of_doses_in_series(), 1);

    let c = add_dose(&mut series, "c", "C_HEPB", d(2020, 3, 1));
    mark_valid(&mut series, c);
    assert_eq!(series.effective_number_of_doses_in_series(), 2);
}

#[test]
fn test_skip_entry_applies_to_same_day_repeat() {
    let birth = d(2019, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    assert_eq!(series.evaluate_target_dose(birth, first).unwrap(), DoseStatus::Valid);
    series.add_skip_dose_entry_for_dose(2, 3).unwrap();

    let repeat = add_dose(&mut series, "b", "C_HEPB", d(2020, 1, 1));
    assert_eq!(series.determine_dose_number_in_series_for(repeat).unwrap(), 3);
    assert_eq!(series.evaluate_target_dose(birth, repeat).unwrap(), DoseStatus::Valid);
    assert_eq!(series.target_dose(repeat).unwrap().dose_number(), 3);
    assert_eq!(series.effective_number_of_doses_in_series(), 3);
    assert!(series.is_series_complete());
}

#[test]
fn test_same_day_by_disease_counts_each_disease_once() {
    let mut series = create_test_series("MMR", "MMR 2-dose");
    let measles = add_dose(&mut series, "a", "C_MEAS", d(2021, 2, 1));
    let mumps = add_dose(&mut series, "b", "C_MUMPS", d(2021, 2, 1));
    mark_valid(&mut series, measles);
    mark_valid(&mut series, mumps);
    // Rubella 仍为 0, 按疾病模式取最小值
    assert_eq!(series.effective_number_of_doses_in_series(), 0);

    let mmr = add_dose(&mut series, "c", "C_MMR", d(2021, 2, 1));
    mark_valid(&mut series, mmr);
    assert_eq!(series.effective_number_of_doses_in_series(), 1);

    let repeat = add_dose(&mut series, "d", "C_MMR", d(2021, 2, 1));
    mark_valid(&mut series, repeat);
    assert_eq!(series.effective_number_of_doses_in_series(), 1);
}

#[test]
fn test_immunity_excluded_from_least_count() {
    let mut series = create_test_series("MMR", "MMR 2-dose");
    assert!(series
        .mark_immunity_to_specified_disease(&DiseaseImmunity::new("Measles", None))
        .unwrap());
    let mumps = add_dose(&mut series, "a", "C_MUMPS", d(2021, 2, 1));
    mark_valid(&mut series, mumps);
    // Rubella 为 0, Measles 免疫不参与
    assert_eq!(series.effective_number_of_doses_in_series(), 0);

    let mmr = add_dose(&mut series, "b", "C_MMR", d(2021, 4, 1));
    mark_valid(&mut series, mmr);
    assert_eq!(series.effective_number_of_doses_in_series(), 1);
    assert!(series.is_immune_as_of("Measles", d(1900, 1, 1)));
}

#[test]
fn test_immunity_to_all_diseases_completes_series() {
    let mut series = create_test_series("MMR", "MMR 2-dose");
    for disease in ["Measles", "Mumps", "Rubella"] {
        series
            .mark_immunity_to_specified_disease(&DiseaseImmunity::new(disease, Some(d(2019, 1, 1))))
            .unwrap();
    }
    assert_eq!(series.effective_number_of_doses_in_series(), 2);
    assert!(series.is_series_complete());
    assert_eq!(series.interim_validity_count("Rubella"), Some(2));
}

#[test]
fn test_immunity_for_unrelated_disease_ignored() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    assert!(!series
        .mark_immunity_to_specified_disease(&DiseaseImmunity::new("Measles", None))
        .unwrap());
    assert!(series
        .mark_immunity_to_specified_disease(&DiseaseImmunity::new(" ", None))
        .is_err());
}

// ==========================================
// 约束评估
// ==========================================

#[test]
fn test_minimum_age_boundary_is_inclusive() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("MMR", "MMR 2-dose");
    let on_boundary = add_dose(&mut series, "a", "C_MMR", d(2021, 1, 1));
    series
        .evaluate_minimum_age_and_record_reason(birth, on_boundary)
        .unwrap();
    assert!(!series
        .target_dose(on_boundary)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::BelowMinimumAge));

    let mut series = create_test_series("MMR", "MMR 2-dose");
    let one_day_early = add_dose(&mut series, "b", "C_MMR", d(2020, 12, 31));
    series
        .evaluate_minimum_age_and_record_reason(birth, one_day_early)
        .unwrap();
    assert!(series
        .target_dose(one_day_early)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::BelowMinimumAge));
}

#[test]
fn test_dose_before_birth_is_invalid_age() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let dose = add_dose(&mut series, "a", "C_HEPB", d(2019, 12, 31));
    assert_eq!(series.evaluate_target_dose(birth, dose).unwrap(), DoseStatus::Invalid);
    assert!(series
        .target_dose(dose)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::InvalidAge));
}

#[test]
fn test_missing_dose_rule_checked_before_birth_date() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let dose = add_dose(&mut series, "a", "C_HEPB", d(2019, 12, 31));

    series.target_dose_mut(dose).unwrap().set_dose_number(7);
    series.evaluate_minimum_age_and_record_reason(birth, dose).unwrap();
    assert!(series.target_dose(dose).unwrap().reasons(ReasonKind::Invalid).is_empty());

    series.target_dose_mut(dose).unwrap().set_dose_number(1);
    series.evaluate_minimum_age_and_record_reason(birth, dose).unwrap();
    assert!(series
        .target_dose(dose)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::InvalidAge));
}

#[test]
fn test_same_day_doses_exempt_from_interval() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 2, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 2, 1));
    series.evaluate_target_dose(birth, first).unwrap();
    series.evaluate_target_dose(birth, second).unwrap();

    assert!(!series
        .target_dose(second)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::BelowMinimumInterval));
    assert_eq!(series.effective_number_of_doses_in_series(), 1);
}

#[test]
fn test_short_interval_is_invalid() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 2, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 2, 11));
    series.evaluate_target_dose(birth, first).unwrap();
    let status = series.evaluate_target_dose(birth, second).unwrap();

    assert_eq!(status, DoseStatus::Invalid);
    assert!(series
        .target_dose(second)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::BelowMinimumInterval));
    assert_eq!(series.number_of_doses_administered_in_series(), 1);
}

#[test]
fn test_evaluation_requires_earlier_doses_first() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));
    assert!(matches!(
        series.evaluate_target_dose(birth, second),
        Err(EngineError::ImproperUsage(_))
    ));
}

#[test]
fn test_vaccine_not_permitted_for_dose() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("MMR", "MMR 2-dose");
    let first = add_dose(&mut series, "a", "C_MMR", d(2021, 2, 1));
    let second = add_dose(&mut series, "b", "C_MEAS", d(2021, 6, 1));
    series.evaluate_target_dose(birth, first).unwrap();
    // 第 2 剂只允许 MMR
    assert_eq!(series.evaluate_target_dose(birth, second).unwrap(), DoseStatus::Invalid);
    assert!(series
        .target_dose(second)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::VaccineNotAllowedForThisDose));
}

#[test]
fn test_extra_dose_after_completion_is_accepted() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.set_series_complete(true);
    let dose = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    assert_eq!(series.evaluate_target_dose(birth, dose).unwrap(), DoseStatus::Accepted);
    assert!(series
        .target_dose(dose)
        .unwrap()
        .contains_reason(ReasonKind::Accepted, EvaluationReason::ExtraDose));
}

#[test]
fn test_dose_queries() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    let second = add_dose(&mut series, "b", "C_HEPB", d(2020, 3, 1));
    let third = add_dose(&mut series, "c", "C_HEPB", d(2020, 7, 1));
    for id in [first, second, third] {
        series.evaluate_target_dose(birth, id).unwrap();
    }

    assert_eq!(series.number_of_doses_administered_in_series(), 3);
    assert_eq!(series.number_of_doses_administered_in_series_by_date(d(2020, 3, 1)), 2);
    assert_eq!(series.effective_number_of_doses_in_series_by_date(d(2020, 2, 1)), 1);
    assert_eq!(series.effective_number_of_doses_in_series_by_date(d(2019, 1, 1)), 0);
    assert_eq!(series.valid_or_accepted_shot_by_dose_number(2).unwrap().dose_id(), "b");
    assert_eq!(series.last_shot().unwrap().dose_id(), "c");
    assert_eq!(series.dose_number_at_series_completion(), Some(3));
    assert_eq!(
        series
            .dose_rule_of_shot_with_most_recent_date_prior_to(third)
            .unwrap()
            .dose_number,
        2
    );
    assert!(series
        .are_no_earlier_administered_shots_not_evaluated(third)
        .unwrap());
}

// ==========================================
// 推荐生成与汇总
// ==========================================

#[test]
fn test_forecast_after_first_dose() {
    let birth = d(2020, 1, 1);
    let evaluation = Some(d(2020, 1, 15));
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let first = add_dose(&mut series, "a", "C_HEPB", d(2020, 1, 1));
    series.evaluate_target_dose(birth, first).unwrap();

    series
        .recommend_next_shot_based_on_earliest_age_rule(birth, evaluation)
        .unwrap();
    series
        .recommend_next_shot_based_on_earliest_interval_rule(evaluation)
        .unwrap();
    series
        .recommend_next_shot_based_on_earliest_recommended_age_rule(birth, evaluation)
        .unwrap();
    series
        .recommend_next_shot_based_on_earliest_recommended_interval_rule(evaluation)
        .unwrap();
    series
        .recommend_next_shot_based_on_latest_recommended_age_rule(birth, evaluation)
        .unwrap();
    series
        .recommend_next_shot_based_on_latest_recommended_interval_rule(evaluation)
        .unwrap();

    let latest = series.interim_recommendations(
        RecommendationType::LatestRecommended,
        RecommendationBasis::Interval,
    );
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].recommendation_date, Some(d(2020, 3, 31)));

    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::RecommendedInFuture);
    assert_eq!(series.final_recommendation_date(), Some(d(2020, 2, 1)));
    assert_eq!(series.final_earliest_date(), Some(d(2020, 1, 29)));
    assert_eq!(series.final_latest_recommendation_date(), Some(d(2020, 3, 31)));
    assert_eq!(series.final_recommendations().len(), 2);
    assert!(!series.has_interim_recommendations());

    series.adjust_recommendation_status_by_eval_time(d(2020, 2, 10));
    assert_eq!(series.recommendation_status(), RecommendationStatus::Recommended);
    let due_now = RecommendationReason::DueNow.cds_list_item_name();
    assert!(series
        .final_recommendations()
        .iter()
        .all(|r| r.recommendation_reason.as_deref() == Some(due_now)
            && r.recommendation_status == RecommendationStatus::Recommended));
}

#[test]
fn test_finalize_priority_conditional_wins() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let evaluation = Some(d(2024, 2, 1));
    series.add_interim_recommendation_for_consideration(
        Some(d(2024, 5, 1)),
        None,
        Some(RecommendationStatus::RecommendedInFuture),
        evaluation,
    );
    series.add_interim_recommendation_for_consideration(
        Some(d(2024, 3, 1)),
        None,
        Some(RecommendationStatus::ConditionallyRecommended),
        evaluation,
    );
    series.add_interim_recommendation_for_consideration(
        Some(d(2024, 1, 1)),
        None,
        Some(RecommendationStatus::Recommended),
        evaluation,
    );

    series.finalize_recommendations_for_forecasting();
    assert_eq!(
        series.recommendation_status(),
        RecommendationStatus::ConditionallyRecommended
    );
    assert_eq!(series.final_recommendation_date(), Some(d(2024, 5, 1)));
    assert_eq!(series.final_recommendations().len(), 3);
}

#[test]
fn test_custom_recommendation_status_from_date() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.add_interim_recommendation_for_consideration(Some(d(2024, 5, 1)), None, None, Some(d(2024, 1, 1)));
    series.add_interim_recommendation_for_consideration(Some(d(2024, 5, 1)), None, None, Some(d(2024, 1, 1)));
    series.add_interim_recommendation_for_consideration(None, None, None, Some(d(2024, 1, 1)));

    let custom = series.interim_custom_recommendations();
    // 同内容去重
    assert_eq!(custom.len(), 2);
    assert_eq!(custom[0].recommendation_status, RecommendationStatus::RecommendedInFuture);
    assert_eq!(
        custom[0].recommendation_reason.as_deref(),
        Some(RecommendationReason::InFuture.cds_list_item_name())
    );
    assert_eq!(custom[1].recommendation_status, RecommendationStatus::NotForecasted);

    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::RecommendedInFuture);
    // 无日期的记录性推荐并入最终列表
    assert_eq!(series.final_recommendations().len(), 2);
}

#[test]
fn test_not_recommended_wins_outright() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    let evaluation = Some(d(2024, 1, 1));
    series.add_interim_recommendation_for_consideration(
        Some(d(2024, 5, 1)),
        None,
        Some(RecommendationStatus::Recommended),
        evaluation,
    );
    series.add_interim_recommendation_for_consideration(
        None,
        None,
        Some(RecommendationStatus::NotRecommended),
        evaluation,
    );

    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::NotRecommended);
    assert_eq!(series.final_recommendation_date(), None);
    assert_eq!(series.final_earliest_date(), None);
    assert_eq!(series.final_latest_recommendation_date(), None);
    assert_eq!(series.final_recommendations().len(), 1);
}

#[test]
fn test_complete_series_not_recommended() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.set_series_complete(true);
    series
        .recommend_next_shot_based_on_earliest_age_rule(birth, Some(d(2021, 1, 1)))
        .unwrap();

    let earliest = series.interim_recommendations(RecommendationType::Earliest, RecommendationBasis::Age);
    assert_eq!(earliest.len(), 1);
    assert_eq!(
        earliest[0].recommendation_reason.as_deref(),
        Some(RecommendationReason::Complete.cds_list_item_name())
    );

    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::NotRecommended);
    assert_eq!(series.final_recommendations().len(), 1);
}

#[test]
fn test_finalize_without_candidates() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::NotRecommended);
    assert!(series.final_recommendations().is_empty());
}

#[test]
fn test_finalize_restores_prior_status() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.add_interim_recommendation_for_consideration(
        Some(d(2024, 5, 1)),
        None,
        None,
        Some(d(2024, 1, 1)),
    );
    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::RecommendedInFuture);

    series.set_recommendation_status(RecommendationStatus::ForecastingInProgress);
    series.finalize_recommendations_for_forecasting();
    assert_eq!(series.recommendation_status(), RecommendationStatus::RecommendedInFuture);
    assert_eq!(series.final_recommendation_date(), Some(d(2024, 5, 1)));
}

#[test]
fn test_final_date_setters_keep_order() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.set_final_earliest_date(Some(d(2024, 3, 1)));
    series.set_final_recommendation_date(Some(d(2024, 2, 1)));
    assert_eq!(series.final_earliest_date(), Some(d(2024, 2, 1)));

    series.set_final_latest_recommendation_date(Some(d(2024, 4, 1)));
    series.set_final_recommendation_date(Some(d(2024, 5, 1)));
    assert_eq!(series.final_latest_recommendation_date(), Some(d(2024, 5, 1)));

    series.set_final_earliest_date(Some(d(2024, 6, 1)));
    assert_eq!(series.final_recommendation_date(), Some(d(2024, 6, 1)));
    assert_eq!(series.final_latest_recommendation_date(), Some(d(2024, 6, 1)));

    series.set_final_recommendation_date(None);
    assert_eq!(series.final_earliest_date(), None);
    assert_eq!(series.final_latest_recommendation_date(), None);

    series.clear_recommendations();
    assert!(series.final_recommendations().is_empty());
}

#[test]
fn test_missing_dose_rule_is_configuration_error() {
    let birth = d(2020, 1, 1);
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.set_manual_dose_number_to_recommend(5).unwrap();
    let result = series.recommend_next_shot_based_on_earliest_age_rule(birth, Some(d(2020, 2, 1)));
    assert!(matches!(result, Err(EngineError::InconsistentConfiguration(_))));
    assert!(series.set_manual_dose_number_to_recommend(0).is_err());
}

// ==========================================
// 季节性系列
// ==========================================

fn create_test_seasonal_series() -> TargetSeries {
    let schedule = create_test_schedule();
    let rules = schedule.series_by_name("Influenza", "Flu 2022-2023").unwrap();
    TargetSeries::with_season(rules, schedule, flu_season()).unwrap()
}

#[test]
fn test_seasonal_age_recommendation_floors_at_season_start() {
    let birth = d(2022, 1, 1);
    let mut series = create_test_seasonal_series();
    series
        .recommend_next_shot_based_on_earliest_age_rule(birth, Some(d(2022, 7, 15)))
        .unwrap();
    let earliest = series.interim_recommendations(RecommendationType::Earliest, RecommendationBasis::Age);
    assert_eq!(earliest[0].recommendation_date, Some(d(2022, 8, 1)));
    assert_eq!(earliest[0].recommendation_status, RecommendationStatus::RecommendedInFuture);
}

#[test]
fn test_seasonal_series_rejects_doses_outside_season() {
    let mut series = create_test_seasonal_series();
    let outside = create_test_dose(&series, "a", "C_FLU", d(2022, 7, 1));
    assert!(!series.add_target_dose(outside.clone()).unwrap());
    assert!(series.add_target_dose_to_series(outside, true).unwrap());

    let birth = d(2021, 1, 1);
    let id = series.target_doses()[0].unique_id();
    series.evaluate_target_dose(birth, id).unwrap();
    assert!(series
        .target_dose(id)
        .unwrap()
        .contains_reason(ReasonKind::Invalid, EvaluationReason::OutsideSeason));
}

#[test]
fn test_default_season_cannot_be_target() {
    let schedule = create_test_schedule();
    let rules = schedule.series_by_name("Influenza", "Flu 2022-2023").unwrap();
    let result = TargetSeries::with_season(rules, schedule, Season::default_named("default"));
    assert!(matches!(result, Err(EngineError::ImproperUsage(_))));
}

// ==========================================
// 系列规则变更
// ==========================================

#[test]
fn test_convert_to_specified_series_copies_rules() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.convert_to_specified_series("HepB 2-dose adult", 2).unwrap();

    assert_eq!(series.series_name(), "HepB 2-dose adult");
    assert_eq!(series.number_of_doses_in_series(), 2);
    // 第 1 剂保留原规则, 第 2 剂来自目标系列
    assert_eq!(series.absolute_minimum_interval_for_dose(1), tp("4w"));
    assert_eq!(
        series.interval_for_dose(2, RecommendationType::Earliest),
        tp("6m")
    );

    let shared = series.schedule().series_by_name("HepB", "HepB 3-dose").unwrap();
    assert_eq!(shared.number_of_doses_in_series, 3);

    assert!(series.convert_to_specified_series("Unknown", 1).is_err());
    assert!(series.convert_to_specified_series("HepB 3-dose", 4).is_err());
}

#[test]
fn test_add_and_modify_dose_rule() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    series.add_vaccine_group_dose_rule(DoseRule::new(4)).unwrap();
    assert_eq!(series.number_of_doses_in_series(), 4);
    assert!(series.add_vaccine_group_dose_rule(DoseRule::new(6)).is_err());

    let mut modified = DoseRule::new(2);
    modified.minimum_interval = tp("10w");
    series.modify_vaccine_group_dose_rule(modified).unwrap();
    assert_eq!(series.interval_for_dose(2, RecommendationType::Earliest), tp("10w"));
    assert!(series.modify_vaccine_group_dose_rule(DoseRule::new(9)).is_err());

    let shared = series.schedule().series_by_name("HepB", "HepB 3-dose").unwrap();
    assert_eq!(shared.number_of_doses_in_series, 3);
    assert_eq!(shared.dose_rule(2).unwrap().minimum_interval, tp("8w"));
}

#[test]
fn test_unknown_vaccine_group_rejected() {
    let schedule = create_test_schedule();
    let rules = Arc::new(SeriesRules::new("X", "Unknown"));
    assert!(matches!(
        TargetSeries::new(rules, schedule),
        Err(EngineError::InconsistentConfiguration(_))
    ));
}

// ==========================================
// 活病毒与人工覆写
// ==========================================

#[test]
fn test_live_virus_detection() {
    let mut series = create_test_series("MMR", "MMR 2-dose");
    assert!(!series.one_or_more_shots_administered_is_live_virus());
    // 尚未预测
    assert_eq!(series.recommendation_status(), RecommendationStatus::NotForecasted);
    assert!(!series.is_recommended_vaccine_for_next_dose_live_virus());

    series.set_recommendation_status(RecommendationStatus::Recommended);
    assert!(series.is_recommended_vaccine_for_next_dose_live_virus());
    series.set_recommendation_status(RecommendationStatus::ConditionallyRecommended);
    assert!(series.is_recommended_vaccine_for_next_dose_live_virus());
    series.set_recommendation_status(RecommendationStatus::RecommendedInFuture);
    assert!(series.is_recommended_vaccine_for_next_dose_live_virus());

    add_dose(&mut series, "a", "C_MMR", d(2021, 2, 1));
    assert!(series.one_or_more_shots_administered_is_live_virus());

    series.set_account_for_live_virus_intervals(Some(false));
    assert!(!series.is_recommended_vaccine_for_next_dose_live_virus());

    let hepb = create_test_series("HepB", "HepB 3-dose");
    assert!(!hepb.is_recommended_vaccine_for_next_dose_live_virus());
    assert_eq!(hepb.preferable_vaccines_for_dose(1).len(), 1);
    assert_eq!(series.permitted_vaccines_for_dose(1).len(), 3);
}

#[test]
fn test_live_virus_override_requires_active_recommendation() {
    let mut series = create_test_series("MMR", "MMR 2-dose");
    series.set_account_for_live_virus_intervals(Some(true));
    assert!(!series.is_recommended_vaccine_for_next_dose_live_virus());

    series.set_recommendation_status(RecommendationStatus::NotRecommended);
    assert!(!series.is_recommended_vaccine_for_next_dose_live_virus());

    let mut hepb = create_test_series("HepB", "HepB 3-dose");
    hepb.set_recommendation_status(RecommendationStatus::Recommended);
    assert!(!hepb.is_recommended_vaccine_for_next_dose_live_virus());
    hepb.set_account_for_live_virus_intervals(Some(true));
    assert!(hepb.is_recommended_vaccine_for_next_dose_live_virus());

    // 已免疫, 下一剂无剂次规则
    hepb.mark_immunity_to_specified_disease(&DiseaseImmunity::new("HepB", None))
        .unwrap();
    assert_eq!(hepb.effective_number_of_doses_in_series(), 3);
    assert!(!hepb.is_recommended_vaccine_for_next_dose_live_virus());
}

#[test]
fn test_series_complete_override() {
    let mut series = create_test_series("HepB", "HepB 3-dose");
    assert!(!series.is_series_complete());
    series.set_series_complete(true);
    assert!(series.is_series_complete());
    assert!(series.is_series_complete_manually_set());
    series.set_series_complete(false);
    assert!(!series.is_series_complete());
    series.clear_series_complete_override();
    assert!(!series.is_series_complete_manually_set());
}
