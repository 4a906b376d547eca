// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================
// 标准知识库: HepB 3 剂 / MMR 2 剂 (按疾病计数) / 流感季节性 1 剂
// ==========================================

use chrono::NaiveDate;
use immunization_forecast::config::{SupportingData, SupportingDataFile, SUPPORTING_DATA_FILE_NAME};
use immunization_forecast::domain::immunity::DiseaseImmunity;
use immunization_forecast::domain::rules::{DoseRule, SeriesRules};
use immunization_forecast::domain::season::Season;
use immunization_forecast::domain::time_period::TimePeriod;
use immunization_forecast::engine::{AdministeredDose, ForecastRequest, Schedule};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn period(value: &str) -> Option<TimePeriod> {
    Some(value.parse().unwrap())
}

// ==========================================
// DoseRule 构建器
// ==========================================

pub struct DoseRuleBuilder {
    rule: DoseRule,
}

impl DoseRuleBuilder {
    pub fn new(dose_number: u32) -> Self {
        Self {
            rule: DoseRule::new(dose_number),
        }
    }

    /// 同时设置绝对最小年龄与最小年龄
    pub fn minimum_age(mut self, value: &str) -> Self {
        self.rule.absolute_minimum_age = period(value);
        self.rule.minimum_age = period(value);
        self
    }

    /// 同时设置绝对最小间隔与最小间隔
    pub fn minimum_interval(mut self, value: &str) -> Self {
        self.rule.absolute_minimum_interval = period(value);
        self.rule.minimum_interval = period(value);
        self
    }

    pub fn recommended_age(mut self, value: &str) -> Self {
        self.rule.earliest_recommended_age = period(value);
        self
    }

    pub fn overdue_age(mut self, value: &str) -> Self {
        self.rule.latest_recommended_age = period(value);
        self
    }

    pub fn recommended_interval(mut self, value: &str) -> Self {
        self.rule.earliest_recommended_interval = period(value);
        self
    }

    pub fn overdue_interval(mut self, value: &str) -> Self {
        self.rule.latest_recommended_interval = period(value);
        self
    }

    pub fn preferable(mut self, codes: &[&str]) -> Self {
        self.rule.preferable_vaccines = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn allowable(mut self, codes: &[&str]) -> Self {
        self.rule.allowable_vaccines = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn build(self) -> DoseRule {
        self.rule
    }
}

// ==========================================
// SeriesRules 构建器
// ==========================================

pub struct SeriesBuilder {
    rules: SeriesRules,
}

impl SeriesBuilder {
    pub fn new(series_name: &str, vaccine_group: &str) -> Self {
        Self {
            rules: SeriesRules::new(series_name, vaccine_group),
        }
    }

    pub fn dose(mut self, rule: DoseRuleBuilder) -> Self {
        self.rules = self.rules.with_dose_rule(rule.build());
        self
    }

    pub fn by_diseases_targeted(mut self) -> Self {
        self.rules.dose_number_calculated_by_diseases_targeted = true;
        self
    }

    pub fn season(mut self, season: Season) -> Self {
        self.rules = self.rules.with_season(season);
        self
    }

    pub fn build(self) -> SeriesRules {
        self.rules
    }
}

// ==========================================
// 标准知识库
// ==========================================

pub fn flu_season_2022() -> Season {
    Season::fully_specified("2022-2023", date(2022, 8, 1), date(2023, 6, 30))
}

pub fn flu_season_2023() -> Season {
    Season::fully_specified("2023-2024", date(2023, 8, 1), date(2024, 6, 30))
}

pub fn hepb_series() -> SeriesRules {
    SeriesBuilder::new("HepB 3-dose", "HepB")
        .dose(
            DoseRuleBuilder::new(1)
                .minimum_age("0d")
                .recommended_age("0d")
                .overdue_age("3m")
                .minimum_interval("4w")
                .recommended_interval("1m")
                .overdue_interval("3m")
                .preferable(&["C_HEPB"]),
        )
        .dose(
            DoseRuleBuilder::new(2)
                .minimum_interval("8w")
                .recommended_interval("5m")
                .overdue_interval("12m")
                .preferable(&["C_HEPB"]),
        )
        .dose(
            DoseRuleBuilder::new(3)
                .minimum_age("24w")
                .recommended_age("6m")
                .overdue_age("19m")
                .preferable(&["C_HEPB"]),
        )
        .build()
}

pub fn mmr_series() -> SeriesRules {
    SeriesBuilder::new("MMR 2-dose", "MMR")
        .by_diseases_targeted()
        .dose(
            DoseRuleBuilder::new(1)
                .minimum_age("1y")
                .recommended_age("1y")
                .overdue_age("16m")
                .minimum_interval("4w")
                .recommended_interval("4w")
                .preferable(&["C_MMR"])
                .allowable(&["C_MEAS", "C_MUMPS", "C_RUB"]),
        )
        .dose(
            DoseRuleBuilder::new(2)
                .recommended_age("4y")
                .preferable(&["C_MMR"]),
        )
        .build()
}

pub fn flu_series() -> SeriesRules {
    SeriesBuilder::new("Influenza seasonal", "Influenza")
        .dose(
            DoseRuleBuilder::new(1)
                .minimum_age("6m")
                .recommended_age("6m")
                .preferable(&["C_FLU"]),
        )
        .season(flu_season_2022())
        .season(flu_season_2023())
        .season(Season::default_named("Influenza default"))
        .build()
}

/// 疾病 / 疫苗组 / 疫苗 (不含系列)
pub fn concept_file() -> SupportingDataFile {
    serde_json::from_value(json!({
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
            {"cds_concept": "C_RUB", "name": "Rubella", "live_virus": true, "diseases_targeted": ["Rubella"]},
            {"cds_concept": "C_MMR", "name": "MMR", "live_virus": true, "diseases_targeted": ["Measles", "Mumps", "Rubella"]},
            {"cds_concept": "C_MR_COMBO", "name": "Measles-Rubella", "components": ["C_MEAS", "C_RUB"]},
            {"cds_concept": "C_FLU", "name": "Influenza", "diseases_targeted": ["Influenza"]}
        ]
    }))
    .unwrap()
}

pub fn standard_supporting_data_file() -> SupportingDataFile {
    let mut file = concept_file();
    file.series = vec![hepb_series(), mmr_series(), flu_series()];
    file
}

pub fn standard_schedule() -> Arc<Schedule> {
    let data = SupportingData::from_file(standard_supporting_data_file()).unwrap();
    Arc::new(Schedule::from_reader("ice-test", &["v1".to_string()], Arc::new(data)).unwrap())
}

/// 写入 `<repository>/<version>/supporting_data.json`
pub fn write_knowledge_version(repository: &Path, version: &str, file: &SupportingDataFile) {
    let dir = repository.join(version);
    fs::create_dir_all(&dir).unwrap();
    let content = serde_json::to_string_pretty(file).unwrap();
    fs::write(dir.join(SUPPORTING_DATA_FILE_NAME), content).unwrap();
}

// ==========================================
// ForecastRequest 构建器
// ==========================================

pub struct RequestBuilder {
    request: ForecastRequest,
}

impl RequestBuilder {
    pub fn new(birth_date: NaiveDate) -> Self {
        Self {
            request: ForecastRequest {
                birth_date,
                evaluation_date: None,
                vaccine_groups: Vec::new(),
                history_only: false,
                doses: Vec::new(),
                immunities: Vec::new(),
            },
        }
    }

    pub fn evaluated_on(mut self, evaluation_date: NaiveDate) -> Self {
        self.request.evaluation_date = Some(evaluation_date);
        self
    }

    pub fn vaccine_group(mut self, vaccine_group: &str) -> Self {
        self.request.vaccine_groups.push(vaccine_group.to_string());
        self
    }

    pub fn history_only(mut self) -> Self {
        self.request.history_only = true;
        self
    }

    pub fn dose(mut self, dose_id: &str, vaccine_code: &str, administration_date: NaiveDate) -> Self {
        self.request.doses.push(AdministeredDose {
            dose_id: dose_id.to_string(),
            vaccine_code: vaccine_code.to_string(),
            administration_date,
        });
        self
    }

    pub fn immunity(mut self, disease: &str, date_of_immunity: Option<NaiveDate>) -> Self {
        self.request
            .immunities
            .push(DiseaseImmunity::new(disease, date_of_immunity));
        self
    }

    pub fn build(self) -> ForecastRequest {
        self.request
    }
}
