use careflow_common::prelude::*;
use serde_json::Value;
use strum_macros::{AsRefStr, Display};

use crate::config::RiskProperties;

/// Inputs of a risk score, read from the screening (`dados_saude`) and utilization
/// (`dados_utilizacao`) documents of a beneficiary.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskFeatures {
    pub idade: i64,
    pub sexo_masculino: bool,
    pub imc: f64,
    pub fumante: bool,
    pub pratica_exercicio: bool,
    pub score_saude: f64,
    pub condicoes_cronicas: Vec<String>,
    pub num_medicamentos: usize,
    pub historico_familiar: Vec<String>,
    pub internacoes_12m: i64,
    pub consultas_12m: i64,
    pub exames_12m: i64,
    pub custo_12m: f64,
    pub dias_ultima_consulta: i64,
}

impl RiskFeatures {
    pub fn from_documents(idade: Option<i64>, dados_saude: &Value, dados_utilizacao: &Value) -> Self {
        let text_list = |key: &str| -> Vec<String> {
            dados_saude
                .get(key)
                .and_then(|x| x.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|x| x.as_str())
                        .map(|x| x.to_ascii_uppercase())
                        .collect()
                })
                .unwrap_or_default()
        };
        let flag = |key: &str| dados_saude.get(key).and_then(|x| x.as_bool()).unwrap_or(false);
        let usage = |key: &str| dados_utilizacao.get(key).and_then(|x| x.as_i64());

        Self {
            idade: idade
                .or_else(|| dados_saude.get("idade").and_then(|x| x.as_i64()))
                .unwrap_or(0),
            sexo_masculino: dados_saude.get("sexo").and_then(|x| x.as_str()) == Some("M"),
            imc: dados_saude.get("imc").and_then(|x| x.as_f64()).unwrap_or(25.0),
            fumante: flag("fumante"),
            pratica_exercicio: flag("pratica_exercicio"),
            score_saude: dados_saude
                .get("score_saude")
                .and_then(|x| x.as_f64())
                .unwrap_or(50.0),
            condicoes_cronicas: text_list("condicoes_preexistentes"),
            num_medicamentos: dados_saude
                .get("medicamentos_uso")
                .and_then(|x| x.as_array())
                .map(|x| x.len())
                .unwrap_or(0),
            historico_familiar: text_list("historico_familiar"),
            internacoes_12m: usage("internacoes_12m").unwrap_or(0),
            consultas_12m: usage("consultas_12m").unwrap_or(0),
            exames_12m: usage("exames_12m").unwrap_or(0),
            custo_12m: dados_utilizacao
                .get("custo_12m")
                .and_then(|x| x.as_f64())
                .unwrap_or(0.0),
            dias_ultima_consulta: usage("dias_ultima_consulta").unwrap_or(365),
        }
    }

    fn has_condition(&self, condition: &str) -> bool {
        self.condicoes_cronicas.iter().any(|x| x == condition)
    }
}

/// Scores the risk of a beneficiary in `[0, 1]`.
pub trait RiskModel: Send + Sync {
    fn version(&self) -> &str;

    fn score(&self, features: &RiskFeatures) -> CareResult<f64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum RiskLevel {
    Baixo,
    Moderado,
    Alto,
    Complexo,
}

impl RiskLevel {
    pub fn classify(score: f64, thresholds: &RiskProperties) -> Self {
        if score >= thresholds.complex_threshold {
            RiskLevel::Complexo
        } else if score >= thresholds.high_threshold {
            RiskLevel::Alto
        } else if score >= thresholds.medium_threshold {
            RiskLevel::Moderado
        } else {
            RiskLevel::Baixo
        }
    }
}

/// Additive point table used where no trained model is deployed.
pub struct RuleBasedRiskModel {
    version: String,
}

impl RuleBasedRiskModel {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl RiskModel for RuleBasedRiskModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn score(&self, features: &RiskFeatures) -> CareResult<f64> {
        let mut score = 0.0;

        score += match features.idade {
            i if i >= 75 => 0.25,
            i if i >= 65 => 0.15,
            i if i >= 55 => 0.08,
            _ => 0.0,
        };

        score += (features.condicoes_cronicas.len() as f64 * 0.12).min(0.36);
        if features.has_condition("DIABETES") {
            score += 0.10;
        }
        if features.has_condition("HIPERTENSAO") {
            score += 0.08;
        }
        if features.has_condition("CARDIACO") {
            score += 0.15;
        }

        score += match features.num_medicamentos {
            n if n >= 5 => 0.10,
            n if n >= 3 => 0.05,
            _ => 0.0,
        };

        score += match features.internacoes_12m {
            n if n >= 2 => 0.20,
            n if n >= 1 => 0.10,
            _ => 0.0,
        };

        if features.score_saude < 40.0 {
            score += 0.10;
        } else if features.score_saude < 60.0 {
            score += 0.05;
        }

        if features.fumante {
            score += 0.08;
        }
        if !features.pratica_exercicio {
            score += 0.05;
        }

        if features.imc >= 35.0 {
            score += 0.10;
        } else if features.imc >= 30.0 {
            score += 0.05;
        }

        Ok(f64::min(score, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn score(idade: i64, saude: Value, utilizacao: Value) -> f64 {
        let features = RiskFeatures::from_documents(Some(idade), &saude, &utilizacao);
        RuleBasedRiskModel::new("1.0.0").score(&features).unwrap()
    }

    #[test]
    fn healthy_adult_scores_low() {
        let s = score(
            30,
            json!({"pratica_exercicio": true, "score_saude": 80}),
            json!({}),
        );
        assert!(s.abs() < 1e-9);
        assert_eq!(RiskLevel::classify(s, &RiskProperties::default()), RiskLevel::Baixo);
    }

    #[test]
    fn chronic_elderly_patient_is_complex() {
        let s = score(
            80,
            json!({
                "condicoes_preexistentes": ["diabetes", "HIPERTENSAO", "CARDIACO"],
                "medicamentos_uso": ["a", "b", "c", "d", "e"],
                "fumante": true,
                "imc": 36.0
            }),
            json!({"internacoes_12m": 2}),
        );
        assert_eq!(s, 1.0);
        assert_eq!(RiskLevel::classify(s, &RiskProperties::default()), RiskLevel::Complexo);
        assert_eq!(RiskLevel::Complexo.as_ref(), "COMPLEXO");
    }

    #[test]
    fn age_falls_back_to_the_screening_document() {
        let features = RiskFeatures::from_documents(None, &json!({"idade": 67}), &json!({}));
        assert_eq!(features.idade, 67);
        assert_eq!(features.dias_ultima_consulta, 365);
        assert_eq!(features.imc, 25.0);
    }

    #[test]
    fn thresholds_come_from_configuration() {
        let thresholds = RiskProperties {
            high_threshold: 0.5,
            ..RiskProperties::default()
        };
        assert_eq!(RiskLevel::classify(0.55, &thresholds), RiskLevel::Alto);
        assert_eq!(RiskLevel::classify(0.45, &thresholds), RiskLevel::Moderado);
    }
}
