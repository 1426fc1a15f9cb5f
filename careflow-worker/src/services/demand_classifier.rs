use careflow_common::prelude::*;

/// Structured reading of a free-text request from a beneficiary.
#[derive(Clone, Debug, PartialEq)]
pub struct DemandClassification {
    pub tipo_demanda: InlineStr,
    pub urgencia: InlineStr,
    pub complexidade: InlineStr,
    pub intencao: InlineStr,
    pub confianca: f64,
    pub classificado_por: InlineStr,
}

/// Classifies beneficiary messages. Implementations range from keyword tables to hosted
/// language models; the handler does not care which.
pub trait DemandClassifier: Send + Sync {
    fn classify(&self, message: &str) -> CareResult<DemandClassification>;
}

const EMERGENCY_WORDS: &[&str] = &[
    "emergencia",
    "urgente",
    "dor forte",
    "nao consigo respirar",
    "acidente",
    "sangramento",
    "desmaio",
];
const URGENT_WORDS: &[&str] = &["dor", "febre", "mal estar", "preciso urgente", "rapido"];

const COMPLAINT_WORDS: &[&str] = &[
    "reclamacao",
    "problema",
    "insatisfeito",
    "absurdo",
    "demora",
    "pessimo",
];
const INFORMATION_WORDS: &[&str] = &[
    "status",
    "resultado",
    "como esta",
    "qual",
    "onde",
    "quando",
    "informacao",
    "saber",
];

/// Intents in match priority order.
const INTENTS: &[(&str, &[&str])] = &[
    ("CARTEIRINHA", &["carteirinha", "cartao", "segunda via"]),
    ("BOLETO", &["boleto", "fatura", "pagamento", "mensalidade"]),
    ("STATUS_AUTORIZACAO", &["autorizacao", "guia", "aprovado"]),
    ("AGENDAR", &["agendar", "marcar", "consulta"]),
    ("CANCELAR", &["cancelar", "desmarcar"]),
    ("RESULTADO_EXAME", &["resultado", "exame", "laudo"]),
    ("REDE_CREDENCIADA", &["medico", "clinica", "hospital", "credenciado"]),
    ("COBERTURA", &["cobertura", "carencia", "cobre", "coberto"]),
];

/// Keyword tables, used when no language model is configured.
#[derive(Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub const CLASSIFIED_BY: &'static str = "REGRAS";
    const CONFIDENCE: f64 = 0.6;

    fn mentions(text: &str, words: &[&str]) -> bool {
        words.iter().any(|x| text.contains(x))
    }
}

impl DemandClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> CareResult<DemandClassification> {
        let text = message.to_lowercase();

        let urgencia = if Self::mentions(&text, EMERGENCY_WORDS) {
            "EMERGENCIA"
        } else if Self::mentions(&text, URGENT_WORDS) {
            "URGENTE"
        } else {
            "ROTINA"
        };

        // anything that is neither a complaint nor a question is a task to carry out
        let tipo_demanda = if Self::mentions(&text, COMPLAINT_WORDS) {
            "RECLAMACAO"
        } else if Self::mentions(&text, INFORMATION_WORDS) {
            "INFORMACAO"
        } else {
            "TAREFA"
        };

        let complexidade = match (urgencia, tipo_demanda) {
            ("EMERGENCIA", _) | (_, "RECLAMACAO") => "ALTA",
            ("URGENTE", _) => "MEDIA",
            _ => "BAIXA",
        };

        let intencao = INTENTS
            .iter()
            .find(|(_, words)| Self::mentions(&text, words))
            .map(|(intent, _)| *intent)
            .unwrap_or("GERAL");

        Ok(DemandClassification {
            tipo_demanda: tipo_demanda.into(),
            urgencia: urgencia.into(),
            complexidade: complexidade.into(),
            intencao: intencao.into(),
            confianca: Self::CONFIDENCE,
            classificado_por: Self::CLASSIFIED_BY.into(),
        })
    }
}
