use careflow_common::prelude::*;
use serde_json::Value;

/// Keyed containers of a terminal payload, in search order. `""` is the payload root.
const KEYED_CONTAINERS: [&str; 3] = ["outputs", "output", ""];
/// Container holding a list of `{name, value}` records.
const VARIABLE_LIST: &str = "variables";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Codes and numbers that identify something. Runners often send them as floats
    /// (`95687.0`); they are normalized to integer text.
    Identifier,
    /// Free text, numbers and booleans rendered as their text.
    Text,
}

/// One expected result field and the names it may appear under, most preferred first.
#[derive(Clone, Debug)]
pub struct ResultField {
    pub name: InlineStr,
    pub aliases: Vec<InlineStr>,
    pub kind: FieldKind,
}

impl ResultField {
    pub fn new(name: &str, kind: FieldKind, aliases: &[&str]) -> Self {
        Self {
            name: name.into(),
            aliases: aliases.iter().map(|x| InlineStr::from(*x)).collect(),
            kind,
        }
    }

    pub fn identifier(name: &str, aliases: &[&str]) -> Self {
        Self::new(name, FieldKind::Identifier, aliases)
    }

    pub fn text(name: &str, aliases: &[&str]) -> Self {
        Self::new(name, FieldKind::Text, aliases)
    }
}

/// Pulls a fixed set of fields out of a loosely shaped job payload.
#[derive(Clone, Debug)]
pub struct ResultExtractor {
    fields: Vec<ResultField>,
}

impl ResultExtractor {
    pub fn new(fields: Vec<ResultField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[ResultField] {
        &self.fields
    }

    /// Every field, `None` where no alias carries a non-null value.
    pub fn extract(&self, payload: &Value) -> HashMap<InlineStr, Option<Object>> {
        self.fields
            .iter()
            .map(|field| (field.name.clone(), Self::find(field, payload)))
            .collect()
    }

    /// Every field resolved as absent, for jobs that ended without a usable payload.
    pub fn absent(&self) -> HashMap<InlineStr, Option<Object>> {
        self.fields.iter().map(|x| (x.name.clone(), None)).collect()
    }

    /// Result as process variables; absent fields become explicit nulls so the process sees
    /// every field.
    pub fn to_variables(result: &HashMap<InlineStr, Option<Object>>) -> HashMap<InlineStr, Object> {
        result
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().unwrap_or(Object::Null)))
            .collect()
    }

    fn find(field: &ResultField, payload: &Value) -> Option<Object> {
        for container in KEYED_CONTAINERS {
            let map = match container {
                "" => payload.as_object(),
                name => payload.get(name).and_then(|x| x.as_object()),
            };
            let map = match map {
                Some(map) => map,
                None => continue,
            };
            for alias in &field.aliases {
                if let Some(value) = map.get(alias.as_str()).filter(|x| !x.is_null()) {
                    return Some(Self::convert(field.kind, value));
                }
            }
        }

        let records = payload.get(VARIABLE_LIST).and_then(|x| x.as_array())?;
        for alias in &field.aliases {
            let value = records
                .iter()
                .filter(|x| x.get("name").and_then(|n| n.as_str()) == Some(alias.as_str()))
                .filter_map(|x| x.get("value"))
                .find(|x| !x.is_null());
            if let Some(value) = value {
                return Some(Self::convert(field.kind, value));
            }
        }
        None
    }

    fn convert(kind: FieldKind, value: &Value) -> Object {
        match (kind, value) {
            (_, Value::String(v)) => Object::String(v.as_str().into()),
            (FieldKind::Identifier, Value::Number(v)) => match v.as_i64() {
                Some(v) => Object::String(v.to_string().into()),
                None => match v.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => {
                        Object::String(format!("{}", f as i64).into())
                    }
                    _ => Object::String(v.to_string().into()),
                },
            },
            (_, Value::Number(v)) => Object::String(v.to_string().into()),
            (_, Value::Bool(v)) => Object::String(v.to_string().into()),
            (_, other) => Object::Json(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn guide_extractor() -> ResultExtractor {
        ResultExtractor::new(vec![
            ResultField::identifier(
                "nr_guia_requisicao",
                &["nr_guia_requisicao", "nrGuiaRequisicao", "guia_requisicao"],
            ),
            ResultField::text("status_autorizacao", &["status_autorizacao", "statusAutorizacao"]),
        ])
    }

    #[test]
    fn float_identifier_becomes_integer_text() {
        let result = guide_extractor().extract(&json!({
            "outputs": {"nrGuiaRequisicao": 95687.0, "statusAutorizacao": "Autorizado"}
        }));
        assert_eq!(result["nr_guia_requisicao"], Some(Object::from("95687")));
        assert_eq!(result["status_autorizacao"], Some(Object::from("Autorizado")));
    }

    #[test]
    fn first_alias_wins() {
        let result = guide_extractor().extract(&json!({
            "outputs": {"guia_requisicao": 1, "nr_guia_requisicao": 2}
        }));
        assert_eq!(result["nr_guia_requisicao"], Some(Object::from("2")));
    }

    #[test]
    fn keyed_containers_come_before_variable_records() {
        let result = guide_extractor().extract(&json!({
            "output": {"status_autorizacao": "Negado"},
            "variables": [
                {"name": "status_autorizacao", "value": "Autorizado"},
                {"name": "nrGuiaRequisicao", "value": 777.0}
            ]
        }));
        assert_eq!(result["status_autorizacao"], Some(Object::from("Negado")));
        assert_eq!(result["nr_guia_requisicao"], Some(Object::from("777")));
    }

    #[test]
    fn nulls_and_missing_fields_are_absent() {
        let extractor = guide_extractor();
        let result = extractor.extract(&json!({"outputs": {"statusAutorizacao": null}}));
        assert_eq!(result.len(), 2);
        assert_eq!(result["status_autorizacao"], None);
        assert_eq!(result["nr_guia_requisicao"], None);

        let variables = ResultExtractor::to_variables(&result);
        assert_eq!(variables["nr_guia_requisicao"], Object::Null);
    }

    #[test]
    fn payload_root_is_searched() {
        let result = guide_extractor().extract(&json!({"status_autorizacao": "Analise"}));
        assert_eq!(result["status_autorizacao"], Some(Object::from("Analise")));
    }
}
