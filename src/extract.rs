use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::{parse_config, Literal};
use crate::schema::{Choice, Field, FieldType, Rule, Validation, ValidatorSubType, ValidatorType};

/// Containers carrying a field configuration.
const CONTAINER_SELECTOR: &str = "div[jsmodel]";
const CONFIG_ATTRIBUTE: &str = "data-params";

/// Offsets inside a field entry.
const ENTRY_NAME: usize = 1;
const ENTRY_TYPE: usize = 3;
const ENTRY_RESPONSE: usize = 4;

/// Offsets inside the first response metadata array.
const RESPONSE_ID: usize = 0;
const RESPONSE_CHOICES: usize = 1;
const RESPONSE_REQUIRED: usize = 2;
const RESPONSE_VALIDATORS: usize = 4;
const RESPONSE_TIME_EXTENDED: usize = 6;
const RESPONSE_DATE_EXTENDED: usize = 7;

/// Read every field of a form page, in document order.
pub fn extract_fields(html: &str) -> Result<Vec<Field>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(CONTAINER_SELECTOR).map_err(|e| Error::Parse(e.to_string()))?;

    let mut fields = Vec::new();
    for (index, container) in document.select(&selector).enumerate() {
        let params = container
            .value()
            .attr(CONFIG_ATTRIBUTE)
            .ok_or(Error::MissingConfig(index))?;
        let field = field_from_config(index, params)?;
        debug!(
            id = field.id,
            kind = ?field.kind,
            required = field.required,
            choices = field.choices.len(),
            "extracted field {:?}",
            field.name
        );
        fields.push(field);
    }
    Ok(fields)
}

fn at<'a>(node: &'a Literal, index: usize, container: usize, what: &'static str) -> Result<&'a Literal> {
    node.get(index).ok_or(Error::MalformedField { container, what })
}

/// Build one field from a container's raw `data-params` text.
pub fn field_from_config(container: usize, params: &str) -> Result<Field> {
    let root = parse_config(params)?;
    let entry = at(&root, 0, container, "field entry")?;
    let response = at(entry, ENTRY_RESPONSE, container, "response metadata")?;
    let response = at(response, 0, container, "response metadata")?;

    let id = at(response, RESPONSE_ID, container, "entry id")?
        .as_i64()
        .and_then(|id| u64::try_from(id).ok())
        .ok_or(Error::MalformedField { container, what: "entry id" })?;

    let code = at(entry, ENTRY_TYPE, container, "field type")?
        .as_i64()
        .ok_or(Error::MalformedField { container, what: "field type" })?;
    let kind = FieldType::from_code(code).ok_or(Error::UnknownFieldType { id, code })?;

    let name = entry
        .get(ENTRY_NAME)
        .and_then(Literal::as_str)
        .unwrap_or_default()
        .to_string();

    let extended = match kind {
        FieldType::Date => flag(response, RESPONSE_DATE_EXTENDED),
        FieldType::Time => flag(response, RESPONSE_TIME_EXTENDED),
        _ => false,
    };

    let validation = match response.get(RESPONSE_VALIDATORS).and_then(|v| v.get(0)) {
        Some(metadata) => Some(validation(id, container, metadata)?),
        None => None,
    };

    let required = response.get(RESPONSE_REQUIRED).is_some_and(Literal::is_true);

    let choices = response
        .get(RESPONSE_CHOICES)
        .and_then(Literal::as_array)
        .unwrap_or_default()
        .iter()
        .map(|raw| Choice {
            label: raw.get(0).and_then(Literal::as_str).unwrap_or_default().to_string(),
        })
        .collect();

    Ok(Field {
        id,
        kind,
        name,
        choices,
        validation,
        required,
        extended,
    })
}

fn flag(response: &Literal, index: usize) -> bool {
    response
        .get(index)
        .and_then(|flags| flags.get(0))
        .is_some_and(Literal::is_true)
}

fn validation(id: u64, container: usize, metadata: &Literal) -> Result<Validation> {
    let type_code = at(metadata, 0, container, "validator type")?
        .as_i64()
        .ok_or(Error::MalformedField { container, what: "validator type" })?;
    let sub_code = at(metadata, 1, container, "validator sub-type")?
        .as_i64()
        .ok_or(Error::MalformedField { container, what: "validator sub-type" })?;

    let kind = ValidatorType::from_code(type_code)
        .ok_or(Error::UnknownValidatorType { id, code: type_code })?;
    let sub_kind = ValidatorSubType::from_code(sub_code).ok_or(Error::UnknownValidatorSubType {
        id,
        code: sub_code,
        parent: type_code,
    })?;

    let args: Vec<String> = metadata
        .get(2)
        .and_then(Literal::as_array)
        .unwrap_or_default()
        .iter()
        .map(Literal::operand)
        .collect();
    let error_message = metadata.get(3).and_then(Literal::as_str).map(str::to_string);
    let rule = Rule::resolve(id, kind, sub_kind, &args)?;

    Ok(Validation {
        kind,
        sub_kind,
        args,
        error_message,
        rule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NumberRule, SelectKind, SelectRule};

    /// Wrap field entries the way a form page serializes them.
    fn page(entries: &[&str]) -> String {
        let containers: String = entries
            .iter()
            .map(|entry| {
                format!(
                    "<div jsmodel=\"CP1oW\" data-params=\"%.@.{},null]\"></div>",
                    entry.replace('&', "&amp;").replace('"', "&quot;")
                )
            })
            .collect();
        format!("<html><body><form>{containers}</form></body></html>")
    }

    const AGE: &str = r#"[111,"Age",null,0,[[1001,null,true,null,[[1,2,["10"],"too young"]]]]]"#;
    const COLOURS: &str = r#"[222,"Colours",null,4,[[1002,[["Red"],["Blue"],[""]],false,null,[[7,204,["2"]]]]]]"#;
    const WHEN: &str = r#"[333,"When",null,10,[[1003,null,false,null,[],null,[true]]]]"#;
    const BIRTHDAY: &str = r#"[444,"Birthday",null,9,[[1004,null,true,null,[],null,null,[false]]]]"#;
    const BIO: &str = r#"[555,"true story",null,1,[[1005,null,false,null,[[6,202,[]]]]]]"#;

    #[test]
    fn test_extract_fields_in_document_order() {
        let fields = extract_fields(&page(&[AGE, COLOURS, WHEN, BIRTHDAY, BIO])).unwrap();
        let ids: Vec<u64> = fields.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1001, 1002, 1003, 1004, 1005]);

        let age = &fields[0];
        assert_eq!(age.kind, FieldType::ShortAnswer);
        assert_eq!(age.name, "Age");
        assert!(age.required);
        assert!(!age.has_choices());
        let validation = age.validation.as_ref().unwrap();
        assert_eq!(validation.kind, ValidatorType::Number);
        assert_eq!(validation.sub_kind, ValidatorSubType::GreaterThanOrEqualTo);
        assert_eq!(validation.args, vec!["10".to_string()]);
        assert_eq!(validation.error_message.as_deref(), Some("too young"));
        assert_eq!(validation.rule, Rule::Number(NumberRule::GreaterThanOrEqualTo(10)));

        let colours = &fields[1];
        assert_eq!(colours.kind, FieldType::Checkboxes);
        assert!(!colours.required);
        let labels: Vec<&str> = colours.choices.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Red", "Blue", ""]);
        assert!(colours.choices[2].is_other());
        assert_eq!(
            colours.rule(),
            Some(&Rule::CheckboxSelect(SelectRule { kind: SelectKind::Exactly, count: 2 }))
        );

        assert_eq!(fields[2].kind, FieldType::Time);
        assert!(fields[2].extended);
        assert!(fields[2].validation.is_none());

        assert_eq!(fields[3].kind, FieldType::Date);
        assert!(!fields[3].extended);
    }

    #[test]
    fn test_declared_validation_without_operand() {
        let fields = extract_fields(&page(&[BIO])).unwrap();
        assert_eq!(fields[0].name, "true story");
        let validation = fields[0].validation.as_ref().unwrap();
        assert_eq!(validation.kind, ValidatorType::ParagraphLength);
        assert_eq!(validation.rule, Rule::Unresolved);

        let zero = r#"[666,"Count",null,0,[[1006,null,true,null,[[1,2,[0]]]]]]"#;
        let fields = extract_fields(&page(&[zero])).unwrap();
        assert_eq!(fields[0].rule(), Some(&Rule::Unresolved));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = page(&[AGE, COLOURS, WHEN, BIRTHDAY, BIO]);
        assert_eq!(extract_fields(&html).unwrap(), extract_fields(&html).unwrap());
    }

    #[test]
    fn test_unknown_codes_are_fatal() {
        let unknown_validator = r#"[1,"Q",null,0,[[42,null,false,null,[[5,1,["1"]]]]]]"#;
        assert!(matches!(
            extract_fields(&page(&[unknown_validator])),
            Err(Error::UnknownValidatorType { id: 42, code: 5 })
        ));

        let unknown_sub = r#"[1,"Q",null,0,[[43,null,false,null,[[1,99,["1"]]]]]]"#;
        assert!(matches!(
            extract_fields(&page(&[unknown_sub])),
            Err(Error::UnknownValidatorSubType { id: 43, code: 99, parent: 1 })
        ));

        let unknown_type = r#"[1,"Q",null,6,[[44,null,false]]]"#;
        assert!(matches!(
            extract_fields(&page(&[unknown_type])),
            Err(Error::UnknownFieldType { id: 44, code: 6 })
        ));
    }

    #[test]
    fn test_missing_or_broken_config_is_fatal() {
        let html = "<div jsmodel=\"x\"></div>";
        assert!(matches!(extract_fields(html), Err(Error::MissingConfig(0))));

        let html = "<div jsmodel=\"x\" data-params=\"%.@.[1,2\"></div>";
        assert!(matches!(extract_fields(html), Err(Error::Parse(_))));

        let no_response = r#"[1,"Q",null,0]"#;
        assert!(matches!(
            extract_fields(&page(&[no_response])),
            Err(Error::MalformedField { container: 0, .. })
        ));
    }

    #[test]
    fn test_containers_without_marker_are_ignored() {
        let html = format!("<div data-params=\"junk\"></div>{}", page(&[AGE]));
        assert_eq!(extract_fields(&html).unwrap().len(), 1);
    }
}
