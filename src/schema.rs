use crate::error::{Error, Result};

/// Question kinds, keyed by the code forms serialize at position 3 of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    ShortAnswer,
    Paragraph,
    MultipleChoice,
    Dropdown,
    Checkboxes,
    LinearScale,
    MultipleChoiceGrid,
    CheckboxGrid,
    Date,
    Time,
}

impl FieldType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => FieldType::ShortAnswer,
            1 => FieldType::Paragraph,
            2 => FieldType::MultipleChoice,
            3 => FieldType::Dropdown,
            4 => FieldType::Checkboxes,
            5 => FieldType::LinearScale,
            7 => FieldType::MultipleChoiceGrid,
            8 => FieldType::CheckboxGrid,
            9 => FieldType::Date,
            10 => FieldType::Time,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorType {
    Number,
    Text,
    Length,
    Regex,
    ParagraphLength,
    CheckboxSelect,
}

impl ValidatorType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => ValidatorType::Number,
            2 => ValidatorType::Text,
            3 => ValidatorType::Length,
            4 => ValidatorType::Regex,
            6 => ValidatorType::ParagraphLength,
            7 => ValidatorType::CheckboxSelect,
            _ => return None,
        })
    }

    /// Whether a validator of this type can carry `sub_kind`.
    pub fn accepts(self, sub_kind: ValidatorSubType) -> bool {
        use ValidatorSubType::*;
        match self {
            ValidatorType::Number => matches!(
                sub_kind,
                GreaterThan
                    | GreaterThanOrEqualTo
                    | LessThan
                    | LessThanOrEqualTo
                    | EqualTo
                    | NotEqualTo
                    | Between
                    | NotBetween
                    | IsNumber
                    | WholeNumber
            ),
            ValidatorType::Text => matches!(sub_kind, Contains | NotContains | Email | Url),
            ValidatorType::Length | ValidatorType::ParagraphLength => {
                matches!(sub_kind, MaxCharCount | MinCharCount)
            }
            ValidatorType::Regex => matches!(
                sub_kind,
                RegexContains | RegexNotContains | RegexMatch | RegexNotMatch
            ),
            ValidatorType::CheckboxSelect => {
                matches!(sub_kind, SelectAtLeast | SelectAtMost | SelectExactly)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorSubType {
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    EqualTo,
    NotEqualTo,
    Between,
    NotBetween,
    IsNumber,
    WholeNumber,

    Contains,
    NotContains,
    Email,
    Url,

    SelectAtLeast,
    SelectAtMost,
    SelectExactly,

    MaxCharCount,
    MinCharCount,

    RegexContains,
    RegexNotContains,
    RegexMatch,
    RegexNotMatch,
}

impl ValidatorSubType {
    pub fn from_code(code: i64) -> Option<Self> {
        use ValidatorSubType::*;
        Some(match code {
            1 => GreaterThan,
            2 => GreaterThanOrEqualTo,
            3 => LessThan,
            4 => LessThanOrEqualTo,
            5 => EqualTo,
            6 => NotEqualTo,
            7 => Between,
            8 => NotBetween,
            9 => IsNumber,
            10 => WholeNumber,
            100 => Contains,
            101 => NotContains,
            102 => Email,
            103 => Url,
            200 => SelectAtLeast,
            201 => SelectAtMost,
            204 => SelectExactly,
            202 => MaxCharCount,
            203 => MinCharCount,
            299 => RegexContains,
            300 => RegexNotContains,
            301 => RegexMatch,
            302 => RegexNotMatch,
            _ => return None,
        })
    }

    /// Sub-types that constrain the answer without needing an operand.
    pub fn is_self_describing(self) -> bool {
        matches!(
            self,
            ValidatorSubType::Url
                | ValidatorSubType::Email
                | ValidatorSubType::IsNumber
                | ValidatorSubType::WholeNumber
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberRule {
    GreaterThan(i64),
    GreaterThanOrEqualTo(i64),
    LessThan(i64),
    LessThanOrEqualTo(i64),
    EqualTo(i64),
    NotEqualTo(i64),
    Between(i64, i64),
    NotBetween(i64, i64),
    IsNumber,
    WholeNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRule {
    Contains(String),
    NotContains(String),
    Email,
    Url,
}

/// Largest character count a length validator may ask for.
pub const CHAR_COUNT_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    MaxChars(usize),
    MinChars(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexKind {
    Contains,
    NotContains,
    Match,
    NotMatch,
}

impl RegexKind {
    pub fn is_negated(self) -> bool {
        matches!(self, RegexKind::NotContains | RegexKind::NotMatch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexRule {
    pub kind: RegexKind,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    AtLeast,
    AtMost,
    Exactly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectRule {
    pub kind: SelectKind,
    pub count: usize,
}

/// A validator resolved into exactly the operands its generation strategy needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Number(NumberRule),
    Text(TextRule),
    Length(LengthRule),
    Regex(RegexRule),
    CheckboxSelect(SelectRule),
    /// Validation is declared but the form shipped no operand for a sub-type that needs one.
    Unresolved,
}

impl Rule {
    /// Build the rule for a declared `(kind, sub_kind)` pair from its raw operands.
    pub fn resolve(
        id: u64,
        kind: ValidatorType,
        sub_kind: ValidatorSubType,
        args: &[String],
    ) -> Result<Rule> {
        if !kind.accepts(sub_kind) {
            return Err(Error::UnsupportedValidator { id, kind, sub_kind });
        }

        let operands: Vec<&str> = args
            .iter()
            .map(|arg| arg.trim())
            .filter(|arg| !arg.is_empty())
            .collect();

        if operands.is_empty() && !sub_kind.is_self_describing() {
            return Ok(Rule::Unresolved);
        }

        let integer = |at: usize| -> Result<i64> {
            let raw = operands.get(at).copied().unwrap_or_default();
            raw.parse().map_err(|_| Error::InvalidOperand {
                id,
                operand: raw.to_string(),
            })
        };
        let count = |at: usize| -> Result<usize> {
            let raw = operands.get(at).copied().unwrap_or_default();
            raw.parse().map_err(|_| Error::InvalidOperand {
                id,
                operand: raw.to_string(),
            })
        };
        let length = |at: usize| -> Result<usize> {
            count(at).and_then(|bound| match bound {
                0..=CHAR_COUNT_LIMIT => Ok(bound),
                _ => Err(Error::InvalidOperand {
                    id,
                    operand: bound.to_string(),
                }),
            })
        };
        let pattern = |kind: RegexKind| -> Rule {
            Rule::Regex(RegexRule {
                kind,
                pattern: first_raw(args),
            })
        };

        use ValidatorSubType::*;
        let rule = match sub_kind {
            GreaterThan => Rule::Number(NumberRule::GreaterThan(integer(0)?)),
            GreaterThanOrEqualTo => Rule::Number(NumberRule::GreaterThanOrEqualTo(integer(0)?)),
            LessThan => Rule::Number(NumberRule::LessThan(integer(0)?)),
            LessThanOrEqualTo => Rule::Number(NumberRule::LessThanOrEqualTo(integer(0)?)),
            EqualTo => Rule::Number(NumberRule::EqualTo(integer(0)?)),
            NotEqualTo => Rule::Number(NumberRule::NotEqualTo(integer(0)?)),
            Between => Rule::Number(NumberRule::Between(integer(0)?, integer(1)?)),
            NotBetween => Rule::Number(NumberRule::NotBetween(integer(0)?, integer(1)?)),
            IsNumber => Rule::Number(NumberRule::IsNumber),
            WholeNumber => Rule::Number(NumberRule::WholeNumber),

            // text and patterns are taken verbatim, untrimmed
            Contains => Rule::Text(TextRule::Contains(first_raw(args))),
            NotContains => Rule::Text(TextRule::NotContains(first_raw(args))),
            Email => Rule::Text(TextRule::Email),
            Url => Rule::Text(TextRule::Url),

            MaxCharCount => Rule::Length(LengthRule::MaxChars(length(0)?)),
            MinCharCount => Rule::Length(LengthRule::MinChars(length(0)?)),

            RegexContains => pattern(RegexKind::Contains),
            RegexNotContains => pattern(RegexKind::NotContains),
            RegexMatch => pattern(RegexKind::Match),
            RegexNotMatch => pattern(RegexKind::NotMatch),

            SelectAtLeast => select(SelectKind::AtLeast, count(0)?),
            SelectAtMost => select(SelectKind::AtMost, count(0)?),
            SelectExactly => select(SelectKind::Exactly, count(0)?),
        };
        Ok(rule)
    }
}

fn select(kind: SelectKind, count: usize) -> Rule {
    Rule::CheckboxSelect(SelectRule { kind, count })
}

fn first_raw(args: &[String]) -> String {
    args.iter()
        .find(|arg| !arg.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

/// A declared response validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub kind: ValidatorType,
    pub sub_kind: ValidatorSubType,
    /// Operands as serialized; empty entries are kept.
    pub args: Vec<String>,
    /// Message shown by the form on failure. Not used for generation.
    pub error_message: Option<String>,
    pub rule: Rule,
}

/// One selectable option. An empty label is the form's "Other" slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
}

impl Choice {
    pub fn is_other(&self) -> bool {
        self.label.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Submission key is `entry.<id>`.
    pub id: u64,
    pub kind: FieldType,
    pub name: String,
    pub choices: Vec<Choice>,
    pub validation: Option<Validation>,
    pub required: bool,
    /// Date carries a time, or time carries seconds.
    pub extended: bool,
}

impl Field {
    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }

    pub fn rule(&self) -> Option<&Rule> {
        self.validation.as_ref().map(|validation| &validation.rule)
    }

    pub fn entry_key(&self) -> String {
        format!("entry.{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_codes() {
        assert_eq!(FieldType::from_code(10), Some(FieldType::Time));
        assert_eq!(FieldType::from_code(6), None);
        assert_eq!(ValidatorType::from_code(6), Some(ValidatorType::ParagraphLength));
        assert_eq!(ValidatorType::from_code(5), None);
        assert_eq!(ValidatorSubType::from_code(204), Some(ValidatorSubType::SelectExactly));
        assert_eq!(ValidatorSubType::from_code(11), None);
    }

    #[test]
    fn test_resolve_number_rules() {
        assert_eq!(
            Rule::resolve(1, ValidatorType::Number, ValidatorSubType::Between, &args(&["3", "9"])).unwrap(),
            Rule::Number(NumberRule::Between(3, 9))
        );
        assert_eq!(
            Rule::resolve(1, ValidatorType::Number, ValidatorSubType::IsNumber, &[]).unwrap(),
            Rule::Number(NumberRule::IsNumber)
        );
        assert!(matches!(
            Rule::resolve(1, ValidatorType::Number, ValidatorSubType::Between, &args(&["3"])),
            Err(Error::InvalidOperand { id: 1, .. })
        ));
        assert!(matches!(
            Rule::resolve(1, ValidatorType::Number, ValidatorSubType::LessThan, &args(&["2.5"])),
            Err(Error::InvalidOperand { id: 1, .. })
        ));
    }

    #[test]
    fn test_resolve_length_bounds() {
        assert_eq!(
            Rule::resolve(4, ValidatorType::Length, ValidatorSubType::MinCharCount, &args(&[" 12 "])).unwrap(),
            Rule::Length(LengthRule::MinChars(12))
        );
        for huge in ["18446744073709551615", "1000001"] {
            assert!(matches!(
                Rule::resolve(4, ValidatorType::ParagraphLength, ValidatorSubType::MinCharCount, &args(&[huge])),
                Err(Error::InvalidOperand { id: 4, .. })
            ));
        }
        assert!(matches!(
            Rule::resolve(4, ValidatorType::Length, ValidatorSubType::MaxCharCount, &args(&["-1"])),
            Err(Error::InvalidOperand { id: 4, .. })
        ));
    }

    #[test]
    fn test_resolve_without_operand() {
        assert_eq!(
            Rule::resolve(7, ValidatorType::Length, ValidatorSubType::MaxCharCount, &args(&["", ""])).unwrap(),
            Rule::Unresolved
        );
        assert_eq!(
            Rule::resolve(7, ValidatorType::Text, ValidatorSubType::Email, &[]).unwrap(),
            Rule::Text(TextRule::Email)
        );
    }

    #[test]
    fn test_resolve_rejects_impossible_pairs() {
        assert!(matches!(
            Rule::resolve(9, ValidatorType::Number, ValidatorSubType::Email, &[]),
            Err(Error::UnsupportedValidator { id: 9, .. })
        ));
        assert!(matches!(
            Rule::resolve(9, ValidatorType::CheckboxSelect, ValidatorSubType::MaxCharCount, &args(&["2"])),
            Err(Error::UnsupportedValidator { .. })
        ));
    }

    #[test]
    fn test_resolve_text_keeps_operand_verbatim() {
        assert_eq!(
            Rule::resolve(2, ValidatorType::Text, ValidatorSubType::Contains, &args(&[" hi "])).unwrap(),
            Rule::Text(TextRule::Contains(" hi ".to_string()))
        );
        assert_eq!(
            Rule::resolve(2, ValidatorType::Regex, ValidatorSubType::RegexMatch, &args(&["^a+$"])).unwrap(),
            Rule::Regex(RegexRule { kind: RegexKind::Match, pattern: "^a+$".to_string() })
        );
    }
}
