use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::warn;

use crate::error::{Error, Result};
use crate::pattern::{alphanumeric, Pattern};
use crate::schema::{Choice, Field, FieldType, LengthRule, NumberRule, RegexKind, Rule, TextRule};

/// Value forms expect when the "Other" option is ticked.
pub const OTHER_OPTION: &str = "__other_option__";

const EMAIL_DOMAINS: [&str; 4] = ["yahoo.com", "hotmail.com", "outlook.net", "gmail.com"];
const URL_PATTERN: &str = r"https?://[a-zA-Z0-9-]{2,9}\.[a-zA-Z0-9-]{2,60}\.[a-zA-Z]{2,7}";

const NUMBER_CEILING: i64 = 5000;
/// Candidates for the equality style number rules.
const SMALL_NUMBERS: RangeInclusive<i64> = 1..=19;
const YEARS: RangeInclusive<u32> = 1..=2022;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Drop every field the form does not mark as required.
    pub required_only: bool,
    /// Length of filler text where no validator dictates content.
    pub garbage_length: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            required_only: false,
            garbage_length: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    One(String),
    Many(Vec<String>),
}

impl Answer {
    pub fn values(&self) -> &[String] {
        match self {
            Answer::One(value) => std::slice::from_ref(value),
            Answer::Many(values) => values,
        }
    }
}

pub type Payload = BTreeMap<String, Answer>;

/// Flatten a payload into form-encoding pairs. Lists become repeated keys.
pub fn form_pairs(payload: &Payload) -> Vec<(String, String)> {
    payload
        .iter()
        .flat_map(|(key, answer)| answer.values().iter().map(move |value| (key.clone(), value.clone())))
        .collect()
}

/// One generated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub payload: Payload,
    /// Fields left out because their validation has no usable operand.
    pub skipped: Vec<u64>,
}

/// Produces fresh payloads for a scraped form.
#[derive(Debug)]
pub struct Generator {
    fields: Vec<Field>,
    policy: Policy,
    patterns: HashMap<u64, Pattern>,
}

impl Generator {
    pub fn new(fields: Vec<Field>, policy: Policy) -> Result<Self> {
        let fields: Vec<Field> = if policy.required_only {
            fields.into_iter().filter(|field| field.required).collect()
        } else {
            fields
        };

        let mut patterns = HashMap::new();
        for field in &fields {
            let compiled = match field.rule() {
                Some(Rule::Regex(rule)) => Pattern::new(&rule.pattern),
                Some(Rule::Text(TextRule::NotContains(text))) => Pattern::literal(text),
                Some(Rule::Text(TextRule::Url)) => Pattern::new(URL_PATTERN),
                _ => continue,
            };
            let pattern = compiled.map_err(|reason| Error::InvalidPattern { id: field.id, reason })?;
            patterns.insert(field.id, pattern);
        }

        Ok(Self {
            fields,
            policy,
            patterns,
        })
    }

    /// Fields that take part in generation, after the policy filter.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Submission> {
        let mut payload = Payload::new();
        let mut skipped = Vec::new();

        for field in &self.fields {
            match field.kind {
                FieldType::Time => time(field, false, &mut payload, rng),
                FieldType::Date => date(field, &mut payload, rng),
                _ if field.rule() == Some(&Rule::Unresolved) => {
                    warn!(
                        id = field.id,
                        kind = ?field.kind,
                        "detected field with validation but no validator, skipping this field"
                    );
                    skipped.push(field.id);
                }
                _ => {
                    let answer = self.answer(field, &mut payload, rng)?;
                    payload.insert(field.entry_key(), answer);
                }
            }
        }

        Ok(Submission { payload, skipped })
    }

    fn answer<R: Rng + ?Sized>(&self, field: &Field, payload: &mut Payload, rng: &mut R) -> Result<Answer> {
        use FieldType::{Checkboxes, Paragraph, ShortAnswer};

        let text = match (field.kind, field.rule()) {
            (ShortAnswer | Paragraph, Some(Rule::Regex(rule))) => self.regex(field.id, rule.kind, rng)?,
            (ShortAnswer | Paragraph, Some(Rule::Length(rule))) => match *rule {
                LengthRule::MaxChars(bound) => alphanumeric(rng, bound.saturating_sub(1)),
                LengthRule::MinChars(bound) => {
                    let len = bound.checked_add(1).ok_or_else(|| Error::InvalidOperand {
                        id: field.id,
                        operand: bound.to_string(),
                    })?;
                    alphanumeric(rng, len)
                }
            },
            (ShortAnswer, Some(Rule::Text(rule))) => self.text(field.id, rule, rng)?,
            (ShortAnswer, Some(Rule::Number(rule))) => number(field.id, rule, rng)?.to_string(),
            (ShortAnswer | Paragraph, _) => self.garbage(rng),
            (Checkboxes, Some(Rule::CheckboxSelect(rule))) => {
                return self.select(field, rule.count, payload, rng)
            }
            _ => return Ok(self.pick(field, payload, rng)),
        };
        Ok(Answer::One(text))
    }

    fn garbage<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        alphanumeric(rng, self.policy.garbage_length)
    }

    fn pattern(&self, id: u64) -> Result<&Pattern> {
        self.patterns.get(&id).ok_or_else(|| Error::Unsatisfiable {
            id,
            reason: "pattern was never compiled".to_string(),
        })
    }

    fn regex<R: Rng + ?Sized>(&self, id: u64, kind: RegexKind, rng: &mut R) -> Result<String> {
        let pattern = self.pattern(id)?;
        let text = if kind.is_negated() {
            pattern.sample_avoiding(rng, self.policy.garbage_length)
        } else {
            pattern.sample(rng)
        };
        text.ok_or_else(|| Error::Unsatisfiable {
            id,
            reason: format!("could not synthesise a string for {kind:?}"),
        })
    }

    fn text<R: Rng + ?Sized>(&self, id: u64, rule: &TextRule, rng: &mut R) -> Result<String> {
        match rule {
            TextRule::Email => {
                let local = self.garbage(rng);
                let domain = EMAIL_DOMAINS[rng.random_range(0..EMAIL_DOMAINS.len())];
                Ok(format!("{local}@{domain}"))
            }
            TextRule::Url => self.regex(id, RegexKind::Match, rng),
            TextRule::Contains(text) => Ok(text.clone()),
            TextRule::NotContains(_) => self.regex(id, RegexKind::NotContains, rng),
        }
    }

    /// Draw `count` distinct choices without replacement.
    fn select<R: Rng + ?Sized>(
        &self,
        field: &Field,
        count: usize,
        payload: &mut Payload,
        rng: &mut R,
    ) -> Result<Answer> {
        if count > field.choices.len() {
            return Err(Error::SelectionOverflow {
                id: field.id,
                requested: count,
                available: field.choices.len(),
            });
        }
        let mut pool: Vec<&Choice> = field.choices.iter().collect();
        pool.shuffle(rng);
        let picked = pool[..count]
            .iter()
            .map(|choice| self.label(field, choice, payload, rng))
            .collect();
        Ok(Answer::Many(picked))
    }

    fn pick<R: Rng + ?Sized>(&self, field: &Field, payload: &mut Payload, rng: &mut R) -> Answer {
        match field.choices.choose(rng) {
            Some(choice) => Answer::One(self.label(field, choice, payload, rng)),
            None => Answer::One(self.garbage(rng)),
        }
    }

    /// Submitted value for a chosen option; "Other" also gets its free text.
    fn label<R: Rng + ?Sized>(&self, field: &Field, choice: &Choice, payload: &mut Payload, rng: &mut R) -> String {
        if !choice.is_other() {
            return choice.label.clone();
        }
        payload.insert(
            format!("{}.other_option_response", field.entry_key()),
            Answer::One(self.garbage(rng)),
        );
        OTHER_OPTION.to_string()
    }
}

fn put(payload: &mut Payload, field: &Field, suffix: &str, value: String) {
    payload.insert(format!("{}_{suffix}", field.entry_key()), Answer::One(value));
}

fn time<R: Rng + ?Sized>(field: &Field, with_date: bool, payload: &mut Payload, rng: &mut R) {
    put(payload, field, "hour", format!("{:02}", rng.random_range(0..=23u32)));
    put(payload, field, "minute", format!("{:02}", rng.random_range(0..=59u32)));
    // a date's extended flag adds hours and minutes, a time's adds seconds
    if field.extended && !with_date {
        put(payload, field, "second", format!("{:02}", rng.random_range(0..=59u32)));
    }
}

/// Day and month are drawn independently, so impossible dates like 31 February happen.
fn date<R: Rng + ?Sized>(field: &Field, payload: &mut Payload, rng: &mut R) {
    put(payload, field, "year", rng.random_range(YEARS).to_string());
    put(payload, field, "month", rng.random_range(1..=12u32).to_string());
    put(payload, field, "day", rng.random_range(1..=31u32).to_string());
    if field.extended {
        time(field, true, payload, rng);
    }
}

fn number<R: Rng + ?Sized>(id: u64, rule: &NumberRule, rng: &mut R) -> Result<i64> {
    let value = match *rule {
        NumberRule::GreaterThan(v) => {
            let low = v.saturating_sub(1);
            rng.random_range(low..=NUMBER_CEILING.max(low))
        }
        NumberRule::GreaterThanOrEqualTo(v) => rng.random_range(v..=NUMBER_CEILING.max(v)),
        NumberRule::LessThan(v) => {
            let high = v.saturating_sub(1);
            rng.random_range(high.min(0)..=high)
        }
        NumberRule::LessThanOrEqualTo(v) => rng.random_range(v.min(0)..=v),
        NumberRule::EqualTo(v) => small_number(id, rng, |n| n == v)?,
        NumberRule::NotEqualTo(v) => small_number(id, rng, |n| n != v)?,
        NumberRule::IsNumber | NumberRule::WholeNumber => 1,
        NumberRule::Between(left, right) => {
            if left > right {
                return Err(Error::Unsatisfiable {
                    id,
                    reason: format!("empty range {left}..={right}"),
                });
            }
            rng.random_range(left..=right)
        }
        NumberRule::NotBetween(left, right) => small_number(id, rng, |n| !(left..right).contains(&n))?,
    };
    Ok(value)
}

fn small_number<R, F>(id: u64, rng: &mut R, keep: F) -> Result<i64>
where
    R: Rng + ?Sized,
    F: Fn(i64) -> bool,
{
    let candidates: Vec<i64> = SMALL_NUMBERS.filter(|n| keep(*n)).collect();
    candidates.choose(rng).copied().ok_or_else(|| Error::Unsatisfiable {
        id,
        reason: format!("no candidate in {SMALL_NUMBERS:?} fits"),
    })
}
