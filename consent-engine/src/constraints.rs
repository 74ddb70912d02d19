//! Constraint evaluators.
//!
//! Each evaluator returns `None` when the action complies *or* when the
//! constraint cannot be evaluated (missing keys, unparsable numbers or dates).
//! "Cannot evaluate" is never reported as a breach. The one exception is
//! `approval_required`, where the absence of an approval is itself the breach.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

use ledger_chain::{ActionRecord, ConsentConstraint, ConstraintType};

use crate::types::{ConsentViolation, MatchContext, ViolationSeverity};

/// Parameter keys holding an action's monetary amount, in priority order.
pub const AMOUNT_KEYS: &[&str] = &["amount", "value", "cost"];
/// Parameter keys holding an action's domain, in priority order.
pub const DOMAIN_KEYS: &[&str] = &["domain", "category", "type"];
/// Parameter keys holding an action's recipient, in priority order.
pub const RECIPIENT_KEYS: &[&str] = &["recipient", "to", "payee"];
/// Parameter keys holding an approval flag, in priority order.
pub const APPROVAL_KEYS: &[&str] = &["approval_obtained", "approved"];

/// Evaluate one constraint against an action.
pub fn evaluate_constraint(
    constraint: &ConsentConstraint,
    authorisation_id: &str,
    action: &ActionRecord,
    context: &MatchContext,
) -> Option<ConsentViolation> {
    match constraint.constraint_type {
        ConstraintType::MonetaryLimit => check_monetary_limit(constraint, action),
        ConstraintType::DomainRestriction => check_domain_restriction(constraint, action),
        ConstraintType::TimeWindow => check_time_window(constraint, action),
        ConstraintType::ApprovalRequired => check_approval_required(constraint, action),
        ConstraintType::RecipientRestriction => check_recipient_restriction(constraint, action),
        ConstraintType::FrequencyLimit => {
            check_frequency_limit(constraint, authorisation_id, context)
        }
        ConstraintType::Custom => check_custom(constraint, action),
    }
}

fn check_monetary_limit(
    constraint: &ConsentConstraint,
    action: &ActionRecord,
) -> Option<ConsentViolation> {
    let limit = parse_number(&constraint.parameter)?;
    let amount = action_amount(action)?;

    if amount <= limit {
        return None;
    }

    let severity = if amount > limit * 1.5 {
        ViolationSeverity::Critical
    } else {
        ViolationSeverity::Major
    };

    Some(ConsentViolation::new(
        ConstraintType::MonetaryLimit,
        format!("at most {}", limit),
        amount.to_string(),
        severity,
        format!("Amount {} exceeds the authorised limit of {}", amount, limit),
    ))
}

fn check_domain_restriction(
    constraint: &ConsentConstraint,
    action: &ActionRecord,
) -> Option<ConsentViolation> {
    let allowed = allowed_tokens(&constraint.parameter);
    if allowed.is_empty() {
        return None;
    }
    let domain = action_domain(action)?;

    if token_allowed(&domain, &allowed) {
        return None;
    }

    Some(ConsentViolation::new(
        ConstraintType::DomainRestriction,
        allowed.join(", "),
        domain.clone(),
        ViolationSeverity::Major,
        format!("Domain '{}' is outside the authorised domains", domain),
    ))
}

fn check_time_window(
    constraint: &ConsentConstraint,
    action: &ActionRecord,
) -> Option<ConsentViolation> {
    let window = TimeWindow::parse(&constraint.parameter)?;
    let at = action.created_at;

    if window.contains(at) {
        return None;
    }

    Some(ConsentViolation::new(
        ConstraintType::TimeWindow,
        constraint.parameter.trim().to_string(),
        at.to_rfc3339(),
        ViolationSeverity::Major,
        format!("Action at {} falls outside the authorised window", at.to_rfc3339()),
    ))
}

fn check_approval_required(
    _constraint: &ConsentConstraint,
    action: &ActionRecord,
) -> Option<ConsentViolation> {
    // Only the highest-priority key present counts.
    let approval = action.lookup(APPROVAL_KEYS, Some);
    if approval.is_some_and(is_true) {
        return None;
    }

    let actual = approval
        .map(display_value)
        .unwrap_or_else(|| "missing".to_string());

    Some(ConsentViolation::new(
        ConstraintType::ApprovalRequired,
        "true",
        actual,
        ViolationSeverity::Major,
        "Action taken without the required approval",
    ))
}

fn check_recipient_restriction(
    constraint: &ConsentConstraint,
    action: &ActionRecord,
) -> Option<ConsentViolation> {
    let allowed = allowed_tokens(&constraint.parameter);
    if allowed.is_empty() {
        return None;
    }
    let recipient = action.lookup(RECIPIENT_KEYS, non_empty_token)?;

    if token_allowed(&recipient, &allowed) {
        return None;
    }

    Some(ConsentViolation::new(
        ConstraintType::RecipientRestriction,
        allowed.join(", "),
        recipient.clone(),
        ViolationSeverity::Critical,
        format!("Recipient '{}' is not an authorised recipient", recipient),
    ))
}

fn check_frequency_limit(
    constraint: &ConsentConstraint,
    authorisation_id: &str,
    context: &MatchContext,
) -> Option<ConsentViolation> {
    let limit = context
        .frequency_limits
        .get(authorisation_id)
        .copied()
        .or_else(|| parse_count(&constraint.parameter))?;
    let count = context.action_counts.get(authorisation_id).copied()?;

    if count <= limit {
        return None;
    }

    let severity = if count > limit.saturating_mul(2) {
        ViolationSeverity::Critical
    } else {
        ViolationSeverity::Major
    };

    Some(ConsentViolation::new(
        ConstraintType::FrequencyLimit,
        format!("at most {} per period", limit),
        count.to_string(),
        severity,
        format!("{} actions this period exceed the limit of {}", count, limit),
    ))
}

fn check_custom(constraint: &ConsentConstraint, action: &ActionRecord) -> Option<ConsentViolation> {
    let required = constraint.description.trim().to_lowercase();
    if required.is_empty() {
        return None;
    }

    if action.description.to_lowercase().contains(&required) {
        return None;
    }

    Some(ConsentViolation::new(
        ConstraintType::Custom,
        constraint.description.clone(),
        action.description.clone(),
        ViolationSeverity::Minor,
        format!("Action description does not reflect '{}'", constraint.description),
    ))
}

/// Parse a numeric parameter, tolerating a currency prefix and thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['$', '£', '€'])
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    let value: f64 = cleaned.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_count(raw: &str) -> Option<u64> {
    let value = parse_number(raw)?;
    (value >= 0.0).then(|| value.floor() as u64)
}

/// A JSON number, or a string holding one.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// The action's monetary amount, from the first usable amount key.
pub fn action_amount(action: &ActionRecord) -> Option<f64> {
    action.lookup(AMOUNT_KEYS, numeric_value)
}

/// The action's domain token, lowercased.
pub fn action_domain(action: &ActionRecord) -> Option<String> {
    action.lookup(DOMAIN_KEYS, non_empty_token)
}

fn non_empty_token(value: &Value) -> Option<String> {
    let token = value.as_str()?.trim().to_lowercase();
    (!token.is_empty()).then_some(token)
}

/// Split a comma list into lowercased, non-empty tokens.
pub fn allowed_tokens(parameter: &str) -> Vec<String> {
    parameter
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether `token` and some allowed token are substrings of one another.
///
/// Both sides are expected to be lowercased already.
pub fn token_allowed(token: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .any(|a| a.contains(token) || token.contains(a.as_str()))
}

fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A parsed `time_window` parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeWindow {
    /// Absolute `[start, end]`
    Between(DateTime<Utc>, DateTime<Utc>),
    /// Daily time-of-day window in UTC; wraps midnight when `start > end`
    Daily(NaiveTime, NaiveTime),
}

impl TimeWindow {
    fn parse(parameter: &str) -> Option<Self> {
        let (start, end) = parameter.trim().split_once('/')?;
        let (start, end) = (start.trim(), end.trim());

        if let (Some(start), Some(end)) = (parse_instant(start), parse_instant(end)) {
            return Some(Self::Between(start, end));
        }
        if let (Some(start), Some(end)) = (parse_time_of_day(start), parse_time_of_day(end)) {
            return Some(Self::Daily(start, end));
        }
        None
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        match *self {
            Self::Between(start, end) => at >= start && at <= end,
            Self::Daily(start, end) => {
                let time = at.time();
                if start <= end {
                    time >= start && time <= end
                } else {
                    time >= start || time <= end
                }
            }
        }
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}
