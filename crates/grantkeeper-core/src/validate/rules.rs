use super::{Finding, Rule, RuleContext, ValidationIssue};
use crate::record::{Record, is_currency_amount};
use url::Url;

/// Title must be present and at least `min_title_len` characters
pub struct TitleRule;

impl Rule for TitleRule {
    fn check(&self, record: &Record, ctx: &RuleContext<'_>) -> Option<Finding> {
        let Some(title) = record.title.as_deref() else {
            return Some(Finding::Error(ValidationIssue::new("title", "Title is missing")));
        };

        let len = title.trim().chars().count();
        if len < ctx.config.min_title_len {
            return Some(Finding::Error(ValidationIssue::new(
                "title",
                format!(
                    "Title is too short ({} characters, minimum {})",
                    len, ctx.config.min_title_len
                ),
            )));
        }
        if len > ctx.config.max_title_len {
            return Some(Finding::Warning(ValidationIssue::new(
                "title",
                format!(
                    "Title is unusually long ({} characters, expected at most {})",
                    len, ctx.config.max_title_len
                ),
            )));
        }
        None
    }
}

/// A deadline strictly before the collection date means stale or misread data
pub struct DeadlineRule;

impl Rule for DeadlineRule {
    fn check(&self, record: &Record, _ctx: &RuleContext<'_>) -> Option<Finding> {
        let deadline = record.deadline?;
        let collected = record.collection_date().date_naive();
        if deadline < collected {
            return Some(Finding::Error(ValidationIssue::new(
                "deadline",
                format!("Deadline {} is before collection date {}", deadline, collected),
            )));
        }
        None
    }
}

/// Display amount must look like a currency amount, and numeric bounds
/// must be finite with the minimum no greater than the maximum
pub struct AmountRule;

impl Rule for AmountRule {
    fn check(&self, record: &Record, _ctx: &RuleContext<'_>) -> Option<Finding> {
        if let Some(amount) = record.amount.as_deref()
            && !is_currency_amount(amount)
        {
            return Some(Finding::Error(ValidationIssue::new(
                "amount",
                format!("'{}' is not a recognized currency amount", amount),
            )));
        }

        for (name, bound) in [("minimum", record.amount_min), ("maximum", record.amount_max)] {
            if let Some(value) = bound
                && !value.is_finite()
            {
                return Some(Finding::Error(ValidationIssue::new(
                    "amount",
                    format!("Amount {} {} is not a finite number", name, value),
                )));
            }
        }

        if let (Some(min), Some(max)) = (record.amount_min, record.amount_max)
            && min > max
        {
            return Some(Finding::Error(ValidationIssue::new(
                "amount",
                format!("Amount minimum {} exceeds maximum {}", min, max),
            )));
        }

        let has_bounds = record.amount_min.is_some() || record.amount_max.is_some();
        if has_bounds && record.currency.is_none() {
            return Some(Finding::Warning(ValidationIssue::new(
                "amount",
                "Numeric amount bounds are present without a currency code",
            )));
        }
        None
    }
}

/// URL must be an absolute http(s) URL
pub struct UrlRule;

impl Rule for UrlRule {
    fn check(&self, record: &Record, _ctx: &RuleContext<'_>) -> Option<Finding> {
        let url = record.url.as_deref()?;
        let lower = url.to_lowercase();
        let has_scheme = lower.starts_with("http://") || lower.starts_with("https://");

        if !has_scheme || Url::parse(url).is_err() {
            return Some(Finding::Error(ValidationIssue::new(
                "url",
                format!("'{}' is not an http(s) URL", url),
            )));
        }
        None
    }
}

/// An archived record with the same id but a different title or URL
/// signals an id collision
pub struct DuplicateIdRule;

impl Rule for DuplicateIdRule {
    fn check(&self, record: &Record, ctx: &RuleContext<'_>) -> Option<Finding> {
        let existing = ctx.existing.existing(record.id())?;

        let mut differing = Vec::new();
        if existing.title != record.title {
            differing.push("title");
        }
        if existing.url != record.url {
            differing.push("url");
        }
        if differing.is_empty() {
            return None;
        }

        tracing::debug!(
            "Record {} collides with archived record ({} differs)",
            record.id(),
            differing.join(", ")
        );

        Some(Finding::Error(ValidationIssue::new(
            "id",
            format!(
                "Id '{}' is already archived with a different {}",
                record.id(),
                differing.join(" and ")
            ),
        )))
    }
}
