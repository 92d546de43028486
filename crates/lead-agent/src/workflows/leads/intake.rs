use super::domain::{AttributeKey, AttributeValue, ContactChannel, LeadAttributes};

/// Validation errors raised before a lead is created or amended.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("lead attributes must not be empty")]
    EmptyAttributes,
    #[error("lead attributes contain no recognized field (got: {})", .names.join(", "))]
    NoRecognizedAttributes { names: Vec<String> },
    #[error("mandatory field '{0}' is missing")]
    MissingField(AttributeKey),
    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Guard responsible for rejecting malformed attribute mappings.
#[derive(Debug, Clone, Default)]
pub struct LeadIntakeGuard {
    required_fields: Vec<AttributeKey>,
}

impl LeadIntakeGuard {
    pub fn with_required_fields(required_fields: Vec<AttributeKey>) -> Self {
        Self { required_fields }
    }

    pub fn required_fields(&self) -> &[AttributeKey] {
        &self.required_fields
    }

    /// Validate a full attribute mapping for a new lead.
    pub fn check(&self, attributes: &LeadAttributes) -> Result<(), ValidationError> {
        if attributes.is_empty() {
            return Err(ValidationError::EmptyAttributes);
        }

        if attributes.recognized().next().is_none() {
            return Err(ValidationError::NoRecognizedAttributes {
                names: attributes
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        for key in &self.required_fields {
            match attributes.get_key(*key) {
                Some(value) if !value.is_blank() => {}
                _ => return Err(ValidationError::MissingField(*key)),
            }
        }

        self.check_values(attributes)
    }

    /// Validate an amendment: only the supplied values are checked, and the merged mapping
    /// must still carry every required field.
    pub fn check_amendment(
        &self,
        existing: &LeadAttributes,
        amendment: &LeadAttributes,
    ) -> Result<(), ValidationError> {
        if amendment.is_empty() {
            return Err(ValidationError::EmptyAttributes);
        }
        self.check_values(amendment)?;

        let mut merged = existing.clone();
        merged.merge(amendment.clone());
        self.check(&merged)
    }

    fn check_values(&self, attributes: &LeadAttributes) -> Result<(), ValidationError> {
        for (key, value) in attributes.recognized() {
            match key {
                AttributeKey::Email => check_email(value)?,
                AttributeKey::Channel => check_channel(value)?,
                AttributeKey::Factor(factor) => {
                    if value.factor_value().is_none() {
                        return Err(ValidationError::invalid(
                            factor.key(),
                            format!("'{value}' is not a number or yes/no answer"),
                        ));
                    }
                }
                AttributeKey::Name | AttributeKey::Phone | AttributeKey::Company => {
                    if value.as_text().is_none() {
                        return Err(ValidationError::invalid(key.key(), "expected text"));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_email(value: &AttributeValue) -> Result<(), ValidationError> {
    let Some(email) = value.as_text().map(str::trim) else {
        return Err(ValidationError::invalid("email", "expected text"));
    };
    if email.is_empty() {
        return Ok(());
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(ValidationError::invalid(
            "email",
            format!("'{email}' is not an email address"),
        )),
    }
}

fn check_channel(value: &AttributeValue) -> Result<(), ValidationError> {
    let Some(channel) = value.as_text() else {
        return Err(ValidationError::invalid("channel", "expected text"));
    };
    if channel.trim().is_empty() {
        return Ok(());
    }
    channel
        .parse::<ContactChannel>()
        .map(|_| ())
        .map_err(|err| ValidationError::invalid("channel", err.to_string()))
}
