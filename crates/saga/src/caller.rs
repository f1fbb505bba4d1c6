//! Who is driving a checkout operation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    #[default]
    Customer,
    /// Travel agents may reprice a draft before payment.
    Agent,
    /// Operators reconcile bookings stuck after payment.
    Operator,
}

impl CallerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerRole::Customer => "customer",
            CallerRole::Agent => "agent",
            CallerRole::Operator => "operator",
        }
    }
}

impl std::fmt::Display for CallerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(CallerRole::Customer),
            "agent" => Ok(CallerRole::Agent),
            "operator" => Ok(CallerRole::Operator),
            other => Err(format!("unknown caller role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub role: CallerRole,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Caller {
    pub fn new(role: CallerRole) -> Self {
        Self {
            role,
            user_id: None,
        }
    }

    pub fn customer() -> Self {
        Self::new(CallerRole::Customer)
    }

    pub fn agent() -> Self {
        Self::new(CallerRole::Agent)
    }

    pub fn operator() -> Self {
        Self::new(CallerRole::Operator)
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Agent".parse::<CallerRole>(), Ok(CallerRole::Agent));
        assert_eq!(" operator ".parse::<CallerRole>(), Ok(CallerRole::Operator));
        assert!("admin".parse::<CallerRole>().is_err());
    }
}
