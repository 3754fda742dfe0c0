use crate::error::ValidationError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Severity carried by an ingested line.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Critical,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            "DEBUG" => Ok(LogLevel::Debug),
            other => Err(ValidationError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated field set. Turn it into a [`LogEntry`] with `LogEntry::try_from`.
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry {
    pub origin_ip: String,
    pub application_id: String,
    pub date: String,
    pub time: String,
    pub client_ip: String,
    pub level: String,
    pub method: String,
    pub component: String,
    pub message: String,
}

/// One structured record extracted from one input line.
///
/// Fields are private: an entry can only be obtained through validation and
/// never changes afterwards.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    origin_ip: String,
    application_id: String,
    date: String,
    time: String,
    client_ip: String,
    level: LogLevel,
    method: String,
    component: String,
    message: String,
}

impl TryFrom<NewLogEntry> for LogEntry {
    type Error = ValidationError;

    fn try_from(raw: NewLogEntry) -> Result<Self, Self::Error> {
        require_ipv4("origin_ip", &raw.origin_ip)?;
        require_ipv4("client_ip", &raw.client_ip)?;
        require_non_empty("date", &raw.date)?;
        require_non_empty("time", &raw.time)?;
        let level = raw.level.parse::<LogLevel>()?;

        Ok(Self {
            origin_ip: raw.origin_ip,
            application_id: raw.application_id,
            date: raw.date,
            time: raw.time,
            client_ip: raw.client_ip,
            level,
            method: raw.method,
            component: raw.component,
            message: raw.message,
        })
    }
}

impl LogEntry {
    pub fn origin_ip(&self) -> &str {
        &self.origin_ip
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Content date, `YYYY-MM-DD`.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Wall-clock time, `HH:MM:SS`.
    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Dotted-quad check: exactly four decimal octets, each within 0..=255.
pub fn is_valid_ipv4(value: &str) -> bool {
    let octets: Vec<&str> = value.split('.').collect();
    if octets.len() != 4 {
        return false;
    }
    octets.iter().all(|octet| {
        !octet.is_empty()
            && octet.bytes().all(|b| b.is_ascii_digit())
            && octet.parse::<u16>().is_ok_and(|n| n <= 255)
    })
}

fn require_ipv4(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if !is_valid_ipv4(value) {
        return Err(ValidationError::InvalidIpv4 {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}
