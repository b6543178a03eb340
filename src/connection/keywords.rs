use crate::error::ProviderError;
use std::fmt;
use std::str::FromStr;

/// Connection-string keywords understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Host,
    Port,
    Database,
    Username,
    Password,
    SslMode,
    ApplicationName,
    SearchPath,
    Timeout,
    CommandTimeout,
    MaxPoolSize,
    MinPoolSize,
    ConnectionIdleLifetime,
    Pooling,
    IncludeErrorDetail,
    TrustServerCertificate,
    Keepalive,
}

impl Keyword {
    pub const ALL: [Keyword; 17] = [
        Keyword::Host,
        Keyword::Port,
        Keyword::Database,
        Keyword::Username,
        Keyword::Password,
        Keyword::SslMode,
        Keyword::ApplicationName,
        Keyword::SearchPath,
        Keyword::Timeout,
        Keyword::CommandTimeout,
        Keyword::MaxPoolSize,
        Keyword::MinPoolSize,
        Keyword::ConnectionIdleLifetime,
        Keyword::Pooling,
        Keyword::IncludeErrorDetail,
        Keyword::TrustServerCertificate,
        Keyword::Keepalive,
    ];

    /// Spelling used when a descriptor is written back out.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Keyword::Host => "Host",
            Keyword::Port => "Port",
            Keyword::Database => "Database",
            Keyword::Username => "Username",
            Keyword::Password => "Password",
            Keyword::SslMode => "SSL Mode",
            Keyword::ApplicationName => "Application Name",
            Keyword::SearchPath => "Search Path",
            Keyword::Timeout => "Timeout",
            Keyword::CommandTimeout => "Command Timeout",
            Keyword::MaxPoolSize => "Maximum Pool Size",
            Keyword::MinPoolSize => "Minimum Pool Size",
            Keyword::ConnectionIdleLifetime => "Connection Idle Lifetime",
            Keyword::Pooling => "Pooling",
            Keyword::IncludeErrorDetail => "Include Error Detail",
            Keyword::TrustServerCertificate => "Trust Server Certificate",
            Keyword::Keepalive => "Keepalive",
        }
    }

    /// Accepted spellings, already normalized (lowercase, no spaces or underscores).
    fn synonyms(self) -> &'static [&'static str] {
        match self {
            Keyword::Host => &["host", "server"],
            Keyword::Port => &["port"],
            Keyword::Database => &["database", "db"],
            Keyword::Username => &["username", "userid", "user"],
            Keyword::Password => &["password", "psw", "pwd"],
            Keyword::SslMode => &["sslmode"],
            Keyword::ApplicationName => &["applicationname"],
            Keyword::SearchPath => &["searchpath"],
            Keyword::Timeout => &["timeout"],
            Keyword::CommandTimeout => &["commandtimeout"],
            Keyword::MaxPoolSize => &["maximumpoolsize", "maxpoolsize"],
            Keyword::MinPoolSize => &["minimumpoolsize", "minpoolsize"],
            Keyword::ConnectionIdleLifetime => &["connectionidlelifetime"],
            Keyword::Pooling => &["pooling"],
            Keyword::IncludeErrorDetail => &["includeerrordetail", "includeerrordetails"],
            Keyword::TrustServerCertificate => &["trustservercertificate"],
            Keyword::Keepalive => &["keepalive"],
        }
    }

    pub fn lookup(raw: &str) -> Option<Keyword> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Keyword::ALL
            .into_iter()
            .find(|keyword| keyword.synonyms().iter().any(|s| *s == normalized))
    }
}

impl FromStr for Keyword {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keyword::lookup(s).ok_or_else(|| {
            ProviderError::configuration(format!("unsupported connection keyword `{}`", s.trim()))
        })
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}
