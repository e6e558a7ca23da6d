//! Host platform differences in the sign-in flow.

use std::fmt;
use std::sync::Arc;

use url::Url;

/// The address bar of a browser host.
pub trait PageLocation: Send + Sync {
    /// Full current URL, including any fragment.
    fn href(&self) -> String;

    /// Replace the visible URL without navigating.
    fn replace(&self, url: &str);
}

/// Where the client runs, which decides how magic links come back.
#[derive(Clone)]
pub enum Platform {
    /// Browser: tokens arrive in the page URL fragment and links redirect to
    /// the page origin.
    Web(Arc<dyn PageLocation>),
    /// App or CLI: tokens arrive through a deep link to `redirect_to`.
    Native { redirect_to: String },
}

impl Platform {
    pub fn web(location: Arc<dyn PageLocation>) -> Self {
        Self::Web(location)
    }

    pub fn native(redirect_to: impl Into<String>) -> Self {
        Self::Native {
            redirect_to: redirect_to.into(),
        }
    }

    /// Redirect target sent along with a magic-link request.
    pub fn redirect_target(&self) -> String {
        match self {
            Self::Web(location) => {
                let href = location.href();
                Url::parse(&href).map_or(href, |url| url.origin().ascii_serialization())
            }
            Self::Native { redirect_to } => redirect_to.clone(),
        }
    }

    pub fn location(&self) -> Option<&dyn PageLocation> {
        match self {
            Self::Web(location) => Some(location.as_ref()),
            Self::Native { .. } => None,
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web(_) => formatter.write_str("Platform::Web"),
            Self::Native { redirect_to } => formatter
                .debug_struct("Platform::Native")
                .field("redirect_to", redirect_to)
                .finish(),
        }
    }
}
