//! # The lookup-client boundary
//!
//! [`LookupClient`] is the seam to the slow external service that resolves a
//! key to candidate links. The pipeline only ever needs the first hit; the
//! full list is surfaced so callers can implement their own selection if
//! they embed the trait elsewhere.
//!
//! [`SearchOptions`] carries the recognized request filters. A filter set to
//! its `Undefined` variant is omitted from the request entirely.


use core::fmt;
use core::future::Future;
use core::str::FromStr;

/// One candidate result returned by a lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// Link to the matched resource.
    pub link: String,
}

impl SearchHit {
    pub fn new(link: impl Into<String>) -> Self {
        Self { link: link.into() }
    }
}

/// Asynchronous key-to-links resolver.
///
/// Implementations must be safe to call from many tasks at once. Deadlines
/// are enforced by the caller (the pipeline wraps each call in its per-task
/// timeout), so implementations should simply run until done or failed.
pub trait LookupClient: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolves `key` to zero or more candidate hits, best match first.
    fn search(
        &self,
        key: &str,
        options: &SearchOptions,
    ) -> impl Future<Output = core::result::Result<Vec<SearchHit>, Self::Error>> + Send;
}

/// Request filters recognized by the lookup service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub image_type: ImageType,
    pub image_size: ImageSize,
}

/// A filter value outside the recognized set.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[error("Invalid {field} {value:?} (expected one of: {expected})")]
pub struct InvalidFilter {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

macro_rules! filter_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal, {
            $($variant:ident => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub enum $name {
            /// No filtering; the parameter is omitted from requests.
            #[default]
            Undefined,
            $($variant),+
        }

        impl $name {
            /// The wire value for this filter, or `None` when undefined.
            pub fn as_param(&self) -> Option<&'static str> {
                match self {
                    Self::Undefined => None,
                    $(Self::$variant => Some($token)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = InvalidFilter;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    "undefined" | "" => Ok(Self::Undefined),
                    $($token => Ok(Self::$variant),)+
                    _ => Err(InvalidFilter {
                        field: $field,
                        value: s.to_string(),
                        expected: concat!("undefined", $(", ", $token),+),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_param().unwrap_or("undefined"))
            }
        }
    };
}

filter_enum!(
    /// Result-type filter accepted by the lookup service.
    ImageType,
    "image type",
    {
        Clipart => "clipart",
        Face => "face",
        Lineart => "lineart",
        News => "news",
        Photo => "photo",
    }
);

filter_enum!(
    /// Result-size filter accepted by the lookup service.
    ImageSize,
    "image size",
    {
        Huge => "huge",
        Icon => "icon",
        Large => "large",
        Medium => "medium",
        Small => "small",
        Xlarge => "xlarge",
        Xxlarge => "xxlarge",
    }
);
