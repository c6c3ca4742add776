use crate::identity::Identity;
use crate::IdentityError;
use url::Url;

/// Path segment that precedes the identity in an item URL
const IDENTITY_SEGMENT: &str = "product";

/// Extracts the item identity from an item page URL
///
/// The identity is the path segment following `/product/`, made of digits
/// with an optional fractional part.
///
/// # Arguments
///
/// * `url_str` - The absolute URL of an item page
///
/// # Returns
///
/// * `Ok(Identity)` - The canonical identity found in the URL
/// * `Err(IdentityError)` - The URL is invalid or carries no identity
///
/// # Examples
///
/// ```
/// use catalog_harvest::identity::extract_from_url;
///
/// let id = extract_from_url("https://shop.example.com/product/3505.2/watermelon").unwrap();
/// assert_eq!(id.as_str(), "3505.2");
/// ```
pub fn extract_from_url(url_str: &str) -> Result<Identity, IdentityError> {
    let url = Url::parse(url_str).map_err(|_| IdentityError::InvalidUrl(url_str.to_string()))?;

    if (url.scheme() != "http" && url.scheme() != "https") || url.host_str().is_none() {
        return Err(IdentityError::InvalidUrl(url_str.to_string()));
    }

    let segment = url
        .path_segments()
        .and_then(|mut segments| {
            segments
                .find(|s| *s == IDENTITY_SEGMENT)
                .and_then(|_| segments.next())
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IdentityError::NotFound(url_str.to_string()))?;

    Identity::parse(segment).map_err(|_| IdentityError::NotFound(url_str.to_string()))
}
