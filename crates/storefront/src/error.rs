//! Error reporting with Sentry integration.
//!
//! Cart operations never crash the host on a store failure. Failures are
//! logged, captured to Sentry, and surfaced as a `CartError`. Without an
//! initialized Sentry client every function here is a no-op apart from the
//! log line.

use tracing::warn;

/// Log a failed store call and capture it to Sentry.
///
/// Returns the Sentry event ID so callers can correlate log lines.
pub fn report_store_error<E>(operation: &str, error: &E) -> sentry::types::Uuid
where
    E: std::error::Error + ?Sized,
{
    let event_id = sentry::capture_error(error);
    warn!(
        operation,
        error = %error,
        sentry_event_id = %event_id,
        "Cart store call failed"
    );
    event_id
}

/// Set the Sentry user context from a user ID.
///
/// Call this after sign-in to associate errors with the shopper.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the shopper.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "9f0c...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
