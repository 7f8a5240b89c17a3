use async_graphql::{Object, SimpleObject};

use crate::intent::{self, Intent};

const UNKNOWN_WARNING: &str = "I didn't understand that. Try asking for sales data for a specific \
    city, agent performance, or NPS analysis.";

#[derive(Default)]
pub(super) struct IntentQuery;

/// A shortcut resolved from free text.
#[derive(SimpleObject)]
struct IntentResolution {
    intent: Intent,
    /// City, agent or location captured from the text, lower-cased.
    parameter: Option<String>,
    /// Dashboard view to open. Absent for unrecognized text.
    path: Option<String>,
    /// Which view filter `value` applies to.
    filter: Option<String>,
    value: Option<String>,
    /// Shown to the user when the text was not recognized.
    warning: Option<String>,
}

#[Object]
impl IntentQuery {
    /// Matches `text` against the built-in shortcut phrases.
    async fn resolve_intent(&self, text: String) -> IntentResolution {
        let resolution = intent::resolve(&text);
        let navigation = resolution.navigation();
        IntentResolution {
            intent: resolution.intent,
            parameter: resolution.parameter,
            path: navigation.as_ref().map(|nav| nav.path.to_string()),
            filter: navigation
                .as_ref()
                .and_then(|nav| nav.filter.map(str::to_string)),
            value: navigation.and_then(|nav| nav.value),
            warning: (resolution.intent == Intent::Unknown).then(|| UNKNOWN_WARNING.to_string()),
        }
    }
}
